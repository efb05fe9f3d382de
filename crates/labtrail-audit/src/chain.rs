//! Hash-chain primitives: canonical encoding, signatures, chain faults.
//!
//! A record's signature is the SHA-256 (lowercase hex) of the canonical JSON
//! encoding of this object:
//!
//! ```text
//! {
//!   "changes":            { field: { "after": .., "before": .. }, .. },
//!   "entity_id":          <integer>,
//!   "entity_type":        <string>,
//!   "operation":          "CREATE" | "UPDATE" | "DELETE",
//!   "previous_signature": <predecessor signature, or "" for the first record>,
//!   "timestamp":          "YYYY-MM-DDTHH:MM:SS+00:00"
//! }
//! ```
//!
//! Canonical means: object keys sorted by code point, no whitespace, and
//! every character outside printable ASCII escaped as `\uXXXX` (surrogate
//! pairs above the BMP). The same logical record therefore hashes the same
//! regardless of key insertion order or the encoder that produced it.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use labtrail_contracts::audit::{AuditRecord, Changes, Operation};

/// A linkage or content fault found while walking a chain.
///
/// Faults are collected into verification results, never returned as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainFault {
    /// `previous_signature` does not point at the expected predecessor.
    #[error(
        "chain broken at record #{record_id}: expected previous_signature={}, got {}",
        display_link(.expected),
        display_link(.found)
    )]
    Broken {
        record_id: i64,
        expected: Option<String>,
        found: Option<String>,
    },

    /// The stored signature differs from the one re-derived from the record.
    #[error("tampering detected at record #{record_id}: expected signature={expected}, got {found}")]
    Tampered {
        record_id: i64,
        expected: String,
        found: String,
    },
}

impl ChainFault {
    pub fn record_id(&self) -> i64 {
        match self {
            ChainFault::Broken { record_id, .. } | ChainFault::Tampered { record_id, .. } => {
                *record_id
            }
        }
    }
}

fn display_link(link: &Option<String>) -> &str {
    link.as_deref().unwrap_or("none")
}

/// Drop sub-second precision.
pub fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.with_nanosecond(0).unwrap_or(instant)
}

/// The timestamp form that enters the hash: `2024-03-01T09:00:00+00:00`.
pub fn timestamp_iso(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Compute the signature for one record's hashed fields.
pub fn calculate_signature(
    previous_signature: Option<&str>,
    entity_type: &str,
    entity_id: i64,
    operation: Operation,
    changes: &Changes,
    timestamp: &DateTime<Utc>,
) -> String {
    let mut payload = Map::new();
    payload.insert("changes".to_string(), changes_value(changes));
    payload.insert("entity_id".to_string(), Value::from(entity_id));
    payload.insert("entity_type".to_string(), Value::from(entity_type));
    payload.insert("operation".to_string(), Value::from(operation.as_str()));
    payload.insert(
        "previous_signature".to_string(),
        Value::from(previous_signature.unwrap_or("")),
    );
    payload.insert("timestamp".to_string(), Value::from(timestamp_iso(timestamp)));

    let canonical = canonical_json(&Value::Object(payload));
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Re-derive the signature a stored record should carry.
pub fn expected_signature(record: &AuditRecord) -> String {
    calculate_signature(
        record.previous_signature.as_deref(),
        &record.entity_type,
        record.entity_id,
        record.operation,
        &record.changes,
        &record.timestamp,
    )
}

fn changes_value(changes: &Changes) -> Value {
    let mut map = Map::new();
    for (field, change) in changes {
        let mut pair = Map::new();
        pair.insert("after".to_string(), change.after.clone());
        pair.insert("before".to_string(), change.before.clone());
        map.insert(field.clone(), Value::Object(pair));
    }
    Value::Object(map)
}

// ── Canonical JSON ────────────────────────────────────────────────────────────

/// Encode `value` canonically: sorted keys, compact, ASCII-only.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(text) => write_string(out, text),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}
