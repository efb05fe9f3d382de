//! Audit record types.
//!
//! `AuditRecord` is one immutable entry in a per-entity-type hash chain.
//! `NewAuditRecord` is what business code hands to the ledger: everything
//! except the fields the ledger owns (`id`, `timestamp`, `signature`,
//! `previous_signature`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full entity state captured for forensic review.
///
/// `serde_json::Map` is ordered by key, so two snapshots of the same state
/// always serialize identically.
pub type Snapshot = serde_json::Map<String, Value>;

/// Field name → before/after pair, restricted to fields that changed.
pub type Changes = BTreeMap<String, FieldChange>;

/// The kind of mutation an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// The wire form that enters the signature hash.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field's value before and after a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub before: Value,
    pub after: Value,
}

impl FieldChange {
    pub fn new(before: impl Into<Value>, after: impl Into<Value>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// An immutable, signed entry in the audit ledger.
///
/// The chain is scoped per `entity_type`: `previous_signature` is the
/// signature of the latest record of the same entity type at append time, or
/// `None` for the first record of that type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Ledger-assigned, strictly increasing identifier.
    pub id: i64,

    /// Logical name of the mutated entity, e.g. `"Sample"`.
    pub entity_type: String,

    pub entity_id: i64,

    pub operation: Operation,

    /// UTC append time truncated to whole seconds.
    pub timestamp: DateTime<Utc>,

    pub changes: Changes,

    pub snapshot_before: Snapshot,

    pub snapshot_after: Snapshot,

    pub user_id: Option<i64>,

    pub user_email: Option<String>,

    /// SHA-256 (hex) over the canonical form of this record.
    pub signature: String,

    /// Signature of the chain predecessor, `None` for the first record.
    pub previous_signature: Option<String>,
}

impl AuditRecord {
    /// One-line human summary for logs and reports.
    pub fn summary(&self) -> String {
        format!(
            "{} {}({}) @ {}",
            self.operation, self.entity_type, self.entity_id, self.timestamp
        )
    }
}

/// The caller-supplied part of an audit record, before the ledger links and
/// signs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub entity_type: String,
    pub entity_id: i64,
    pub operation: Operation,
    pub changes: Changes,
    pub snapshot_before: Snapshot,
    pub snapshot_after: Snapshot,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
}

/// A set of entities whose audit history belongs to one report footprint.
///
/// Each entry is an entity type plus the ids of that type that count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFootprint {
    pub entities: BTreeMap<String, Vec<i64>>,
}

impl AuditFootprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add ids of `entity_type` to the footprint. Duplicates are ignored.
    pub fn include(&mut self, entity_type: &str, ids: impl IntoIterator<Item = i64>) {
        let slot = self.entities.entry(entity_type.to_string()).or_default();
        for id in ids {
            if !slot.contains(&id) {
                slot.push(id);
            }
        }
    }

    pub fn contains(&self, entity_type: &str, entity_id: i64) -> bool {
        self.entities
            .get(entity_type)
            .is_some_and(|ids| ids.contains(&entity_id))
    }
}

/// Convert any serializable entity into a snapshot map.
///
/// Values that do not serialize to a JSON object produce an empty snapshot.
pub fn snapshot_of<T: Serialize>(value: &T) -> Snapshot {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Snapshot::new(),
    }
}
