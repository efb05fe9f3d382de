//! Chain verification result types.
//!
//! Verification never fails with an error just because a chain is broken.
//! Broken-ness is returned as data so callers decide policy.

use serde::{Deserialize, Serialize};

/// Outcome of walking one entity type's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCheck {
    pub is_valid: bool,
    /// Human-readable diagnostic naming the first failing record, if any.
    pub message: String,
}

/// One record that failed tenant-wide verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptedRecord {
    pub id: i64,
    pub error: String,
}

/// Result of a tenant-wide verification sweep.
///
/// This is the JSON shape exposed to the HTTP layer and stored on every
/// certified report as `chain_verification_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub total_records: usize,
    /// Records that passed both the linkage and the signature check.
    pub verified_records: usize,
    pub corrupted_records: Vec<CorruptedRecord>,
    /// Mirrors `is_valid`; kept for consumers that read the older field name.
    pub chain_integrity_ok: bool,
}

impl IntegrityReport {
    /// A report over zero records: vacuously valid.
    pub fn empty() -> Self {
        Self {
            is_valid: true,
            total_records: 0,
            verified_records: 0,
            corrupted_records: Vec::new(),
            chain_integrity_ok: true,
        }
    }

    pub fn corrupted_count(&self) -> usize {
        self.corrupted_records.len()
    }
}

/// How tenant-wide verification links records to their predecessors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationScope {
    /// Treat every in-scope record, across entity types, as one sequence
    /// ordered by timestamp. Each record must link to the record before it
    /// in that combined sequence.
    #[default]
    GlobalSequence,

    /// Link each in-scope record against its real predecessor in its own
    /// entity type's chain.
    PerEntityType,
}
