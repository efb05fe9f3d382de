//! In-memory implementation of `AuditLedger`.
//!
//! `InMemoryLedger` is the reference ledger. Records live in a `Vec` behind
//! an `RwLock`; appends to one entity type are serialized by a per-type
//! mutex so the "read tip, sign, persist" sequence is a critical section for
//! that chain only. Appends to different entity types only contend on the
//! short final insert.
//!
//! `append_with` accepts a persistence hook that runs inside the critical
//! section, before the record becomes visible. The journal backend uses it
//! to write through to disk.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, error};

use labtrail_contracts::{
    audit::{AuditFootprint, AuditRecord, NewAuditRecord},
    error::{LabtrailError, LabtrailResult},
};
use labtrail_core::traits::{AuditLedger, Clock};

use crate::chain::{calculate_signature, expected_signature, truncate_to_seconds};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct LedgerState {
    /// Every record, in insertion order.
    pub(crate) records: Vec<AuditRecord>,

    /// Unique index over `signature`.
    pub(crate) signatures: HashSet<String>,

    /// The next id to assign.
    pub(crate) next_id: i64,
}

// ── Public ledger ─────────────────────────────────────────────────────────────

/// An append-only, hash-chained ledger held in memory.
pub struct InMemoryLedger {
    clock: Arc<dyn Clock>,
    pub(crate) state: RwLock<LedgerState>,
    chain_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(LedgerState {
                records: Vec::new(),
                signatures: HashSet::new(),
                next_id: 1,
            }),
            chain_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records held.
    pub fn len(&self) -> LabtrailResult<usize> {
        Ok(self.read()?.records.len())
    }

    pub fn is_empty(&self) -> LabtrailResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every record in id order.
    pub fn all_records(&self) -> LabtrailResult<Vec<AuditRecord>> {
        let mut records = self.read()?.records.clone();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    /// Load a previously persisted record verbatim.
    ///
    /// The signature is not re-derived; detecting a bad record is the
    /// verifier's job. Signature and id uniqueness are still enforced.
    pub fn import(&self, record: AuditRecord) -> LabtrailResult<()> {
        let mut state = self.write()?;
        if state.signatures.contains(&record.signature) {
            return Err(LabtrailError::DuplicateSignature {
                signature: record.signature,
            });
        }
        if state.records.iter().any(|r| r.id == record.id) {
            return Err(LabtrailError::LedgerWrite {
                reason: format!("audit record id {} already exists", record.id),
            });
        }
        state.next_id = state.next_id.max(record.id + 1);
        state.signatures.insert(record.signature.clone());
        state.records.push(record);
        Ok(())
    }

    /// Link, sign, self-check and store `entry`, running `persist` on the
    /// finished record before it becomes visible.
    ///
    /// If `persist` fails the record is discarded and the error returned.
    pub fn append_with(
        &self,
        entry: NewAuditRecord,
        persist: impl FnOnce(&AuditRecord) -> LabtrailResult<()>,
    ) -> LabtrailResult<AuditRecord> {
        let chain_lock = self.chain_lock(&entry.entity_type)?;
        let _guard = chain_lock.lock().map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("chain lock for {} poisoned: {}", entry.entity_type, e),
        })?;

        let (previous_signature, id, timestamp) = {
            let mut state = self.write()?;
            let tip = state
                .records
                .iter()
                .filter(|r| r.entity_type == entry.entity_type)
                .max_by_key(|r| (r.timestamp, r.id));

            // Timestamps never run backwards within a chain, so (timestamp, id)
            // order and append order agree.
            let now = truncate_to_seconds(self.clock.now());
            let timestamp = match tip {
                Some(tip) if tip.timestamp > now => tip.timestamp,
                _ => now,
            };
            let previous_signature = tip.map(|t| t.signature.clone());

            let id = state.next_id;
            state.next_id += 1;
            (previous_signature, id, timestamp)
        };

        let signature = calculate_signature(
            previous_signature.as_deref(),
            &entry.entity_type,
            entry.entity_id,
            entry.operation,
            &entry.changes,
            &timestamp,
        );

        let record = AuditRecord {
            id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            operation: entry.operation,
            timestamp,
            changes: entry.changes,
            snapshot_before: entry.snapshot_before,
            snapshot_after: entry.snapshot_after,
            user_id: entry.user_id,
            user_email: entry.user_email,
            signature,
            previous_signature,
        };

        self_check(&record)?;

        let mut state = self.write()?;
        if state.signatures.contains(&record.signature) {
            return Err(LabtrailError::DuplicateSignature {
                signature: record.signature,
            });
        }

        persist(&record)?;

        state.signatures.insert(record.signature.clone());
        state.records.push(record.clone());

        debug!(
            entity_type = %record.entity_type,
            entity_id = record.entity_id,
            record_id = record.id,
            signature = %record.signature,
            "audit record appended"
        );

        Ok(record)
    }

    fn chain_lock(&self, entity_type: &str) -> LabtrailResult<Arc<Mutex<()>>> {
        let mut locks = self.chain_locks.lock().map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("chain lock table poisoned: {}", e),
        })?;
        Ok(locks
            .entry(entity_type.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn read(&self) -> LabtrailResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.state.read().map_err(|e| LabtrailError::Storage {
            reason: format!("ledger state lock poisoned: {}", e),
        })
    }

    fn write(&self) -> LabtrailResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.state.write().map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("ledger state lock poisoned: {}", e),
        })
    }

    fn sorted(mut records: Vec<AuditRecord>) -> Vec<AuditRecord> {
        records.sort_by_key(|r| (r.timestamp, r.id));
        records
    }
}

/// Re-derive the signature from the record as it will be stored.
///
/// The record is serialized and parsed back first, so any value that does
/// not survive storage unchanged is caught here rather than at verification.
pub(crate) fn self_check(record: &AuditRecord) -> LabtrailResult<()> {
    let stored: AuditRecord = serde_json::to_string(record)
        .and_then(|json| serde_json::from_str(&json))
        .map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("audit record does not round-trip through storage: {}", e),
        })?;

    let expected = expected_signature(&stored);
    if expected != record.signature {
        error!(
            entity_type = %record.entity_type,
            record_id = record.id,
            "audit record failed signature self-check; not persisted"
        );
        return Err(LabtrailError::SignatureMismatch {
            entity_type: record.entity_type.clone(),
            expected,
            found: record.signature.clone(),
        });
    }
    Ok(())
}

// ── AuditLedger impl ──────────────────────────────────────────────────────────

impl AuditLedger for InMemoryLedger {
    fn append(&self, entry: NewAuditRecord) -> LabtrailResult<AuditRecord> {
        self.append_with(entry, |_| Ok(()))
    }

    fn history_for(&self, entity_type: &str, entity_id: i64) -> LabtrailResult<Vec<AuditRecord>> {
        let state = self.read()?;
        Ok(Self::sorted(
            state
                .records
                .iter()
                .filter(|r| r.entity_type == entity_type && r.entity_id == entity_id)
                .cloned()
                .collect(),
        ))
    }

    fn chain(&self, entity_type: &str) -> LabtrailResult<Vec<AuditRecord>> {
        let state = self.read()?;
        Ok(Self::sorted(
            state
                .records
                .iter()
                .filter(|r| r.entity_type == entity_type)
                .cloned()
                .collect(),
        ))
    }

    fn latest_signature(&self, entity_type: &str) -> LabtrailResult<Option<String>> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.entity_type == entity_type)
            .max_by_key(|r| (r.timestamp, r.id))
            .map(|r| r.signature.clone()))
    }

    fn records_for_users(&self, user_ids: &BTreeSet<i64>) -> LabtrailResult<Vec<AuditRecord>> {
        let state = self.read()?;
        Ok(Self::sorted(
            state
                .records
                .iter()
                .filter(|r| r.user_id.is_some_and(|id| user_ids.contains(&id)))
                .cloned()
                .collect(),
        ))
    }

    fn count_footprint(&self, footprint: &AuditFootprint) -> LabtrailResult<usize> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .filter(|r| footprint.contains(&r.entity_type, r.entity_id))
            .count())
    }
}
