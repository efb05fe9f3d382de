//! Chain verification.
//!
//! Two notions of "chain" are checked here:
//!
//! - `verify(entity_type)` walks one entity type's chain in `(timestamp, id)`
//!   order and stops at the first fault.
//! - `verify_tenant_wide(user_ids)` sweeps every record attributed to a set
//!   of users and collects every fault. Under the default
//!   `VerificationScope::GlobalSequence` the filtered records are treated as
//!   one sequence ordered by timestamp, regardless of entity type. Records
//!   from interleaved entity types do not link to each other, so this scope
//!   reports breaks for any footprint that spans more than one chain.
//!   `VerificationScope::PerEntityType` links each record to its real
//!   predecessor instead.
//!
//! A broken chain is never an `Err`: results are data.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{info, warn};

use labtrail_contracts::{
    audit::AuditRecord,
    error::LabtrailResult,
    integrity::{ChainCheck, CorruptedRecord, IntegrityReport, VerificationScope},
};
use labtrail_core::traits::AuditLedger;

use crate::chain::{expected_signature, ChainFault};

pub struct ChainVerifier {
    ledger: Arc<dyn AuditLedger>,
    scope: VerificationScope,
}

impl ChainVerifier {
    /// A verifier using the default tenant-wide scope.
    pub fn new(ledger: Arc<dyn AuditLedger>) -> Self {
        Self {
            ledger,
            scope: VerificationScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: VerificationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> VerificationScope {
        self.scope
    }

    /// Verify one entity type's chain, stopping at the first fault.
    pub fn verify(&self, entity_type: &str) -> LabtrailResult<ChainCheck> {
        let records = self.ledger.chain(entity_type)?;

        if records.is_empty() {
            return Ok(ChainCheck {
                is_valid: true,
                message: format!("No audit records for {entity_type} (empty history is valid)"),
            });
        }

        if let Some(fault) = walk_chain(&records).into_iter().next() {
            warn!(entity_type = %entity_type, fault = %fault, "audit chain verification failed");
            return Ok(ChainCheck {
                is_valid: false,
                message: fault.to_string(),
            });
        }

        info!(entity_type = %entity_type, records = records.len(), "audit chain verified");
        Ok(ChainCheck {
            is_valid: true,
            message: format!("Chain integrity verified for {} records", records.len()),
        })
    }

    /// Every fault in one entity type's chain.
    pub fn faults(&self, entity_type: &str) -> LabtrailResult<Vec<ChainFault>> {
        Ok(walk_chain(&self.ledger.chain(entity_type)?))
    }

    /// Sweep every record attributed to `user_ids` and collect all faults.
    pub fn verify_tenant_wide(&self, user_ids: &BTreeSet<i64>) -> LabtrailResult<IntegrityReport> {
        let records = self.ledger.records_for_users(user_ids)?;
        if records.is_empty() {
            return Ok(IntegrityReport::empty());
        }

        let faults = match self.scope {
            VerificationScope::GlobalSequence => sweep_global_sequence(&records),
            VerificationScope::PerEntityType => self.sweep_per_entity_type(&records)?,
        };

        let corrupted_records: Vec<CorruptedRecord> = faults
            .iter()
            .map(|fault| CorruptedRecord {
                id: fault.record_id(),
                error: fault.to_string(),
            })
            .collect();
        let is_valid = corrupted_records.is_empty();

        let report = IntegrityReport {
            is_valid,
            total_records: records.len(),
            verified_records: records.len() - corrupted_records.len(),
            corrupted_records,
            chain_integrity_ok: is_valid,
        };

        if report.is_valid {
            info!(
                scope = ?self.scope,
                total_records = report.total_records,
                "tenant-wide audit verification passed"
            );
        } else {
            warn!(
                scope = ?self.scope,
                total_records = report.total_records,
                corrupted = report.corrupted_count(),
                "tenant-wide audit verification found corrupted records"
            );
        }

        Ok(report)
    }

    fn sweep_per_entity_type(&self, records: &[AuditRecord]) -> LabtrailResult<Vec<ChainFault>> {
        let mut chains: HashMap<String, Vec<AuditRecord>> = HashMap::new();
        let mut faults = Vec::new();

        for record in records {
            if !chains.contains_key(&record.entity_type) {
                let chain = self.ledger.chain(&record.entity_type)?;
                chains.insert(record.entity_type.clone(), chain);
            }
            let chain = &chains[&record.entity_type];

            let predecessor = chain
                .iter()
                .position(|r| r.id == record.id)
                .and_then(|idx| idx.checked_sub(1))
                .map(|idx| chain[idx].signature.clone());

            if let Some(fault) = check_record(record, predecessor.as_deref()) {
                faults.push(fault);
            }
        }
        Ok(faults)
    }
}

/// Per-entity walk: each record must link to the stored signature of the
/// record before it.
fn walk_chain(records: &[AuditRecord]) -> Vec<ChainFault> {
    let mut faults = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let expected_previous = idx.checked_sub(1).map(|prev| records[prev].signature.as_str());
        if let Some(fault) = check_record(record, expected_previous) {
            faults.push(fault);
        }
    }
    faults
}

/// Global-sequence sweep.
///
/// After a linkage break the expected predecessor is left where it was.
/// After a signature mismatch it still advances to the mismatched record.
fn sweep_global_sequence(records: &[AuditRecord]) -> Vec<ChainFault> {
    let mut faults = Vec::new();
    let mut previous: Option<&str> = None;

    for record in records {
        match check_record(record, previous) {
            Some(fault @ ChainFault::Broken { .. }) => {
                faults.push(fault);
                continue;
            }
            Some(fault @ ChainFault::Tampered { .. }) => faults.push(fault),
            None => {}
        }
        previous = Some(record.signature.as_str());
    }
    faults
}

/// Check linkage first, then content.
fn check_record(record: &AuditRecord, expected_previous: Option<&str>) -> Option<ChainFault> {
    if record.previous_signature.as_deref() != expected_previous {
        return Some(ChainFault::Broken {
            record_id: record.id,
            expected: expected_previous.map(str::to_string),
            found: record.previous_signature.clone(),
        });
    }

    let expected = expected_signature(record);
    if expected != record.signature {
        return Some(ChainFault::Tampered {
            record_id: record.id,
            expected,
            found: record.signature.clone(),
        });
    }
    None
}
