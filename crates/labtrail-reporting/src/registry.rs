//! Storage for certified report rows and their state machine.
//!
//! ```text
//!   PENDING ──► CERTIFIED
//!      │
//!      └─────► REVOKED
//! ```
//!
//! Only a `Pending` row can be changed. `transition` runs the caller's
//! update on a draft while holding the write lock and stores the draft only
//! if the update succeeds, so an audit append made inside the update and the
//! row change land together or not at all.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    report::{CertifiedReport, ReportState},
};
use labtrail_core::traits::Clock;

struct RegistryState {
    reports: BTreeMap<i64, CertifiedReport>,
    next_id: i64,
}

pub struct ReportRegistry {
    clock: Arc<dyn Clock>,
    state: RwLock<RegistryState>,
}

impl ReportRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(RegistryState {
                reports: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Insert a new `Pending` row with an empty hash.
    pub fn create_pending(
        &self,
        tenant_id: i64,
        execution_id: i64,
        certified_by: i64,
    ) -> LabtrailResult<CertifiedReport> {
        let mut state = self.write()?;
        let id = state.next_id;
        state.next_id += 1;

        let report = CertifiedReport {
            id,
            tenant_id,
            execution_id,
            certified_by,
            certified_at: None,
            report_hash: String::new(),
            chain_integrity_verified: false,
            chain_verification_details: None,
            pdf_filename: String::new(),
            pdf_size: 0,
            state: ReportState::Pending,
            revocation_reason: String::new(),
            created_at: self.clock.now(),
        };
        state.reports.insert(id, report.clone());
        debug!(report_id = id, execution_id, "report row created");
        Ok(report)
    }

    /// Move report `id` from `Pending` to `to`, applying `update` to a draft.
    ///
    /// Returns `InvalidTransition` if the row is not `Pending` or `to` is
    /// `Pending`. If `update` fails the stored row is left untouched.
    pub fn transition(
        &self,
        id: i64,
        to: ReportState,
        update: impl FnOnce(&mut CertifiedReport) -> LabtrailResult<()>,
    ) -> LabtrailResult<CertifiedReport> {
        let mut state = self.write()?;
        let current = state
            .reports
            .get(&id)
            .ok_or_else(|| LabtrailError::not_found(CertifiedReport::ENTITY_TYPE, id))?;

        if current.state.is_terminal() || !to.is_terminal() {
            return Err(LabtrailError::InvalidTransition {
                entity: CertifiedReport::ENTITY_TYPE.to_string(),
                from: current.state.to_string(),
                to: to.to_string(),
            });
        }

        let mut draft = current.clone();
        draft.state = to;
        update(&mut draft)?;
        draft.state = to;

        state.reports.insert(id, draft.clone());
        debug!(report_id = id, state = %to, "report transitioned");
        Ok(draft)
    }

    pub fn get(&self, id: i64) -> LabtrailResult<Option<CertifiedReport>> {
        Ok(self.read()?.reports.get(&id).cloned())
    }

    /// Reports of one tenant, optionally filtered by state, in id order.
    pub fn list(&self, tenant_id: i64, state: Option<ReportState>) -> LabtrailResult<Vec<CertifiedReport>> {
        Ok(self
            .read()?
            .reports
            .values()
            .filter(|r| r.tenant_id == tenant_id && state.map_or(true, |s| r.state == s))
            .cloned()
            .collect())
    }

    /// Every report row for one execution, in id order.
    pub fn for_execution(&self, execution_id: i64) -> LabtrailResult<Vec<CertifiedReport>> {
        Ok(self
            .read()?
            .reports
            .values()
            .filter(|r| r.execution_id == execution_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> LabtrailResult<std::sync::RwLockReadGuard<'_, RegistryState>> {
        self.state.read().map_err(|e| LabtrailError::Storage {
            reason: format!("report registry lock poisoned: {}", e),
        })
    }

    fn write(&self) -> LabtrailResult<std::sync::RwLockWriteGuard<'_, RegistryState>> {
        self.state.write().map_err(|e| LabtrailError::Storage {
            reason: format!("report registry lock poisoned: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use labtrail_contracts::{error::LabtrailError, report::ReportState};
    use labtrail_core::FixedClock;

    use super::ReportRegistry;

    fn registry() -> ReportRegistry {
        ReportRegistry::new(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )))
    }

    #[test]
    fn test_pending_row_defaults() {
        let registry = registry();
        let report = registry.create_pending(1, 42, 7).unwrap();

        assert_eq!(report.id, 1);
        assert_eq!(report.state, ReportState::Pending);
        assert!(report.report_hash.is_empty());
        assert!(!report.chain_integrity_verified);
        assert_eq!(registry.create_pending(1, 43, 7).unwrap().id, 2);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let registry = registry();
        let id = registry.create_pending(1, 42, 7).unwrap().id;

        registry
            .transition(id, ReportState::Certified, |draft| {
                draft.report_hash = "ab".repeat(32);
                Ok(())
            })
            .unwrap();

        for to in [ReportState::Revoked, ReportState::Certified] {
            match registry.transition(id, to, |_| Ok(())) {
                Err(LabtrailError::InvalidTransition { from, .. }) => assert_eq!(from, "CERTIFIED"),
                other => panic!("expected InvalidTransition, got {:?}", other),
            }
        }
        assert_eq!(registry.get(id).unwrap().unwrap().report_hash, "ab".repeat(32));
    }

    #[test]
    fn test_transition_back_to_pending_rejected() {
        let registry = registry();
        let id = registry.create_pending(1, 42, 7).unwrap().id;
        assert!(matches!(
            registry.transition(id, ReportState::Pending, |_| Ok(())),
            Err(LabtrailError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_failed_update_leaves_row_untouched() {
        let registry = registry();
        let id = registry.create_pending(1, 42, 7).unwrap().id;

        let result = registry.transition(id, ReportState::Revoked, |draft| {
            draft.revocation_reason = "never stored".to_string();
            Err(LabtrailError::LedgerWrite {
                reason: "disk full".to_string(),
            })
        });

        assert!(result.is_err());
        let stored = registry.get(id).unwrap().unwrap();
        assert_eq!(stored.state, ReportState::Pending);
        assert!(stored.revocation_reason.is_empty());
    }

    #[test]
    fn test_update_cannot_override_target_state() {
        let registry = registry();
        let id = registry.create_pending(1, 42, 7).unwrap().id;
        let report = registry
            .transition(id, ReportState::Revoked, |draft| {
                draft.state = ReportState::Certified;
                Ok(())
            })
            .unwrap();
        assert_eq!(report.state, ReportState::Revoked);
    }

    #[test]
    fn test_listing_filters() {
        let registry = registry();
        let a = registry.create_pending(1, 42, 7).unwrap().id;
        registry.create_pending(1, 42, 7).unwrap();
        registry.create_pending(2, 99, 8).unwrap();
        registry.transition(a, ReportState::Revoked, |_| Ok(())).unwrap();

        assert_eq!(registry.list(1, None).unwrap().len(), 2);
        assert_eq!(registry.list(1, Some(ReportState::Revoked)).unwrap().len(), 1);
        assert_eq!(registry.list(2, Some(ReportState::Revoked)).unwrap().len(), 0);
        assert_eq!(registry.for_execution(42).unwrap().len(), 2);
        assert!(matches!(
            registry.transition(404, ReportState::Revoked, |_| Ok(())),
            Err(LabtrailError::NotFound { .. })
        ));
    }
}
