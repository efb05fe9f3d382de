//! Shared test harness.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};

use labtrail_audit::InMemoryLedger;
use labtrail_contracts::{
    audit::{AuditFootprint, AuditRecord, NewAuditRecord},
    error::{LabtrailError, LabtrailResult},
    lab::{Execution, ExecutionStep, Protocol, Sample, User},
};
use labtrail_core::{traits::AuditLedger, InMemoryBlobStore, LabtrailConfig, StepClock};

use crate::fixtures::{lab_policy, scenario_config, seed_tenant};
use crate::services::{NewProtocol, NewSample};
use crate::{Lab, LabStore};

pub(crate) struct Harness {
    pub lab: Lab,
    pub admin: User,
    pub technician: User,
    pub reviewer: User,
    pub auditor: User,
    /// A technician of a second tenant.
    pub outsider: User,
}

/// A lab with per-entity-type verification and two tenants.
pub(crate) fn harness() -> Harness {
    harness_with(scenario_config())
}

pub(crate) fn harness_with(config: LabtrailConfig) -> Harness {
    let lab = Lab::new(config, Arc::new(lab_policy().unwrap()), clock()).unwrap();
    staffed(lab)
}

/// Like `harness`, recording through `ledger`.
pub(crate) fn harness_over(ledger: Arc<dyn AuditLedger>) -> Harness {
    let lab = Lab::assemble(
        scenario_config(),
        Arc::new(lab_policy().unwrap()),
        clock(),
        ledger,
        Arc::new(LabStore::new()),
        Arc::new(InMemoryBlobStore::new()),
    )
    .unwrap();
    staffed(lab)
}

fn clock() -> Arc<StepClock> {
    Arc::new(StepClock::per_second(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()))
}

fn staffed(lab: Lab) -> Harness {
    let (_, staff) = seed_tenant(&lab.store, "North Lab", "north").unwrap();
    let (_, other) = seed_tenant(&lab.store, "South Lab", "south").unwrap();
    Harness {
        lab,
        admin: staff.admin,
        technician: staff.technician,
        reviewer: staff.reviewer,
        auditor: staff.auditor,
        outsider: other.technician,
    }
}

pub(crate) fn protocol(lab: &Lab, reviewer: &User) -> Protocol {
    lab.protocols
        .create(
            reviewer,
            NewProtocol {
                title: "DNA Extraction".to_string(),
                description: "Spin-column extraction".to_string(),
                steps: "1. Lyse\n2. Bind\n3. Wash\n4. Elute".to_string(),
            },
        )
        .unwrap()
}

pub(crate) fn sample(lab: &Lab, technician: &User, name: &str) -> Sample {
    lab.samples
        .create(
            technician,
            NewSample {
                name: name.to_string(),
                sample_type: "dna".to_string(),
                received_at: Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap(),
                location: "Freezer A".to_string(),
            },
        )
        .unwrap()
}

/// A running execution with `steps` steps, one fresh sample each.
pub(crate) fn execution_with_steps(
    lab: &Lab,
    technician: &User,
    reviewer: &User,
    steps: usize,
) -> (Execution, Vec<ExecutionStep>) {
    let protocol = protocol(lab, reviewer);
    let execution = lab.executions.start(technician, protocol.id, None, None).unwrap();
    let steps = (1..=steps)
        .map(|n| {
            let sample = sample(lab, technician, &format!("S-{n:03}"));
            lab.executions
                .add_step(technician, execution.id, n as i32, sample.id, None, "")
                .unwrap()
        })
        .collect();
    (execution, steps)
}

/// In-memory ledger whose appends can be made to fail.
pub(crate) struct FailingLedger {
    inner: InMemoryLedger,
    /// Appends still allowed before failing; `None` never fails.
    allowed: Mutex<Option<usize>>,
}

impl FailingLedger {
    pub(crate) fn new() -> Self {
        Self { inner: InMemoryLedger::new(clock()), allowed: Mutex::new(None) }
    }

    /// Let `n` more appends through, then fail every one after.
    pub(crate) fn fail_after(&self, n: usize) {
        *self.allowed.lock().unwrap() = Some(n);
    }
}

impl AuditLedger for FailingLedger {
    fn append(&self, entry: NewAuditRecord) -> LabtrailResult<AuditRecord> {
        {
            let mut allowed = self.allowed.lock().unwrap();
            match allowed.as_mut() {
                Some(0) => return Err(LabtrailError::LedgerWrite { reason: "journal unavailable".to_string() }),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.inner.append(entry)
    }

    fn history_for(&self, entity_type: &str, entity_id: i64) -> LabtrailResult<Vec<AuditRecord>> {
        self.inner.history_for(entity_type, entity_id)
    }

    fn chain(&self, entity_type: &str) -> LabtrailResult<Vec<AuditRecord>> {
        self.inner.chain(entity_type)
    }

    fn latest_signature(&self, entity_type: &str) -> LabtrailResult<Option<String>> {
        self.inner.latest_signature(entity_type)
    }

    fn records_for_users(&self, user_ids: &BTreeSet<i64>) -> LabtrailResult<Vec<AuditRecord>> {
        self.inner.records_for_users(user_ids)
    }

    fn count_footprint(&self, footprint: &AuditFootprint) -> LabtrailResult<usize> {
        self.inner.count_footprint(footprint)
    }
}
