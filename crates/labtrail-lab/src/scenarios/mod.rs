//! End-to-end scenarios run by the demo CLI.
//!
//! Each scenario builds its own `Lab` over fictional data, drives the real
//! services, and prints what happened at each trust boundary. The
//! non-printing halves (`bench_run`, `tamper_and_certify`, `review_batch`)
//! are what the tests exercise.

pub mod certification;
pub mod review_gate;
pub mod tamper;

use std::sync::Arc;

use labtrail_contracts::error::LabtrailResult;
use labtrail_core::{LabtrailConfig, SystemClock};

use crate::fixtures::{lab_policy, seed_tenant, Staff};
use crate::Lab;

/// A lab over `config` with one seeded tenant.
pub(crate) fn seeded_lab(config: LabtrailConfig) -> LabtrailResult<(Lab, Staff)> {
    let lab = Lab::new(config, Arc::new(lab_policy()?), Arc::new(SystemClock))?;
    let (_, staff) = seed_tenant(&lab.store, "Northbridge Biobank", "northbridge")?;
    Ok((lab, staff))
}
