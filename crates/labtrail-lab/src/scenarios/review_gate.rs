//! Scenario 3: Human review gate
//!
//! Two AI extractions arrive for one instrument file. Neither becomes
//! authoritative until a QA reviewer decides.
//!
//! Pipeline walk-through for the demo run:
//!   1. Technician uploads the instrument file (a second upload is deduplicated)
//!   2. First proposal violates the schema; stored pending with its violations
//!   3. Technician tries to confirm it; denied by the access policy
//!   4. Reviewer confirms as extracted; refused by the schema
//!   5. Reviewer confirms with a corrected payload; VALIDATED
//!   6. Second proposal with low confidence is rejected with a reason

use std::collections::BTreeMap;

use serde_json::json;

use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    lab::ParsedData,
    validation::ValidationFailure,
};

use crate::fixtures::{extraction_payload, scenario_config, Staff, SPECTRO_CSV};
use crate::Lab;

use super::seeded_lab;

/// What the reviewer saw and decided.
#[derive(Debug)]
pub struct ReviewOutcome {
    pub duplicate_upload: bool,
    pub schema_failure: Option<ValidationFailure>,
    pub technician_denied: LabtrailError,
    pub unchanged_refused: LabtrailError,
    pub confirmed: ParsedData,
    pub rejected: ParsedData,
    pub still_pending: usize,
}

pub fn review_batch(lab: &Lab, staff: &Staff) -> LabtrailResult<ReviewOutcome> {
    let upload = lab
        .parsing
        .upload(&staff.technician, "spec01_run.csv", SPECTRO_CSV.as_bytes(), "text/csv")?;
    let again = lab
        .parsing
        .upload(&staff.technician, "spec01_run (1).csv", SPECTRO_CSV.as_bytes(), "text/csv")?;

    let mut misread = extraction_payload();
    misread["sample_records"][0]["sample_type"] = json!("plasma-edta");
    misread["sample_records"][0]["storage_temperature"] = json!(-300);
    let proposal = lab.parsing.propose(
        &staff.technician,
        upload.raw_file.id,
        misread,
        "extractor-v2",
        0.81,
        BTreeMap::new(),
    )?;
    let schema_failure = proposal.validation.err();
    let id = proposal.parsed_data.id;

    let technician_denied = expect_refusal(lab.parsing.confirm(&staff.technician, id, None, ""))?;
    let unchanged_refused = expect_refusal(lab.parsing.confirm(&staff.reviewer, id, None, ""))?;
    let confirmed = lab.parsing.confirm(
        &staff.reviewer,
        id,
        Some(extraction_payload()),
        "Type and temperature corrected from the paper log.",
    )?;

    let low_confidence = lab.parsing.propose(
        &staff.technician,
        upload.raw_file.id,
        extraction_payload(),
        "extractor-v1",
        0.42,
        BTreeMap::from([("sample_records/0/sample_id".to_string(), 0.35)]),
    )?;
    let rejected = lab.parsing.reject(
        &staff.reviewer,
        low_confidence.parsed_data.id,
        "Sample identifier unreadable in the scan.",
    )?;

    Ok(ReviewOutcome {
        duplicate_upload: again.duplicate,
        schema_failure,
        technician_denied,
        unchanged_refused,
        confirmed,
        rejected,
        still_pending: lab.parsing.pending_reviews(&staff.reviewer)?.len(),
    })
}

fn expect_refusal<T>(result: LabtrailResult<T>) -> LabtrailResult<LabtrailError> {
    match result {
        Ok(_) => Err(LabtrailError::InvalidTransition {
            entity: ParsedData::ENTITY_TYPE.to_string(),
            from: "pending".to_string(),
            to: "validated without review".to_string(),
        }),
        Err(e) => Ok(e),
    }
}

/// Run Scenario 3 and print each stage.
pub fn run_scenario() -> LabtrailResult<()> {
    println!("=== Scenario 3: Human review gate ===");
    println!();

    let (lab, staff) = seeded_lab(scenario_config())?;
    let outcome = review_batch(&lab, &staff)?;

    println!("  Second upload deduplicated: {}", if outcome.duplicate_upload { "yes" } else { "no" });
    match &outcome.schema_failure {
        Some(failure) => {
            println!("  Proposal failed schema ({} violation(s)):", failure.violations.len());
            for violation in &failure.violations {
                println!("    {} : {}", violation.path, violation.message);
            }
        }
        None => println!("  Proposal passed schema"),
    }
    println!("  Technician confirm:   {}", outcome.technician_denied);
    println!("  Unchanged confirm:    {}", outcome.unchanged_refused);
    println!(
        "  Corrected confirm:    #{} {} by user {}",
        outcome.confirmed.id,
        outcome.confirmed.state,
        outcome.confirmed.validated_by.unwrap_or_default()
    );
    println!(
        "  Low-confidence proposal #{} {} ({})",
        outcome.rejected.id, outcome.rejected.state, outcome.rejected.validation_notes
    );
    println!("  Still awaiting review: {}", outcome.still_pending);
    println!();
    Ok(())
}
