//! Scenario 2: Tamper detection
//!
//! The bench run is recorded into a JSON-lines audit journal. Someone edits
//! one sample record in the journal file directly, changing where the
//! sample was stored. The journal is reopened and the lab tries to certify
//! a second execution.
//!
//! Pipeline walk-through for the demo run:
//!   1. Bench run certified over a journal-backed ledger
//!   2. Sample CREATE record edited on disk (signature left untouched)
//!   3. Journal reopened; records hydrated verbatim
//!   4. Per-entity verification of the Sample chain reports the mismatch
//!   5. Certification of a new execution is refused; report row REVOKED

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use labtrail_audit::JournalLedger;
use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    integrity::ChainCheck,
    lab::Sample,
    report::CertifiedReport,
};
use labtrail_core::{traits::AuditLedger, SystemClock};

use crate::fixtures::{scenario_config, Staff};
use crate::services::NewProtocol;
use crate::Lab;

use super::{certification::bench_run, seeded_lab};

/// What the lab saw after the journal was edited.
#[derive(Debug)]
pub struct TamperOutcome {
    pub tampered_record_id: i64,
    pub sample_chain: ChainCheck,
    pub refusal: LabtrailError,
    pub revoked: Option<CertifiedReport>,
}

/// Rewrite the recorded `location` of the first Sample record in the
/// journal at `path`, in both its changes and its snapshot. Returns the
/// edited record's id.
pub fn edit_first_sample_record(path: &Path, location: &str) -> LabtrailResult<i64> {
    let storage = |e: std::io::Error| LabtrailError::Storage {
        reason: format!("failed to edit journal '{}': {}", path.display(), e),
    };
    let contents = fs::read_to_string(path).map_err(storage)?;

    let mut edited_id = None;
    let mut lines = Vec::new();
    for line in contents.lines() {
        let mut record: Value = serde_json::from_str(line).map_err(|e| LabtrailError::Storage {
            reason: format!("unreadable journal line: {}", e),
        })?;
        if edited_id.is_none() && record["entity_type"] == Sample::ENTITY_TYPE {
            record["changes"]["location"]["after"] = Value::String(location.to_string());
            record["snapshot_after"]["location"] = Value::String(location.to_string());
            edited_id = record["id"].as_i64();
        }
        lines.push(record.to_string());
    }

    let id = edited_id.ok_or_else(|| LabtrailError::Storage {
        reason: "journal holds no Sample record".to_string(),
    })?;
    fs::write(path, lines.join("\n") + "\n").map_err(storage)?;
    Ok(id)
}

/// Certify once, tamper with the journal, reopen it and try again.
pub fn tamper_and_certify(journal: &Path) -> LabtrailResult<TamperOutcome> {
    let mut config = scenario_config();
    config.ledger.journal_path = Some(journal.to_path_buf());

    let (lab, staff) = seeded_lab(config.clone())?;
    bench_run(&lab, &staff)?;
    let Lab { store, blobs, policy, .. } = lab;

    let tampered_record_id = edit_first_sample_record(journal, "Unlogged bench fridge")?;

    let clock = Arc::new(SystemClock);
    let ledger: Arc<dyn AuditLedger> = Arc::new(JournalLedger::open(journal, clock.clone())?);
    let lab = Lab::assemble(config, policy, clock, ledger, store, blobs)?;

    let sample_chain = lab.verifier.verify(Sample::ENTITY_TYPE)?;
    let execution_id = second_execution(&lab, &staff)?;

    let refusal = match lab.certify(&staff.reviewer, execution_id, "Follow-up run.") {
        Ok(report) => {
            return Err(LabtrailError::Storage {
                reason: format!("report {} was certified over a tampered journal", report.id),
            })
        }
        Err(e) => e,
    };
    let revoked = lab.certifier.registry().for_execution(execution_id)?.pop();

    Ok(TamperOutcome {
        tampered_record_id,
        sample_chain,
        refusal,
        revoked,
    })
}

fn second_execution(lab: &Lab, staff: &Staff) -> LabtrailResult<i64> {
    let protocol = lab.protocols.create(
        &staff.reviewer,
        NewProtocol {
            title: "Plasma nucleic acid QC (repeat)".to_string(),
            ..NewProtocol::default()
        },
    )?;
    let execution = lab.executions.start(&staff.technician, protocol.id, None, None)?;
    lab.executions.complete(&staff.technician, execution.id, "")?;
    Ok(execution.id)
}

/// Run Scenario 2 and print each stage.
pub fn run_scenario() -> LabtrailResult<()> {
    println!("=== Scenario 2: Tamper detection ===");
    println!();

    let dir = tempfile::tempdir().map_err(|e| LabtrailError::Storage {
        reason: format!("failed to create scratch directory: {}", e),
    })?;
    let journal = dir.path().join("audit.jsonl");

    let outcome = tamper_and_certify(&journal)?;

    println!("  Journal:          {}", journal.display());
    println!("  Edited record:    #{} (Sample location, signature kept)", outcome.tampered_record_id);
    println!(
        "  Sample chain:     {} ({})",
        if outcome.sample_chain.is_valid { "VALID" } else { "BROKEN" },
        outcome.sample_chain.message
    );
    println!("  Certification:    refused: {}", outcome.refusal);
    if let Some(report) = &outcome.revoked {
        println!("  Report row:       #{} {} ({})", report.id, report.state, report.revocation_reason);
    }
    println!();
    Ok(())
}
