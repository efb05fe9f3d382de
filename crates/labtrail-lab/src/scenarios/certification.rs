//! Scenario 1: Certified bench run
//!
//! A technician processes one plasma sample on the spectrophotometer, the
//! QA reviewer confirms the AI extraction of the instrument file, and the
//! completed execution is certified.
//!
//! Pipeline walk-through for the demo run:
//!   1. Reviewer creates the protocol; technician registers the sample
//!   2. Instrument file uploaded (SHA-256), AI proposal stored as pending
//!   3. Reviewer confirms the proposal (review gate)
//!   4. Execution started, step recorded with the confirmed result, step
//!      validated, execution completed
//!   5. Tenant-wide audit verification passes; report rendered, hashed,
//!      stored and certified
//!   6. Stored document re-hashed against the recorded hash

use std::collections::BTreeMap;

use chrono::{Duration, SecondsFormat};

use labtrail_contracts::{
    error::LabtrailResult,
    lab::{Execution, ParsedData, Sample},
    report::CertifiedReport,
};
use labtrail_core::traits::Clock;

use crate::fixtures::{extraction_payload, scenario_config, Staff, SPECTRO_CSV};
use crate::services::{NewProtocol, NewSample};
use crate::Lab;

use super::seeded_lab;

/// Everything the bench run produced.
#[derive(Debug, Clone)]
pub struct BenchRun {
    pub sample: Sample,
    pub parsed_data: ParsedData,
    pub execution: Execution,
    pub report: CertifiedReport,
}

/// Drive the full pipeline for `staff`'s tenant and certify the execution.
pub fn bench_run(lab: &Lab, staff: &Staff) -> LabtrailResult<BenchRun> {
    let protocol = lab.protocols.create(
        &staff.reviewer,
        NewProtocol {
            title: "Plasma nucleic acid QC".to_string(),
            description: "A260/A280 purity check before sequencing".to_string(),
            steps: "1. Blank instrument\n2. Load 2 µl\n3. Read A260/A280".to_string(),
        },
    )?;

    let sample = lab.samples.create(
        &staff.technician,
        NewSample {
            name: "Plasma draw A".to_string(),
            sample_type: "plasma".to_string(),
            received_at: lab.clock.now() - Duration::hours(2),
            location: "Freezer B, rack 3".to_string(),
        },
    )?;

    let equipment = lab.store.register_equipment(
        staff.technician.tenant_id,
        "SPEC-01",
        "UV-Vis Spectrophotometer",
        "spectrophotometer",
        "Room 2.14",
        Some("UV-4471-B"),
    )?;

    let upload = lab
        .parsing
        .upload(&staff.technician, "spec01_run.csv", SPECTRO_CSV.as_bytes(), "text/csv")?;
    let field_confidence = BTreeMap::from([
        ("sample_records/0/sample_id".to_string(), 0.99),
        ("sample_records/0/storage_temperature".to_string(), 0.64),
    ]);
    let proposal = lab.parsing.propose(
        &staff.technician,
        upload.raw_file.id,
        extraction_payload(),
        "extractor-v2",
        0.93,
        field_confidence,
    )?;
    let parsed_data = lab.parsing.confirm(
        &staff.reviewer,
        proposal.parsed_data.id,
        None,
        "Storage temperature checked against freezer log.",
    )?;

    let execution = lab
        .executions
        .start(&staff.technician, protocol.id, Some(equipment.id), Some(upload.raw_file.id))?;
    let step = lab.executions.add_step(
        &staff.technician,
        execution.id,
        1,
        sample.id,
        Some(parsed_data.id),
        "A260/A280 = 1.94",
    )?;
    lab.executions
        .validate_step(&staff.technician, step.id, true, "Purity within 1.8-2.0")?;
    let execution = lab
        .executions
        .complete(&staff.technician, execution.id, "Run completed without deviations.")?;

    let report = lab.certify(&staff.reviewer, execution.id, "Reviewed against bench notebook p. 42.")?;

    Ok(BenchRun {
        sample,
        parsed_data,
        execution,
        report,
    })
}

/// Run Scenario 1 and print each stage.
pub fn run_scenario() -> LabtrailResult<()> {
    println!("=== Scenario 1: Certified bench run ===");
    println!();

    let (lab, staff) = seeded_lab(scenario_config())?;
    let run = bench_run(&lab, &staff)?;

    println!("  Sample:      {} ({})", run.sample.name, run.sample.sample_type);
    println!(
        "  Extraction:  #{} {} (flagged: {})",
        run.parsed_data.id,
        run.parsed_data.state,
        if run.parsed_data.flagged_fields.is_empty() {
            "none".to_string()
        } else {
            run.parsed_data.flagged_fields.join(", ")
        }
    );
    println!("  Execution:   #{} {}", run.execution.id, run.execution.status);
    println!();

    let report = &run.report;
    let integrity = report.chain_verification_details.as_ref();
    println!("  Report:      #{} {}", report.id, report.state);
    println!(
        "  Verified:    {} of {} audit records",
        integrity.map_or(0, |i| i.verified_records),
        integrity.map_or(0, |i| i.total_records)
    );
    println!("  File:        {} ({} bytes)", report.pdf_filename, report.pdf_size);
    println!("  SHA-256:     {}", report.report_hash);
    if let Some(at) = report.certified_at {
        println!("  Certified:   {}", at.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    let intact = lab.certifier.verify_document(report.id)?;
    println!("  Stored document matches hash: {}", if intact { "yes" } else { "NO" });
    println!();
    Ok(())
}
