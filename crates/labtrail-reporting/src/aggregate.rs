//! Execution data aggregation for certified reports.

use std::collections::BTreeSet;

use labtrail_contracts::{
    audit::AuditFootprint,
    error::LabtrailResult,
    lab::{Execution, ExecutionBundle, ExecutionStep, ParsedData},
    report::{ExecutionSummary, ParsedDataSummary, ReportData, SampleSummary, StepSummary},
};
use labtrail_core::traits::AuditLedger;

/// The entities whose audit records count toward an execution's report:
/// the execution itself, its steps, and the parsed data the steps link to.
pub fn footprint_of(bundle: &ExecutionBundle) -> AuditFootprint {
    let mut footprint = AuditFootprint::new();
    footprint.include(Execution::ENTITY_TYPE, [bundle.execution.id]);
    footprint.include(ExecutionStep::ENTITY_TYPE, bundle.steps.iter().map(|s| s.id));
    footprint.include(
        ParsedData::ENTITY_TYPE,
        bundle.steps.iter().filter_map(|s| s.parsed_data_id),
    );
    footprint
}

/// Summarize `bundle` and count its audit footprint in `ledger`.
///
/// Samples and parsed data are listed once each, in order of first use by
/// a step.
pub fn aggregate(bundle: &ExecutionBundle, ledger: &dyn AuditLedger) -> LabtrailResult<ReportData> {
    let execution = &bundle.execution;

    let summary = ExecutionSummary {
        id: execution.id,
        protocol: bundle
            .protocol
            .as_ref()
            .map_or_else(|| "Unknown".to_string(), |p| p.title.clone()),
        equipment: bundle
            .equipment
            .as_ref()
            .map_or_else(|| "None".to_string(), |e| e.equipment_name.clone()),
        started_at: execution.started_at,
        completed_at: execution.completed_at,
        status: execution.status.as_str().to_string(),
    };

    let mut steps: Vec<&ExecutionStep> = bundle.steps.iter().collect();
    steps.sort_by_key(|s| (s.step_number, s.id));

    let sample_name = |id: i64| {
        bundle
            .samples
            .iter()
            .find(|s| s.id == id)
            .map_or_else(|| "Unknown".to_string(), |s| s.name.clone())
    };

    let step_summaries = steps
        .iter()
        .map(|step| StepSummary {
            step_number: step.step_number,
            sample: sample_name(step.sample_id),
            parsed_data_id: step.parsed_data_id,
            is_valid: step.is_valid,
            notes: step.validation_notes.clone(),
        })
        .collect();

    let mut seen = BTreeSet::new();
    let samples = steps
        .iter()
        .filter(|step| seen.insert(step.sample_id))
        .filter_map(|step| bundle.samples.iter().find(|s| s.id == step.sample_id))
        .map(|s| SampleSummary {
            id: s.id,
            name: s.name.clone(),
            sample_type: s.sample_type.clone(),
            location: s.location.clone(),
        })
        .collect();

    let mut seen = BTreeSet::new();
    let parsed_data = steps
        .iter()
        .filter_map(|step| step.parsed_data_id)
        .filter(|id| seen.insert(*id))
        .filter_map(|id| bundle.parsed_data.iter().find(|pd| pd.id == id))
        .map(|pd| ParsedDataSummary {
            id: pd.id,
            state: pd.state.as_str().to_string(),
            model: pd.extraction_model.clone(),
            confidence: pd.extraction_confidence,
        })
        .collect();

    let audit_records_count = ledger.count_footprint(&footprint_of(bundle))?;

    Ok(ReportData {
        execution: summary,
        steps: step_summaries,
        samples,
        parsed_data,
        audit_records_count,
    })
}
