//! Plain-text renderer.
//!
//! A first-class output, not a stub: the certifier uses it whenever text is
//! configured and whenever the preferred renderer fails. Section rules and
//! the certification notes fit in 80 columns.

use chrono::SecondsFormat;

use labtrail_contracts::{
    error::LabtrailResult,
    report::{DocumentFormat, ReportDocument},
};
use labtrail_core::traits::DocumentRenderer;

use super::wrap;

const WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TextRenderer {
    /// The report as text lines, without trailing newline.
    pub fn lines(&self, doc: &ReportDocument) -> Vec<String> {
        let heavy = "=".repeat(WIDTH);
        let light = "-".repeat(WIDTH);
        let exec = &doc.data.execution;

        let mut lines = vec![
            heavy.clone(),
            "CERTIFIED EXECUTION REPORT".to_string(),
            heavy.clone(),
            String::new(),
            format!("Report ID: {}", doc.report_id),
            format!("Execution ID: {}", exec.id),
            format!("Generated: {}", doc.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            format!("Certified By: {}", doc.certified_by),
            String::new(),
            "EXECUTION SUMMARY".to_string(),
            light.clone(),
            format!("Protocol: {}", exec.protocol),
            format!("Equipment: {}", exec.equipment),
            format!("Started: {}", exec.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            format!(
                "Completed: {}",
                exec.completed_at
                    .map_or_else(|| "In Progress".to_string(), |t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            ),
            format!("Status: {}", exec.status),
            String::new(),
            "EXECUTION STEPS".to_string(),
            light.clone(),
        ];

        for step in &doc.data.steps {
            lines.push(format!(
                "Step {}: {} - Valid: {} - {}",
                step.step_number,
                step.sample,
                if step.is_valid { "✓" } else { "✗" },
                step.notes
            ));
        }

        lines.extend([
            String::new(),
            "AUDIT TRAIL SUMMARY".to_string(),
            light.clone(),
            format!("Total Audit Records: {}", doc.data.audit_records_count),
            format!("Verified Records: {}", doc.integrity.verified_records),
            format!("Corrupted Records: {}", doc.integrity.corrupted_count()),
            format!(
                "Chain Integrity: {}",
                if doc.integrity.chain_integrity_ok { "✓ VALID" } else { "✗ BROKEN" }
            ),
            String::new(),
        ]);

        if !doc.notes.trim().is_empty() {
            lines.push("CERTIFICATION NOTES".to_string());
            lines.push(light);
            lines.extend(wrap(&doc.notes, WIDTH));
            lines.push(String::new());
        }

        lines.push(heavy.clone());
        lines.extend(wrap(&doc.compliance_statement(), WIDTH));
        lines.push(heavy);
        lines
    }
}

impl DocumentRenderer for TextRenderer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Text
    }

    fn render(&self, document: &ReportDocument) -> LabtrailResult<Vec<u8>> {
        Ok(self.lines(document).join("\n").into_bytes())
    }
}
