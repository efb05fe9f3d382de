//! Document renderers.
//!
//! Both renderers are pure functions of the `ReportDocument`: rendering the
//! same document twice yields identical bytes, so the report hash can be
//! reproduced from the stored document.

pub mod pdf;
pub mod text;

pub use pdf::PdfRenderer;
pub use text::TextRenderer;

use labtrail_contracts::report::DocumentFormat;
use labtrail_core::traits::DocumentRenderer;

/// The renderer for `format`.
pub fn renderer_for(format: DocumentFormat) -> Box<dyn DocumentRenderer> {
    match format {
        DocumentFormat::Pdf => Box::new(PdfRenderer::new()),
        DocumentFormat::Text => Box::new(TextRenderer),
    }
}

/// Shorten `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max).collect();
    short.push_str("...");
    short
}

/// Greedy word wrap at `width` characters. Words longer than `width` are
/// split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};

    use labtrail_contracts::{
        integrity::IntegrityReport,
        report::{ExecutionSummary, ReportData, ReportDocument, SampleSummary, StepSummary},
    };

    pub(crate) fn step(step_number: i32, sample: &str, is_valid: bool, notes: &str) -> StepSummary {
        StepSummary {
            step_number,
            sample: sample.to_string(),
            parsed_data_id: None,
            is_valid,
            notes: notes.to_string(),
        }
    }

    pub(crate) fn document() -> ReportDocument {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut integrity = IntegrityReport::empty();
        integrity.total_records = 6;
        integrity.verified_records = 6;

        ReportDocument {
            report_id: 3,
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            certified_by: "Quinn Approver".to_string(),
            standard: "21 CFR Part 11".to_string(),
            data: ReportData {
                execution: ExecutionSummary {
                    id: 42,
                    protocol: "DNA Extraction".to_string(),
                    equipment: "None".to_string(),
                    started_at: started,
                    completed_at: None,
                    status: "completed".to_string(),
                },
                steps: vec![
                    step(1, "Sample A", true, "Step 1 OK"),
                    step(2, "Sample B", false, "Low yield"),
                ],
                samples: vec![SampleSummary {
                    id: 1,
                    name: "Sample A".to_string(),
                    sample_type: "blood".to_string(),
                    location: "Freezer 1".to_string(),
                }],
                parsed_data: vec![],
                audit_records_count: 4,
            },
            integrity,
            notes: "All steps reviewed at the bench.".to_string(),
        }
    }
}
