//! Certified report types.
//!
//! A `CertifiedReport` moves `Pending → Certified` or `Pending → Revoked`.
//! Both end states are terminal. `ReportDocument` is the renderer-agnostic
//! content that is turned into bytes and hashed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::integrity::IntegrityReport;

/// Lifecycle state of a certified report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportState {
    Pending,
    Certified,
    Revoked,
}

impl ReportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportState::Pending => "PENDING",
            ReportState::Certified => "CERTIFIED",
            ReportState::Revoked => "REVOKED",
        }
    }

    /// True for `Certified` and `Revoked`: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportState::Pending)
    }
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An export of one execution, stamped after the audit chain was verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertifiedReport {
    pub id: i64,
    pub tenant_id: i64,
    pub execution_id: i64,
    pub certified_by: i64,
    /// Set when the report reaches `Certified`.
    pub certified_at: Option<DateTime<Utc>>,
    /// SHA-256 (hex) of the rendered document bytes; empty until certified.
    pub report_hash: String,
    pub chain_integrity_verified: bool,
    pub chain_verification_details: Option<IntegrityReport>,
    pub pdf_filename: String,
    pub pdf_size: u64,
    pub state: ReportState,
    pub revocation_reason: String,
    pub created_at: DateTime<Utc>,
}

impl CertifiedReport {
    pub const ENTITY_TYPE: &'static str = "CertifiedReport";
}

/// Output format of a rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Pdf,
    Text,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Text => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Text => "text/plain; charset=utf-8",
        }
    }
}

// ── Aggregated execution data ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: i64,
    /// Protocol title, or `"Unknown"` when the protocol is gone.
    pub protocol: String,
    /// Equipment name, or `"None"` when no instrument was used.
    pub equipment: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub step_number: i32,
    pub sample: String,
    pub parsed_data_id: Option<i64>,
    pub is_valid: bool,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub id: i64,
    pub name: String,
    pub sample_type: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDataSummary {
    pub id: i64,
    pub state: String,
    pub model: String,
    pub confidence: f64,
}

/// Everything aggregated about an execution for its certified report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub execution: ExecutionSummary,
    /// Ordered by step number.
    pub steps: Vec<StepSummary>,
    /// Distinct samples touched by the steps.
    pub samples: Vec<SampleSummary>,
    /// Distinct parsed-data rows linked from the steps.
    pub parsed_data: Vec<ParsedDataSummary>,
    /// Audit records across the execution, its steps and its parsed data.
    pub audit_records_count: usize,
}

/// The renderer-agnostic content of a certified report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub report_id: i64,
    pub generated_at: DateTime<Utc>,
    /// Display name of the certifying user.
    pub certified_by: String,
    /// Regulatory standard named in the compliance statement.
    pub standard: String,
    pub data: ReportData,
    pub integrity: IntegrityReport,
    pub notes: String,
}

impl ReportDocument {
    /// The compliance statement printed at the end of every rendering.
    pub fn compliance_statement(&self) -> String {
        format!(
            "This report certifies {} compliance and audit trail integrity.",
            self.standard
        )
    }
}
