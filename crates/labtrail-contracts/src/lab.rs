//! Laboratory entities.
//!
//! These are the records business services mutate and audit. Each type
//! carries a stable `ENTITY_TYPE` name; that name scopes the audit chain the
//! entity's mutations are appended to.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An isolated laboratory organisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

/// A person acting inside one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub tenant_id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Role name resolved by the access policy, e.g. `"lab_technician"`.
    pub role: Option<String>,
    pub is_active: bool,
}

impl User {
    /// Full name when known, otherwise the username.
    pub fn display_name(&self) -> &str {
        match &self.full_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

/// A biological sample. Soft-deleted samples keep their row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: i64,
    pub name: String,
    pub sample_type: String,
    pub received_at: DateTime<Utc>,
    pub location: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Sample {
    pub const ENTITY_TYPE: &'static str = "Sample";

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A laboratory or analysis protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub steps: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Protocol {
    pub const ENTITY_TYPE: &'static str = "Protocol";

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// An instrument that produces machine files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i64,
    pub tenant_id: i64,
    /// Identifier printed on the instrument's output files.
    pub equipment_code: String,
    pub equipment_name: String,
    pub equipment_type: String,
    pub location: String,
    pub serial_number: Option<String>,
    pub status: String,
}

/// An uploaded machine file. Content lives in the blob store under
/// `storage_key`; `file_hash` is the SHA-256 of that content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFile {
    pub id: i64,
    pub tenant_id: i64,
    pub user_id: i64,
    pub filename: String,
    pub file_hash: String,
    pub file_size: u64,
    pub mime_type: String,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}

impl RawFile {
    pub const ENTITY_TYPE: &'static str = "RawFile";
}

/// Review state of an AI extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsedDataState {
    /// Awaiting human review.
    Pending,
    /// Confirmed by an authorised reviewer.
    Validated,
    /// Rejected by a reviewer.
    Rejected,
    /// Replaced by a newer extraction of the same file.
    Superseded,
}

impl ParsedDataState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsedDataState::Pending => "pending",
            ParsedDataState::Validated => "validated",
            ParsedDataState::Rejected => "rejected",
            ParsedDataState::Superseded => "superseded",
        }
    }
}

impl fmt::Display for ParsedDataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An AI extraction proposal and its review outcome.
///
/// `parsed_json` is never authoritative. Only `confirmed_json`, written by
/// the review gate, is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedData {
    pub id: i64,
    pub raw_file_id: i64,
    pub tenant_id: i64,
    pub extracted_at: DateTime<Utc>,
    pub parsed_json: Value,
    pub extraction_confidence: f64,
    pub extraction_model: String,
    pub field_confidence_scores: BTreeMap<String, f64>,
    /// Fields whose confidence fell below `confidence_threshold`.
    pub flagged_fields: Vec<String>,
    pub confidence_threshold: f64,
    pub schema_valid: bool,
    pub state: ParsedDataState,
    pub validated_by: Option<i64>,
    pub validated_at: Option<DateTime<Utc>>,
    pub validation_notes: String,
    pub confirmed_json: Option<Value>,
}

impl ParsedData {
    pub const ENTITY_TYPE: &'static str = "ParsedData";
}

/// Lifecycle of a protocol execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
    Validated,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Validated => "validated",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of a protocol, owned by a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub tenant_id: i64,
    pub protocol_id: i64,
    pub equipment_id: Option<i64>,
    pub started_by: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub source_file_id: Option<i64>,
    pub notes: String,
}

impl Execution {
    pub const ENTITY_TYPE: &'static str = "ExecutionLog";
}

/// A single step of an execution: sample, optional result, technician check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: i64,
    pub execution_id: i64,
    pub step_number: i32,
    pub sample_id: i64,
    pub parsed_data_id: Option<i64>,
    pub is_valid: bool,
    pub validation_notes: String,
}

impl ExecutionStep {
    pub const ENTITY_TYPE: &'static str = "ExecutionStep";
}

/// Everything a report needs about one execution, joined by the data source.
///
/// `samples` includes soft-deleted samples still referenced by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionBundle {
    pub execution: Execution,
    pub protocol: Option<Protocol>,
    pub equipment: Option<Equipment>,
    /// Ordered by step number.
    pub steps: Vec<ExecutionStep>,
    pub samples: Vec<Sample>,
    pub parsed_data: Vec<ParsedData>,
}
