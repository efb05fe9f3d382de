//! Extraction validation result types.
//!
//! The structural validator returns `Result<ValidatedData, ValidationFailure>`.
//! A failure is a normal outcome consumed by the human review gate, not an
//! exceptional one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An extraction payload that satisfied the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedData {
    /// The schema the payload was checked against.
    pub schema_id: String,
    pub payload: Value,
    pub equipment_count: usize,
    pub sample_count: usize,
}

/// One violated constraint inside an extraction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// JSON pointer to the offending value, e.g. `/sample_records/0/sample_type`.
    pub path: String,
    pub message: String,
}

/// An extraction payload that did not satisfy the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("extraction payload failed schema '{schema_id}' ({count} violation(s))", count = .violations.len())]
pub struct ValidationFailure {
    pub schema_id: String,
    /// Every violation found. Never empty.
    pub violations: Vec<FieldViolation>,
}

impl ValidationFailure {
    /// All violations joined into one line, for audit changes and errors.
    pub fn describe(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.path, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
