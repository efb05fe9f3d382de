//! Error types for the labtrail compliance backend.
//!
//! All fallible operations return `LabtrailResult<T>`. Variants carry enough
//! context to be written into an audit record or surfaced to an operator.
//!
//! Verification-time chain faults are deliberately absent here: a broken or
//! tampered chain is data, reported through `IntegrityReport`, not an error.

use std::collections::BTreeMap;

use thiserror::Error;

/// The unified error type for labtrail.
#[derive(Debug, Error)]
pub enum LabtrailError {
    /// A freshly built audit record failed its own signature re-derivation
    /// before commit. Nothing was persisted.
    #[error("signature mismatch on {entity_type} audit record: expected {expected}, got {found}")]
    SignatureMismatch {
        entity_type: String,
        expected: String,
        found: String,
    },

    /// The ledger already holds a record with this signature.
    #[error("audit signature {signature} already exists in the ledger")]
    DuplicateSignature { signature: String },

    /// Certification refused because tenant-wide verification found corrupted
    /// records. The report row was persisted as revoked before this was raised.
    #[error(
        "cannot certify report {report_id}: audit chain corrupted, \
         {corrupted} records failed verification"
    )]
    ChainCorrupted { report_id: i64, corrupted: usize },

    /// A referenced entity does not exist or is not visible to the caller.
    #[error("{entity_type} with id {id} not found")]
    NotFound { entity_type: String, id: i64 },

    /// Business-rule validation failed. Keys are field names.
    #[error("validation failed: {}", format_field_errors(.errors))]
    Validation { errors: BTreeMap<String, String> },

    /// A payload did not satisfy a strict structural schema.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// The acting user's role does not grant the required permission.
    #[error("user '{user}' lacks permission '{permission}'")]
    PermissionDenied { user: String, permission: String },

    /// A state machine was asked to perform an illegal transition.
    #[error("illegal {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// The ledger could not durably persist an audit record.
    ///
    /// Fatal for the enclosing unit of work: the entity mutation is dropped.
    #[error("audit ledger write failed: {reason}")]
    LedgerWrite { reason: String },

    /// A document renderer failed.
    #[error("document rendering failed: {reason}")]
    Render { reason: String },

    /// Blob or record storage failed outside the audit ledger.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl LabtrailError {
    /// Shorthand for `NotFound`.
    pub fn not_found(entity_type: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }

    /// Build a `Validation` error for a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), message.into());
        Self::Validation { errors }
    }
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout the labtrail crates.
pub type LabtrailResult<T> = Result<T, LabtrailError>;
