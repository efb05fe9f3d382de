//! Core trait definitions for the labtrail write and certification paths.
//!
//! These traits mark the trust boundaries of the system:
//!
//! - `AuditLedger`         : append-only, hash-chained mutation log
//! - `Clock`               : the single source of "now"
//! - `AccessPolicy`        : role-based gate checked before every mutation
//! - `ExtractionValidator` : strict structural check on AI proposals
//! - `DocumentRenderer`    : turns a report document into bytes
//! - `BlobStore`           : opaque byte storage for files and reports
//! - `ExecutionSource`     : read access to execution data for reporting
//!
//! Business services and the certifier only ever see these traits, so every
//! backend can be swapped in tests.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use labtrail_contracts::{
    audit::{AuditFootprint, AuditRecord, NewAuditRecord},
    error::LabtrailResult,
    lab::{ExecutionBundle, User},
    policy::{AccessDecision, Permission},
    report::{DocumentFormat, ReportDocument},
    validation::{ValidatedData, ValidationFailure},
};

/// Durable, append-only storage of signed audit records.
///
/// Implementations are **trusted**. `append` must link, sign and persist the
/// record inside one critical section per `entity_type`, so two concurrent
/// appends to the same chain never observe the same predecessor. Appends to
/// different entity types may proceed in parallel.
pub trait AuditLedger: Send + Sync {
    /// Link `entry` to the tip of its entity type's chain, stamp it with the
    /// current time (whole seconds), sign it, self-check it, and persist it.
    ///
    /// Returns `LabtrailError::SignatureMismatch` if the stored form fails its
    /// own signature re-derivation; nothing is persisted in that case.
    fn append(&self, entry: NewAuditRecord) -> LabtrailResult<AuditRecord>;

    /// Every record for one entity, ascending by `(timestamp, id)`.
    fn history_for(&self, entity_type: &str, entity_id: i64) -> LabtrailResult<Vec<AuditRecord>>;

    /// The full chain of one entity type, ascending by `(timestamp, id)`.
    fn chain(&self, entity_type: &str) -> LabtrailResult<Vec<AuditRecord>>;

    /// Signature of the current chain tip, `None` for an empty chain.
    fn latest_signature(&self, entity_type: &str) -> LabtrailResult<Option<String>>;

    /// Records attributed to any of `user_ids`, across all entity types,
    /// ascending by `(timestamp, id)`.
    fn records_for_users(&self, user_ids: &BTreeSet<i64>) -> LabtrailResult<Vec<AuditRecord>>;

    /// Number of records touching any entity in `footprint`.
    fn count_footprint(&self, footprint: &AuditFootprint) -> LabtrailResult<usize>;
}

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Role-based access control.
///
/// Implementations must deny by default: anything not explicitly granted is
/// refused.
pub trait AccessPolicy: Send + Sync {
    fn check(&self, user: &User, permission: Permission) -> LabtrailResult<AccessDecision>;
}

/// Structural validator for AI extraction payloads.
///
/// A failing payload is an ordinary outcome routed to human review, so it is
/// returned as `Err(ValidationFailure)` rather than a `LabtrailError`.
pub trait ExtractionValidator: Send + Sync {
    fn schema_id(&self) -> &str;

    fn validate(&self, payload: &Value) -> Result<ValidatedData, ValidationFailure>;
}

/// Turns a certified report document into bytes.
pub trait DocumentRenderer: Send + Sync {
    fn format(&self) -> DocumentFormat;

    /// Render `document`. Output must be a pure function of the document so
    /// the resulting hash is reproducible.
    fn render(&self, document: &ReportDocument) -> LabtrailResult<Vec<u8>>;
}

/// Opaque key/value byte storage.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> LabtrailResult<()>;

    fn get(&self, key: &str) -> LabtrailResult<Option<Vec<u8>>>;
}

/// Read access to execution data, scoped by tenant.
pub trait ExecutionSource: Send + Sync {
    /// The execution with its protocol, equipment, steps, samples and parsed
    /// data, or `None` if it does not exist or belongs to another tenant.
    fn execution_bundle(
        &self,
        tenant_id: i64,
        execution_id: i64,
    ) -> LabtrailResult<Option<ExecutionBundle>>;

    /// Ids of every user belonging to the tenant.
    fn tenant_user_ids(&self, tenant_id: i64) -> LabtrailResult<BTreeSet<i64>>;
}
