//! Audited business services.
//!
//! Every mutating operation follows the same unit of work:
//!
//! ```text
//!   check permission → take store write lock → validate
//!     → append audit record → commit entity write
//! ```
//!
//! The entity write is the infallible tail handed to
//! `MutationRecorder::record_with`, so a failed audit append leaves the store
//! untouched.

pub mod executions;
pub mod parsing;
pub mod protocols;
pub mod samples;

pub use executions::ExecutionService;
pub use parsing::{ParsingService, Proposal, Upload};
pub use protocols::{NewProtocol, ProtocolService, ProtocolUpdate};
pub use samples::{NewSample, SampleService, SampleUpdate};

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use labtrail_contracts::{
    audit::Snapshot,
    error::LabtrailResult,
    lab::User,
    policy::Permission,
};
use labtrail_core::{
    ensure_permitted,
    traits::{AccessPolicy, BlobStore, Clock},
    MutationRecorder,
};

use crate::store::LabStore;

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<LabStore>,
    pub recorder: MutationRecorder,
    pub policy: Arc<dyn AccessPolicy>,
    pub blobs: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
}

impl ServiceContext {
    pub(crate) fn authorize(&self, user: &User, permission: Permission) -> LabtrailResult<()> {
        ensure_permitted(self.policy.as_ref(), user, permission)
    }
}

/// Turn a `json!` object into a `Snapshot`. Non-objects become empty.
pub(crate) fn snapshot(value: Value) -> Snapshot {
    match value {
        Value::Object(map) => map,
        _ => Snapshot::new(),
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub(crate) fn optional_timestamp(at: Option<DateTime<Utc>>) -> Value {
    at.map_or(Value::Null, timestamp)
}
