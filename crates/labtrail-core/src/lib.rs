//! # labtrail-core
//!
//! Trait seams, the mutation recorder, and configuration for labtrail.
//!
//! This crate provides:
//! - The trait boundaries (`AuditLedger`, `Clock`, `AccessPolicy`,
//!   `ExtractionValidator`, `DocumentRenderer`, `BlobStore`, `ExecutionSource`)
//! - The `MutationRecorder`, the single write path for audited changes
//! - `LabtrailConfig`, loaded from TOML
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labtrail_core::{Mutation, MutationRecorder};
//!
//! let recorder = MutationRecorder::new(ledger.clone());
//! recorder.record_with(Mutation::create("Sample", id, after).attributed_to(&user), |_| {
//!     tables.samples.insert(id, sample);
//! })?;
//! ```

pub mod blob;
pub mod clock;
pub mod config;
pub mod recorder;
pub mod traits;

pub use blob::InMemoryBlobStore;
pub use clock::{FixedClock, StepClock, SystemClock};
pub use config::LabtrailConfig;
pub use recorder::{Mutation, MutationRecorder};

use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    lab::User,
    policy::{AccessDecision, Permission},
};
use tracing::warn;

use crate::traits::AccessPolicy;

/// Check `permission` for `user` and turn a denial into
/// `LabtrailError::PermissionDenied`.
pub fn ensure_permitted(
    policy: &dyn AccessPolicy,
    user: &User,
    permission: Permission,
) -> LabtrailResult<()> {
    match policy.check(user, permission)? {
        AccessDecision::Allow => Ok(()),
        AccessDecision::Deny { reason } => {
            warn!(
                user = %user.username,
                permission = %permission,
                reason = %reason,
                "access denied"
            );
            Err(LabtrailError::PermissionDenied {
                user: user.username.clone(),
                permission: permission.as_str().to_string(),
            })
        }
    }
}
