//! Permission and access decision types.
//!
//! Access is deny-by-default: a user may perform an action only when their
//! role explicitly grants the matching permission.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single grantable permission, serialized as its codename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "sample:view")]
    SampleView,
    #[serde(rename = "sample:create")]
    SampleCreate,
    #[serde(rename = "sample:update")]
    SampleUpdate,
    #[serde(rename = "sample:delete")]
    SampleDelete,
    #[serde(rename = "protocol:view")]
    ProtocolView,
    #[serde(rename = "protocol:create")]
    ProtocolCreate,
    #[serde(rename = "protocol:update")]
    ProtocolUpdate,
    #[serde(rename = "protocol:delete")]
    ProtocolDelete,
    #[serde(rename = "execution:view")]
    ExecutionView,
    #[serde(rename = "execution:run")]
    ExecutionRun,
    #[serde(rename = "execution:validate")]
    ExecutionValidate,
    #[serde(rename = "data:upload")]
    DataUpload,
    #[serde(rename = "data:validate")]
    DataValidate,
    #[serde(rename = "audit:view")]
    AuditView,
    #[serde(rename = "audit:export")]
    AuditExport,
    #[serde(rename = "user:manage")]
    UserManage,
    #[serde(rename = "role:manage")]
    RoleManage,
}

impl Permission {
    pub const ALL: [Permission; 17] = [
        Permission::SampleView,
        Permission::SampleCreate,
        Permission::SampleUpdate,
        Permission::SampleDelete,
        Permission::ProtocolView,
        Permission::ProtocolCreate,
        Permission::ProtocolUpdate,
        Permission::ProtocolDelete,
        Permission::ExecutionView,
        Permission::ExecutionRun,
        Permission::ExecutionValidate,
        Permission::DataUpload,
        Permission::DataValidate,
        Permission::AuditView,
        Permission::AuditExport,
        Permission::UserManage,
        Permission::RoleManage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::SampleView => "sample:view",
            Permission::SampleCreate => "sample:create",
            Permission::SampleUpdate => "sample:update",
            Permission::SampleDelete => "sample:delete",
            Permission::ProtocolView => "protocol:view",
            Permission::ProtocolCreate => "protocol:create",
            Permission::ProtocolUpdate => "protocol:update",
            Permission::ProtocolDelete => "protocol:delete",
            Permission::ExecutionView => "execution:view",
            Permission::ExecutionRun => "execution:run",
            Permission::ExecutionValidate => "execution:validate",
            Permission::DataUpload => "data:upload",
            Permission::DataValidate => "data:validate",
            Permission::AuditView => "audit:view",
            Permission::AuditExport => "audit:export",
            Permission::UserManage => "user:manage",
            Permission::RoleManage => "role:manage",
        }
    }

    /// Parse a codename such as `"sample:create"`.
    pub fn from_codename(codename: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == codename)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessDecision {
    Allow,
    Deny {
        /// Human-readable explanation, logged and surfaced in the error.
        reason: String,
    },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}
