//! TOML-driven access policy implementation.
//!
//! `TomlAccessPolicy` loads an `AccessConfig` from a TOML string or file and
//! implements the `AccessPolicy` trait from labtrail-core.
//!
//! Evaluation algorithm:
//!
//! 1. An inactive user is denied.
//! 2. A user with no role, or with a role the document does not define, is
//!    denied.
//! 3. If any pattern of the user's role covers the permission → `Allow`.
//! 4. Otherwise → `Deny` with "denied by default".

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    lab::User,
    policy::{AccessDecision, Permission},
};
use labtrail_core::traits::AccessPolicy;

use crate::rule::{pattern_is_known, AccessConfig};

/// An `AccessPolicy` implementation that reads role grants from a TOML
/// document.
///
/// ```rust,ignore
/// use labtrail_policy::TomlAccessPolicy;
///
/// let policy = TomlAccessPolicy::from_file(Path::new("policies/lab_roles.toml"))?;
/// ```
#[derive(Debug)]
pub struct TomlAccessPolicy {
    config: AccessConfig,
}

impl TomlAccessPolicy {
    /// Parse `s` as TOML and build a `TomlAccessPolicy`.
    ///
    /// Returns `LabtrailError::ConfigError` if the TOML is malformed, a role
    /// is declared twice, or a permission pattern names no known permission.
    pub fn from_toml_str(s: &str) -> LabtrailResult<Self> {
        let config: AccessConfig = toml::from_str(s).map_err(|e| LabtrailError::ConfigError {
            reason: format!("failed to parse access policy TOML: {}", e),
        })?;
        Self::from_config(config)
    }

    /// Read the file at `path` and parse it as an access policy.
    pub fn from_file(path: &Path) -> LabtrailResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LabtrailError::ConfigError {
            reason: format!("failed to read access policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_config(config: AccessConfig) -> LabtrailResult<Self> {
        let mut seen = HashSet::new();
        for role in &config.roles {
            if role.name.trim().is_empty() {
                return Err(LabtrailError::ConfigError {
                    reason: "access policy role with empty name".to_string(),
                });
            }
            if !seen.insert(role.name.as_str()) {
                return Err(LabtrailError::ConfigError {
                    reason: format!("access policy role '{}' declared more than once", role.name),
                });
            }
            if let Some(bad) = role.permissions.iter().find(|p| !pattern_is_known(p)) {
                return Err(LabtrailError::ConfigError {
                    reason: format!(
                        "role '{}' grants unknown permission pattern '{}'",
                        role.name, bad
                    ),
                });
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }
}

impl AccessPolicy for TomlAccessPolicy {
    fn check(&self, user: &User, permission: Permission) -> LabtrailResult<AccessDecision> {
        debug!(
            user = %user.username,
            role = user.role.as_deref().unwrap_or("-"),
            permission = %permission,
            "checking access"
        );

        if !user.is_active {
            return Ok(AccessDecision::Deny {
                reason: format!("user '{}' is inactive", user.username),
            });
        }

        let Some(role_name) = user.role.as_deref() else {
            return Ok(AccessDecision::Deny {
                reason: format!("user '{}' has no role", user.username),
            });
        };

        let Some(role) = self.config.role(role_name) else {
            warn!(
                user = %user.username,
                role = %role_name,
                "user holds a role the access policy does not define"
            );
            return Ok(AccessDecision::Deny {
                reason: format!("role '{}' is not defined", role_name),
            });
        };

        if role.grants(permission) {
            return Ok(AccessDecision::Allow);
        }

        Ok(AccessDecision::Deny {
            reason: format!(
                "denied by default: role '{}' does not grant '{}'",
                role_name, permission
            ),
        })
    }
}
