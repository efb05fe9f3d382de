//! Role grant types and configuration schema.
//!
//! An `AccessConfig` is deserialized from TOML and holds a list of
//! `RoleGrant`s. Each grant lists permission patterns; a pattern is either an
//! exact codename (`"sample:create"`), a resource wildcard (`"sample:*"`), or
//! the full wildcard `"*"`.

use serde::{Deserialize, Serialize};

use labtrail_contracts::policy::Permission;

/// The permissions held by one named role.
///
/// Example in TOML:
/// ```toml
/// [[roles]]
/// name = "lab_technician"
/// description = "Runs executions and records samples"
/// permissions = ["sample:*", "execution:run", "data:upload"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Matched against `User::role`, case-sensitive.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Permission patterns granted to the role.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl RoleGrant {
    /// Return true if any pattern of this role covers `permission`.
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions
            .iter()
            .any(|pattern| pattern_matches(pattern, permission))
    }
}

/// Return true if `pattern` covers `permission`.
///
/// - `"*"` matches everything.
/// - `"<resource>:*"` matches every action on that resource.
/// - Anything else must equal the codename exactly.
pub fn pattern_matches(pattern: &str, permission: Permission) -> bool {
    let codename = permission.as_str();
    if pattern == "*" || pattern == codename {
        return true;
    }
    match pattern.strip_suffix(":*") {
        Some(resource) => codename
            .split_once(':')
            .is_some_and(|(prefix, _)| prefix == resource),
        None => false,
    }
}

/// True if `pattern` covers at least one known permission.
pub fn pattern_is_known(pattern: &str) -> bool {
    Permission::ALL.into_iter().any(|p| pattern_matches(pattern, p))
}

/// The top-level structure deserialized from a TOML access policy file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
}

impl AccessConfig {
    pub fn role(&self, name: &str) -> Option<&RoleGrant> {
        self.roles.iter().find(|r| r.name == name)
    }
}
