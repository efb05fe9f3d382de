//! # labtrail-policy
//!
//! A TOML-driven, deny-by-default role access policy for labtrail.
//!
//! ## Overview
//!
//! This crate provides [`TomlAccessPolicy`], which implements the
//! [`AccessPolicy`](labtrail_core::traits::AccessPolicy) trait. Roles are
//! declared in a TOML file, each with a list of permission patterns. A
//! permission not covered by the user's role is denied.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use labtrail_policy::TomlAccessPolicy;
//!
//! let policy = TomlAccessPolicy::from_file(Path::new("policies/lab_roles.toml"))?;
//! labtrail_core::ensure_permitted(&policy, &user, Permission::SampleCreate)?;
//! ```

pub mod engine;
pub mod rule;

pub use engine::TomlAccessPolicy;
pub use rule::{pattern_matches, AccessConfig, RoleGrant};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use labtrail_contracts::{
        error::LabtrailError,
        lab::User,
        policy::{AccessDecision, Permission},
    };
    use labtrail_core::{ensure_permitted, traits::AccessPolicy};

    use crate::{pattern_matches, TomlAccessPolicy};

    // ── Helpers ───────────────────────────────────────────────────────────────

    const LAB_POLICY: &str = r#"
        [[roles]]
        name = "admin"
        description = "Full access"
        permissions = ["*"]

        [[roles]]
        name = "lab_technician"
        description = "Bench work"
        permissions = ["sample:*", "protocol:view", "execution:run", "data:upload"]

        [[roles]]
        name = "auditor"
        permissions = ["audit:view", "audit:export"]
    "#;

    fn user(role: Option<&str>) -> User {
        User {
            id: 1,
            tenant_id: 1,
            username: "jdoe".to_string(),
            email: "jdoe@lab.example".to_string(),
            full_name: None,
            role: role.map(str::to_string),
            is_active: true,
        }
    }

    fn policy() -> TomlAccessPolicy {
        TomlAccessPolicy::from_toml_str(LAB_POLICY).unwrap()
    }

    fn assert_denied(decision: AccessDecision, needle: &str) {
        match decision {
            AccessDecision::Deny { reason } => {
                assert!(reason.contains(needle), "expected '{needle}' in reason, got: {reason}")
            }
            other => panic!("expected Deny, got {:?}", other),
        }
    }

    // ── Pattern matching ──────────────────────────────────────────────────────

    #[test]
    fn test_pattern_forms() {
        assert!(pattern_matches("*", Permission::RoleManage));
        assert!(pattern_matches("sample:*", Permission::SampleDelete));
        assert!(pattern_matches("audit:view", Permission::AuditView));
        assert!(!pattern_matches("sample:*", Permission::ProtocolView));
        assert!(!pattern_matches("audit:view", Permission::AuditExport));
        assert!(!pattern_matches("samp*", Permission::SampleView));
    }

    // ── Decisions ─────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_policy_denies_everything() {
        let policy = TomlAccessPolicy::from_toml_str("roles = []").unwrap();
        for permission in Permission::ALL {
            assert!(
                !policy.check(&user(Some("admin")), permission).unwrap().is_allowed(),
                "{permission} must be denied under an empty policy"
            );
        }
    }

    #[test]
    fn test_wildcard_role_allows_everything() {
        let policy = policy();
        for permission in Permission::ALL {
            assert!(policy.check(&user(Some("admin")), permission).unwrap().is_allowed());
        }
    }

    #[test]
    fn test_resource_wildcard_and_exact_grants() {
        let policy = policy();
        let tech = user(Some("lab_technician"));

        assert!(policy.check(&tech, Permission::SampleCreate).unwrap().is_allowed());
        assert!(policy.check(&tech, Permission::SampleDelete).unwrap().is_allowed());
        assert!(policy.check(&tech, Permission::ExecutionRun).unwrap().is_allowed());
        assert_denied(
            policy.check(&tech, Permission::ExecutionValidate).unwrap(),
            "denied by default",
        );
        assert_denied(policy.check(&tech, Permission::ProtocolCreate).unwrap(), "protocol:create");
    }

    #[test]
    fn test_user_without_role_denied() {
        assert_denied(policy().check(&user(None), Permission::SampleView).unwrap(), "no role");
    }

    #[test]
    fn test_undefined_role_denied() {
        assert_denied(
            policy().check(&user(Some("intern")), Permission::SampleView).unwrap(),
            "'intern' is not defined",
        );
    }

    #[test]
    fn test_inactive_user_denied_even_for_admin() {
        let mut admin = user(Some("admin"));
        admin.is_active = false;
        assert_denied(policy().check(&admin, Permission::SampleView).unwrap(), "inactive");
    }

    #[test]
    fn test_ensure_permitted_maps_deny_to_error() {
        let policy = policy();
        let auditor = user(Some("auditor"));

        assert!(ensure_permitted(&policy, &auditor, Permission::AuditExport).is_ok());
        match ensure_permitted(&policy, &auditor, Permission::SampleCreate) {
            Err(LabtrailError::PermissionDenied { user, permission }) => {
                assert_eq!(user, "jdoe");
                assert_eq!(permission, "sample:create");
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    // ── Configuration errors ──────────────────────────────────────────────────

    #[test]
    fn test_toml_parse_error() {
        match TomlAccessPolicy::from_toml_str("roles = [[[") {
            Err(LabtrailError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse access policy TOML"), "got: {reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_permission_rejected() {
        let toml = r#"
            [[roles]]
            name = "tech"
            permissions = ["sample:cook"]
        "#;
        match TomlAccessPolicy::from_toml_str(toml) {
            Err(LabtrailError::ConfigError { reason }) => assert!(reason.contains("sample:cook")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let toml = r#"
            [[roles]]
            name = "tech"
            permissions = []

            [[roles]]
            name = "tech"
            permissions = ["*"]
        "#;
        assert!(matches!(
            TomlAccessPolicy::from_toml_str(toml),
            Err(LabtrailError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LAB_POLICY.as_bytes()).unwrap();

        let policy = TomlAccessPolicy::from_file(file.path()).unwrap();
        assert_eq!(policy.config().roles.len(), 3);

        let missing = TomlAccessPolicy::from_file(std::path::Path::new("/nonexistent/roles.toml"));
        assert!(matches!(missing, Err(LabtrailError::ConfigError { .. })));
    }
}
