//! Fictional laboratory data for the scenarios and tests.
//!
//! Everything here is made up. No external systems are contacted.

use serde_json::{json, Value};

use labtrail_contracts::{
    error::LabtrailResult,
    integrity::VerificationScope,
    lab::{Tenant, User},
};
use labtrail_core::LabtrailConfig;
use labtrail_policy::TomlAccessPolicy;

use crate::store::LabStore;

// ── Access policy ─────────────────────────────────────────────────────────────

/// Role matrix of the reference laboratory.
pub const LAB_ROLES_POLICY: &str = include_str!("../policies/lab_roles.toml");

pub fn lab_policy() -> LabtrailResult<TomlAccessPolicy> {
    TomlAccessPolicy::from_toml_str(LAB_ROLES_POLICY)
}

/// Configuration used by the scenarios: in-memory ledger, per-entity-type
/// tenant verification, PDF output.
pub fn scenario_config() -> LabtrailConfig {
    let mut config = LabtrailConfig::default();
    config.verification.tenant_scope = VerificationScope::PerEntityType;
    config
}

// ── Staff ─────────────────────────────────────────────────────────────────────

/// One user per role of a tenant.
#[derive(Debug, Clone)]
pub struct Staff {
    pub admin: User,
    pub technician: User,
    pub reviewer: User,
    pub auditor: User,
}

/// Register a tenant with one user per role. Usernames are prefixed with
/// `slug` so several tenants can share a store.
pub fn seed_tenant(store: &LabStore, name: &str, slug: &str) -> LabtrailResult<(Tenant, Staff)> {
    let tenant = store.register_tenant(name, slug)?;
    let user = |username: &str, full_name: &str, role: &str| {
        store.register_user(
            tenant.id,
            &format!("{slug}.{username}"),
            &format!("{username}@{slug}.lab.example"),
            Some(full_name),
            Some(role),
        )
    };
    let staff = Staff {
        admin: user("admin", "Morgan Reyes", "admin")?,
        technician: user("tech", "Jordan Okafor", "lab_technician")?,
        reviewer: user("qa", "Quinn Approver", "qa_reviewer")?,
        auditor: user("audit", "Sam Lindqvist", "auditor")?,
    };
    Ok((tenant, staff))
}

// ── Machine output ────────────────────────────────────────────────────────────

/// Export of a fictional spectrophotometer run.
pub const SPECTRO_CSV: &str = "\
instrument,SPEC-01
operator,jordan.okafor
sample_id,sample_name,sample_type,collected_at,absorbance_260,absorbance_280
BIO-0001,Plasma draw A,plasma,2024-02-29T08:30:00Z,1.842,0.951
";

/// A schema-valid extraction of `SPECTRO_CSV`.
pub fn extraction_payload() -> Value {
    json!({
        "equipment_records": [{
            "equipment_id": "SPEC-01",
            "equipment_name": "UV-Vis Spectrophotometer",
            "equipment_type": "spectrophotometer",
            "location": "Room 2.14",
            "serial_number": "UV-4471-B",
            "status": "operational"
        }],
        "sample_records": [{
            "sample_id": "BIO-0001",
            "sample_name": "Plasma draw A",
            "sample_type": "plasma",
            "collected_at": "2024-02-29T08:30:00Z",
            "collected_by": "Jordan Okafor",
            "storage_temperature": -80,
            "quantity": 2.5,
            "quantity_unit": "ml"
        }],
        "extraction_warnings": []
    })
}
