//! In-memory laboratory record store.
//!
//! `LabStore` holds every lab table behind one `RwLock`. Services take the
//! write lock for the whole unit of work (validate, append audit, commit), so
//! a reader never observes an entity whose audit record is missing.
//!
//! Soft-deleted samples and protocols stay in their tables. The default read
//! paths filter them out; `ExecutionSource` does not, because a certified
//! report must still name a sample that was deleted after it was used.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    lab::{
        Equipment, Execution, ExecutionBundle, ExecutionStep, ParsedData, Protocol, RawFile,
        Sample, Tenant, User,
    },
};
use labtrail_core::traits::ExecutionSource;

// ── Tables ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct LabTables {
    pub(crate) tenants: BTreeMap<i64, Tenant>,
    pub(crate) users: BTreeMap<i64, User>,
    pub(crate) samples: BTreeMap<i64, Sample>,
    pub(crate) protocols: BTreeMap<i64, Protocol>,
    pub(crate) equipment: BTreeMap<i64, Equipment>,
    pub(crate) raw_files: BTreeMap<i64, RawFile>,
    pub(crate) parsed_data: BTreeMap<i64, ParsedData>,
    pub(crate) executions: BTreeMap<i64, Execution>,
    pub(crate) steps: BTreeMap<i64, ExecutionStep>,
    sequences: BTreeMap<&'static str, i64>,
}

impl LabTables {
    /// Allocate the next id of `table`. Ids are never reused, so a unit of
    /// work that fails after allocating leaves a gap.
    pub(crate) fn next_id(&mut self, table: &'static str) -> i64 {
        let next = self.sequences.entry(table).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }

    pub(crate) fn live_sample(&self, id: i64) -> Option<&Sample> {
        self.samples.get(&id).filter(|s| !s.is_deleted())
    }

    pub(crate) fn live_protocol(&self, id: i64) -> Option<&Protocol> {
        self.protocols.get(&id).filter(|p| !p.is_deleted())
    }

    /// The execution if it belongs to `tenant_id`.
    pub(crate) fn tenant_execution(&self, tenant_id: i64, id: i64) -> Option<&Execution> {
        self.executions.get(&id).filter(|e| e.tenant_id == tenant_id)
    }

    /// Steps of one execution ordered by step number, then id.
    pub(crate) fn steps_of(&self, execution_id: i64) -> Vec<ExecutionStep> {
        let mut steps: Vec<ExecutionStep> = self
            .steps
            .values()
            .filter(|s| s.execution_id == execution_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.step_number, s.id));
        steps
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LabStore {
    tables: RwLock<LabTables>,
}

impl LabStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> LabtrailResult<RwLockReadGuard<'_, LabTables>> {
        self.tables.read().map_err(|e| LabtrailError::Storage {
            reason: format!("lab store lock poisoned: {}", e),
        })
    }

    pub(crate) fn write(&self) -> LabtrailResult<RwLockWriteGuard<'_, LabTables>> {
        self.tables.write().map_err(|e| LabtrailError::Storage {
            reason: format!("lab store lock poisoned: {}", e),
        })
    }

    // ── Registration ──────────────────────────────────────────────────────────
    //
    // Tenants, users and instruments are provisioned by an administrator
    // outside the audited write path.

    pub fn register_tenant(&self, name: &str, slug: &str) -> LabtrailResult<Tenant> {
        let mut tables = self.write()?;
        if tables.tenants.values().any(|t| t.slug == slug) {
            return Err(LabtrailError::field("slug", format!("Tenant slug '{}' is already taken.", slug)));
        }
        let tenant = Tenant {
            id: tables.next_id("tenants"),
            name: name.to_string(),
            slug: slug.to_string(),
            is_active: true,
        };
        tables.tenants.insert(tenant.id, tenant.clone());
        debug!(tenant_id = tenant.id, slug, "tenant registered");
        Ok(tenant)
    }

    pub fn register_user(
        &self,
        tenant_id: i64,
        username: &str,
        email: &str,
        full_name: Option<&str>,
        role: Option<&str>,
    ) -> LabtrailResult<User> {
        let mut tables = self.write()?;
        if !tables.tenants.contains_key(&tenant_id) {
            return Err(LabtrailError::not_found("Tenant", tenant_id));
        }
        if tables.users.values().any(|u| u.username == username) {
            return Err(LabtrailError::field(
                "username",
                format!("Username '{}' is already taken.", username),
            ));
        }
        let user = User {
            id: tables.next_id("users"),
            tenant_id,
            username: username.to_string(),
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
            role: role.map(str::to_string),
            is_active: true,
        };
        tables.users.insert(user.id, user.clone());
        debug!(user_id = user.id, tenant_id, username, "user registered");
        Ok(user)
    }

    /// Register an instrument. `equipment_code` is unique within a tenant.
    pub fn register_equipment(
        &self,
        tenant_id: i64,
        equipment_code: &str,
        equipment_name: &str,
        equipment_type: &str,
        location: &str,
        serial_number: Option<&str>,
    ) -> LabtrailResult<Equipment> {
        let mut tables = self.write()?;
        if !tables.tenants.contains_key(&tenant_id) {
            return Err(LabtrailError::not_found("Tenant", tenant_id));
        }
        if tables
            .equipment
            .values()
            .any(|e| e.tenant_id == tenant_id && e.equipment_code == equipment_code)
        {
            return Err(LabtrailError::field(
                "equipment_code",
                format!("Equipment '{}' already exists in this tenant.", equipment_code),
            ));
        }
        let equipment = Equipment {
            id: tables.next_id("equipment"),
            tenant_id,
            equipment_code: equipment_code.to_string(),
            equipment_name: equipment_name.to_string(),
            equipment_type: equipment_type.to_string(),
            location: location.to_string(),
            serial_number: serial_number.map(str::to_string),
            status: "active".to_string(),
        };
        tables.equipment.insert(equipment.id, equipment.clone());
        Ok(equipment)
    }

    /// Mark a user inactive. Inactive users are denied every permission.
    pub fn deactivate_user(&self, user_id: i64) -> LabtrailResult<User> {
        let mut tables = self.write()?;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| LabtrailError::not_found("User", user_id))?;
        user.is_active = false;
        Ok(user.clone())
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn tenant(&self, id: i64) -> LabtrailResult<Option<Tenant>> {
        Ok(self.read()?.tenants.get(&id).cloned())
    }

    pub fn user(&self, id: i64) -> LabtrailResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    pub fn equipment(&self, id: i64) -> LabtrailResult<Option<Equipment>> {
        Ok(self.read()?.equipment.get(&id).cloned())
    }

    /// A sample, including soft-deleted ones.
    pub fn sample_including_deleted(&self, id: i64) -> LabtrailResult<Option<Sample>> {
        Ok(self.read()?.samples.get(&id).cloned())
    }

    /// A protocol, including soft-deleted ones.
    pub fn protocol_including_deleted(&self, id: i64) -> LabtrailResult<Option<Protocol>> {
        Ok(self.read()?.protocols.get(&id).cloned())
    }

    pub fn raw_file(&self, id: i64) -> LabtrailResult<Option<RawFile>> {
        Ok(self.read()?.raw_files.get(&id).cloned())
    }
}

impl ExecutionSource for LabStore {
    fn execution_bundle(
        &self,
        tenant_id: i64,
        execution_id: i64,
    ) -> LabtrailResult<Option<ExecutionBundle>> {
        let tables = self.read()?;
        let Some(execution) = tables.tenant_execution(tenant_id, execution_id) else {
            return Ok(None);
        };

        let steps = tables.steps_of(execution_id);

        let sample_ids: BTreeSet<i64> = steps.iter().map(|s| s.sample_id).collect();
        let samples = sample_ids
            .iter()
            .filter_map(|id| tables.samples.get(id).cloned())
            .collect();

        let parsed_ids: BTreeSet<i64> = steps.iter().filter_map(|s| s.parsed_data_id).collect();
        let parsed_data = parsed_ids
            .iter()
            .filter_map(|id| tables.parsed_data.get(id).cloned())
            .collect();

        Ok(Some(ExecutionBundle {
            protocol: tables.protocols.get(&execution.protocol_id).cloned(),
            equipment: execution.equipment_id.and_then(|id| tables.equipment.get(&id).cloned()),
            execution: execution.clone(),
            steps,
            samples,
            parsed_data,
        }))
    }

    fn tenant_user_ids(&self, tenant_id: i64) -> LabtrailResult<BTreeSet<i64>> {
        Ok(self
            .read()?
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .map(|u| u.id)
            .collect())
    }
}
