//! Protocol execution service.
//!
//! Links intent (a protocol) to action (results): an execution collects
//! steps, each step ties one sample to an optional parsed result, and a
//! technician validates every step before the run is considered
//! authoritative. All lookups are scoped to the acting user's tenant.

use serde_json::{json, Value};
use tracing::info;

use labtrail_contracts::{
    audit::{Changes, FieldChange},
    error::{LabtrailError, LabtrailResult},
    lab::{
        Execution, ExecutionStatus, ExecutionStep, ParsedData, ParsedDataState, RawFile, Sample, User,
    },
    policy::Permission,
};
use labtrail_core::{traits::Clock, Mutation};

use super::{snapshot, timestamp, ServiceContext};
use crate::store::LabTables;

pub struct ExecutionService {
    ctx: ServiceContext,
}

impl ExecutionService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, user: &User, execution_id: i64) -> LabtrailResult<Execution> {
        self.ctx.authorize(user, Permission::ExecutionView)?;
        let tables = self.ctx.store.read()?;
        tables
            .tenant_execution(user.tenant_id, execution_id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(Execution::ENTITY_TYPE, execution_id))
    }

    /// Steps of an execution ordered by step number.
    pub fn steps(&self, user: &User, execution_id: i64) -> LabtrailResult<Vec<ExecutionStep>> {
        self.ctx.authorize(user, Permission::ExecutionView)?;
        self.tenant_steps(user, execution_id)
    }

    fn tenant_steps(&self, user: &User, execution_id: i64) -> LabtrailResult<Vec<ExecutionStep>> {
        let tables = self.ctx.store.read()?;
        if tables.tenant_execution(user.tenant_id, execution_id).is_none() {
            return Err(LabtrailError::not_found(Execution::ENTITY_TYPE, execution_id));
        }
        Ok(tables.steps_of(execution_id))
    }

    /// Start a run of `protocol_id` in the user's tenant.
    pub fn start(
        &self,
        user: &User,
        protocol_id: i64,
        equipment_id: Option<i64>,
        source_file_id: Option<i64>,
    ) -> LabtrailResult<Execution> {
        self.ctx.authorize(user, Permission::ExecutionRun)?;

        let mut tables = self.ctx.store.write()?;
        if tables.live_protocol(protocol_id).is_none() {
            return Err(LabtrailError::not_found("Protocol", protocol_id));
        }
        if let Some(id) = equipment_id {
            if !tables.equipment.get(&id).is_some_and(|e| e.tenant_id == user.tenant_id) {
                return Err(LabtrailError::not_found("Equipment", id));
            }
        }
        if let Some(id) = source_file_id {
            if !tables.raw_files.get(&id).is_some_and(|f| f.tenant_id == user.tenant_id) {
                return Err(LabtrailError::not_found(RawFile::ENTITY_TYPE, id));
            }
        }

        let execution = Execution {
            id: tables.next_id("executions"),
            tenant_id: user.tenant_id,
            protocol_id,
            equipment_id,
            started_by: user.id,
            started_at: self.ctx.clock.now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            source_file_id,
            notes: String::new(),
        };

        let mut changes = Changes::new();
        changes.insert("status".to_string(), FieldChange::new(Value::Null, ExecutionStatus::Running.as_str()));
        changes.insert("protocol_id".to_string(), FieldChange::new(Value::Null, protocol_id));
        let after = snapshot(json!({
            "id": execution.id,
            "protocol_id": protocol_id,
            "equipment_id": equipment_id,
            "started_at": timestamp(execution.started_at),
        }));

        let mutation = Mutation::create(Execution::ENTITY_TYPE, execution.id, after)
            .with_changes(changes)
            .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.executions.insert(execution.id, execution.clone());
        })?;

        info!(execution_id = execution.id, protocol_id, "execution started");
        Ok(execution)
    }

    /// Record one step: which sample was processed and, optionally, which
    /// parsed result it produced. Steps can only be added while running.
    pub fn add_step(
        &self,
        user: &User,
        execution_id: i64,
        step_number: i32,
        sample_id: i64,
        parsed_data_id: Option<i64>,
        validation_notes: &str,
    ) -> LabtrailResult<ExecutionStep> {
        self.ctx.authorize(user, Permission::ExecutionRun)?;

        let mut tables = self.ctx.store.write()?;
        running_execution(&tables, user.tenant_id, execution_id, ExecutionStatus::Running)?;
        if tables.live_sample(sample_id).is_none() {
            return Err(LabtrailError::not_found(Sample::ENTITY_TYPE, sample_id));
        }
        if let Some(id) = parsed_data_id {
            tenant_parsed_data(&tables, user.tenant_id, id)?;
        }

        let step = ExecutionStep {
            id: tables.next_id("steps"),
            execution_id,
            step_number,
            sample_id,
            parsed_data_id,
            is_valid: false,
            validation_notes: validation_notes.to_string(),
        };

        let mut changes = Changes::new();
        changes.insert("sample_id".to_string(), FieldChange::new(Value::Null, sample_id));
        changes.insert("protocol_step".to_string(), FieldChange::new(Value::Null, step_number));
        changes.insert("parsed_data_id".to_string(), FieldChange::new(Value::Null, parsed_data_id));
        let after = snapshot(json!({
            "id": step.id,
            "execution_id": execution_id,
            "sample_id": sample_id,
            "protocol_step": step_number,
            "parsed_data_id": parsed_data_id,
        }));

        let mutation = Mutation::create(ExecutionStep::ENTITY_TYPE, step.id, after)
            .with_changes(changes)
            .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.steps.insert(step.id, step.clone());
        })?;

        info!(execution_id, step_id = step.id, step_number, sample_id, "execution step recorded");
        Ok(step)
    }

    /// Mark a running execution completed.
    pub fn complete(&self, user: &User, execution_id: i64, notes: &str) -> LabtrailResult<Execution> {
        self.ctx.authorize(user, Permission::ExecutionRun)?;

        let mut tables = self.ctx.store.write()?;
        let mut execution = running_execution(&tables, user.tenant_id, execution_id, ExecutionStatus::Completed)?.clone();
        let completed_at = self.ctx.clock.now();
        execution.status = ExecutionStatus::Completed;
        execution.completed_at = Some(completed_at);
        execution.notes = notes.to_string();

        let mut changes = Changes::new();
        changes.insert(
            "status".to_string(),
            FieldChange::new(ExecutionStatus::Running.as_str(), ExecutionStatus::Completed.as_str()),
        );
        let mutation = Mutation::update(
            Execution::ENTITY_TYPE,
            execution_id,
            snapshot(json!({ "status": ExecutionStatus::Running.as_str() })),
            snapshot(json!({
                "status": ExecutionStatus::Completed.as_str(),
                "completed_at": timestamp(completed_at),
            })),
        )
        .with_changes(changes)
        .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.executions.insert(execution_id, execution.clone());
        })?;

        info!(execution_id, "execution completed");
        Ok(execution)
    }

    /// Technician decision on one step. Only valid steps are authoritative.
    pub fn validate_step(
        &self,
        user: &User,
        step_id: i64,
        is_valid: bool,
        validation_notes: &str,
    ) -> LabtrailResult<ExecutionStep> {
        self.ctx.authorize(user, Permission::ExecutionValidate)?;

        let mut tables = self.ctx.store.write()?;
        let current = tenant_step(&tables, user.tenant_id, step_id)?.clone();
        let mut step = current.clone();
        step.is_valid = is_valid;
        step.validation_notes = validation_notes.to_string();

        let mut changes = Changes::new();
        changes.insert("is_valid".to_string(), FieldChange::new(current.is_valid, is_valid));
        let mutation = Mutation::update(
            ExecutionStep::ENTITY_TYPE,
            step_id,
            snapshot(json!({ "is_valid": current.is_valid })),
            snapshot(json!({
                "is_valid": is_valid,
                "validated_by": user.username,
                "validation_notes": validation_notes,
            })),
        )
        .with_changes(changes)
        .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.steps.insert(step_id, step.clone());
        })?;

        info!(step_id, is_valid, validated_by = %user.username, "execution step validated");
        Ok(step)
    }

    /// Attach a parsed result to a step after the fact.
    pub fn link_parsed_data(&self, user: &User, step_id: i64, parsed_data_id: i64) -> LabtrailResult<ExecutionStep> {
        self.ctx.authorize(user, Permission::ExecutionRun)?;

        let mut tables = self.ctx.store.write()?;
        let current = tenant_step(&tables, user.tenant_id, step_id)?.clone();
        tenant_parsed_data(&tables, user.tenant_id, parsed_data_id)?;

        let mut step = current.clone();
        step.parsed_data_id = Some(parsed_data_id);

        let mutation = Mutation::update(
            ExecutionStep::ENTITY_TYPE,
            step_id,
            snapshot(json!({ "parsed_data_id": current.parsed_data_id })),
            snapshot(json!({ "parsed_data_id": parsed_data_id })),
        )
        .attributed_to(user);
        if mutation.is_noop() {
            return Ok(current);
        }
        self.ctx.recorder.record_with(mutation, |_| {
            tables.steps.insert(step_id, step.clone());
        })?;

        info!(step_id, parsed_data_id, "parsed data linked to step");
        Ok(step)
    }

    /// Steps of an execution still awaiting a positive validation.
    pub fn unvalidated_steps(&self, user: &User, execution_id: i64) -> LabtrailResult<Vec<ExecutionStep>> {
        self.ctx.authorize(user, Permission::ExecutionValidate)?;
        Ok(self
            .tenant_steps(user, execution_id)?
            .into_iter()
            .filter(|s| !s.is_valid)
            .collect())
    }

    /// Validated parsed data of the user's tenant that no step references:
    /// results without sample context.
    pub fn orphaned_parsed_data(&self, user: &User) -> LabtrailResult<Vec<ParsedData>> {
        self.ctx.authorize(user, Permission::DataValidate)?;
        let tables = self.ctx.store.read()?;
        Ok(tables
            .parsed_data
            .values()
            .filter(|p| p.tenant_id == user.tenant_id && p.state == ParsedDataState::Validated)
            .filter(|p| !tables.steps.values().any(|s| s.parsed_data_id == Some(p.id)))
            .cloned()
            .collect())
    }
}

/// The tenant's execution, which must still be running to move on to `to`.
fn running_execution<'a>(
    tables: &'a LabTables,
    tenant_id: i64,
    execution_id: i64,
    to: ExecutionStatus,
) -> LabtrailResult<&'a Execution> {
    let execution = tables
        .tenant_execution(tenant_id, execution_id)
        .ok_or_else(|| LabtrailError::not_found(Execution::ENTITY_TYPE, execution_id))?;
    if execution.status != ExecutionStatus::Running {
        return Err(LabtrailError::InvalidTransition {
            entity: Execution::ENTITY_TYPE.to_string(),
            from: execution.status.to_string(),
            to: to.to_string(),
        });
    }
    Ok(execution)
}

fn tenant_step<'a>(tables: &'a LabTables, tenant_id: i64, step_id: i64) -> LabtrailResult<&'a ExecutionStep> {
    tables
        .steps
        .get(&step_id)
        .filter(|s| tables.tenant_execution(tenant_id, s.execution_id).is_some())
        .ok_or_else(|| LabtrailError::not_found(ExecutionStep::ENTITY_TYPE, step_id))
}

fn tenant_parsed_data<'a>(tables: &'a LabTables, tenant_id: i64, id: i64) -> LabtrailResult<&'a ParsedData> {
    tables
        .parsed_data
        .get(&id)
        .filter(|p| p.tenant_id == tenant_id)
        .ok_or_else(|| LabtrailError::not_found(ParsedData::ENTITY_TYPE, id))
}
