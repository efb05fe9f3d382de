//! Sample service.
//!
//! Samples are global to the lab store. Every create, update and soft delete
//! is audited under `"Sample"`; reads never return soft-deleted rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use labtrail_contracts::{
    audit::Snapshot,
    error::{LabtrailError, LabtrailResult},
    lab::{Sample, User},
    policy::Permission,
};
use labtrail_core::{traits::Clock, Mutation};

use super::{optional_timestamp, snapshot, timestamp, ServiceContext};

/// Accepted `sample_type` values, lowercase and sorted.
pub const ALLOWED_SAMPLE_TYPES: [&str; 7] = ["blood", "dna", "plasma", "rna", "serum", "tissue", "urine"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    pub name: String,
    pub sample_type: String,
    pub received_at: DateTime<Utc>,
    pub location: String,
}

/// A partial update. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleUpdate {
    pub name: Option<String>,
    pub sample_type: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

pub struct SampleService {
    ctx: ServiceContext,
}

impl SampleService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn list(&self, user: &User) -> LabtrailResult<Vec<Sample>> {
        self.ctx.authorize(user, Permission::SampleView)?;
        let tables = self.ctx.store.read()?;
        Ok(tables.samples.values().filter(|s| !s.is_deleted()).cloned().collect())
    }

    pub fn get(&self, user: &User, id: i64) -> LabtrailResult<Sample> {
        self.ctx.authorize(user, Permission::SampleView)?;
        let tables = self.ctx.store.read()?;
        tables
            .live_sample(id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(Sample::ENTITY_TYPE, id))
    }

    /// Validate and store a new sample. `sample_type` is stored lowercase.
    pub fn create(&self, user: &User, input: NewSample) -> LabtrailResult<Sample> {
        self.ctx.authorize(user, Permission::SampleCreate)?;

        let mut errors = BTreeMap::new();
        if input.name.trim().is_empty() {
            errors.insert("name".to_string(), "Sample name is required.".to_string());
        }
        self.check_type(&input.sample_type, &mut errors);
        self.check_received_at(input.received_at, &mut errors);
        if !errors.is_empty() {
            return Err(LabtrailError::Validation { errors });
        }

        let mut tables = self.ctx.store.write()?;
        let sample = Sample {
            id: tables.next_id("samples"),
            name: input.name.trim().to_string(),
            sample_type: input.sample_type.to_lowercase(),
            received_at: input.received_at,
            location: input.location,
            deleted_at: None,
        };

        let mutation = Mutation::create(Sample::ENTITY_TYPE, sample.id, sample_snapshot(&sample)).attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.samples.insert(sample.id, sample.clone());
        })?;

        info!(sample_id = sample.id, sample_type = %sample.sample_type, "sample created");
        Ok(sample)
    }

    /// Apply a partial update. Only provided fields are validated, and only
    /// fields whose value changes are audited. An update that changes
    /// nothing writes no audit record.
    pub fn update(&self, user: &User, id: i64, update: SampleUpdate) -> LabtrailResult<Sample> {
        self.ctx.authorize(user, Permission::SampleUpdate)?;

        let mut errors = BTreeMap::new();
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                errors.insert("name".to_string(), "Sample name cannot be blank.".to_string());
            }
        }
        if let Some(sample_type) = &update.sample_type {
            self.check_type(sample_type, &mut errors);
        }
        if let Some(received_at) = update.received_at {
            self.check_received_at(received_at, &mut errors);
        }

        let mut tables = self.ctx.store.write()?;
        let current = tables
            .live_sample(id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(Sample::ENTITY_TYPE, id))?;
        if !errors.is_empty() {
            return Err(LabtrailError::Validation { errors });
        }

        let mut next = current.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(sample_type) = update.sample_type {
            next.sample_type = sample_type.to_lowercase();
        }
        if let Some(received_at) = update.received_at {
            next.received_at = received_at;
        }
        if let Some(location) = update.location {
            next.location = location;
        }

        let mutation = Mutation::update(
            Sample::ENTITY_TYPE,
            id,
            sample_snapshot(&current),
            sample_snapshot(&next),
        )
        .attributed_to(user);
        if mutation.is_noop() {
            return Ok(current);
        }

        self.ctx.recorder.record_with(mutation, |_| {
            tables.samples.insert(id, next.clone());
        })?;
        Ok(next)
    }

    /// Soft delete: the row is kept with `deleted_at` set.
    pub fn delete(&self, user: &User, id: i64) -> LabtrailResult<()> {
        self.ctx.authorize(user, Permission::SampleDelete)?;

        let mut tables = self.ctx.store.write()?;
        let current = tables
            .live_sample(id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(Sample::ENTITY_TYPE, id))?;

        let mut deleted = current.clone();
        deleted.deleted_at = Some(self.ctx.clock.now());

        let mutation = Mutation::delete(
            Sample::ENTITY_TYPE,
            id,
            sample_snapshot(&current),
            sample_snapshot(&deleted),
        )
        .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.samples.insert(id, deleted);
        })?;

        info!(sample_id = id, "sample soft-deleted");
        Ok(())
    }

    fn check_type(&self, sample_type: &str, errors: &mut BTreeMap<String, String>) {
        if !ALLOWED_SAMPLE_TYPES.contains(&sample_type.to_lowercase().as_str()) {
            errors.insert(
                "sample_type".to_string(),
                format!(
                    "Invalid sample type '{}'. Allowed: {}.",
                    sample_type,
                    ALLOWED_SAMPLE_TYPES.join(", ")
                ),
            );
        }
    }

    fn check_received_at(&self, received_at: DateTime<Utc>, errors: &mut BTreeMap<String, String>) {
        if received_at > self.ctx.clock.now() {
            errors.insert("received_at".to_string(), "received_at cannot be in the future.".to_string());
        }
    }
}

fn sample_snapshot(sample: &Sample) -> Snapshot {
    snapshot(json!({
        "id": sample.id,
        "name": sample.name,
        "sample_type": sample.sample_type,
        "received_at": timestamp(sample.received_at),
        "location": sample.location,
        "deleted_at": optional_timestamp(sample.deleted_at),
    }))
}
