//! Protocol service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use labtrail_contracts::{
    audit::Snapshot,
    error::{LabtrailError, LabtrailResult},
    lab::{Protocol, User},
    policy::Permission,
};
use labtrail_core::{traits::Clock, Mutation};

use super::{optional_timestamp, snapshot, ServiceContext};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProtocol {
    pub title: String,
    pub description: String,
    pub steps: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub steps: Option<String>,
}

pub struct ProtocolService {
    ctx: ServiceContext,
}

impl ProtocolService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn list(&self, user: &User) -> LabtrailResult<Vec<Protocol>> {
        self.ctx.authorize(user, Permission::ProtocolView)?;
        let tables = self.ctx.store.read()?;
        Ok(tables.protocols.values().filter(|p| !p.is_deleted()).cloned().collect())
    }

    pub fn get(&self, user: &User, id: i64) -> LabtrailResult<Protocol> {
        self.ctx.authorize(user, Permission::ProtocolView)?;
        let tables = self.ctx.store.read()?;
        tables
            .live_protocol(id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(Protocol::ENTITY_TYPE, id))
    }

    pub fn create(&self, user: &User, input: NewProtocol) -> LabtrailResult<Protocol> {
        self.ctx.authorize(user, Permission::ProtocolCreate)?;
        if input.title.trim().is_empty() {
            return Err(LabtrailError::field("title", "Protocol title is required."));
        }

        let mut tables = self.ctx.store.write()?;
        let protocol = Protocol {
            id: tables.next_id("protocols"),
            title: input.title.trim().to_string(),
            description: input.description,
            steps: input.steps,
            deleted_at: None,
        };

        let mutation = Mutation::create(Protocol::ENTITY_TYPE, protocol.id, protocol_snapshot(&protocol))
            .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.protocols.insert(protocol.id, protocol.clone());
        })?;

        info!(protocol_id = protocol.id, title = %protocol.title, "protocol created");
        Ok(protocol)
    }

    /// Apply a partial update, auditing only the fields that changed.
    pub fn update(&self, user: &User, id: i64, update: ProtocolUpdate) -> LabtrailResult<Protocol> {
        self.ctx.authorize(user, Permission::ProtocolUpdate)?;

        let mut tables = self.ctx.store.write()?;
        let current = tables
            .live_protocol(id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(Protocol::ENTITY_TYPE, id))?;

        let mut errors = BTreeMap::new();
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                errors.insert("title".to_string(), "Protocol title cannot be blank.".to_string());
            }
        }
        if !errors.is_empty() {
            return Err(LabtrailError::Validation { errors });
        }

        let mut next = current.clone();
        if let Some(title) = update.title {
            next.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            next.description = description;
        }
        if let Some(steps) = update.steps {
            next.steps = steps;
        }

        let mutation = Mutation::update(
            Protocol::ENTITY_TYPE,
            id,
            protocol_snapshot(&current),
            protocol_snapshot(&next),
        )
        .attributed_to(user);
        if mutation.is_noop() {
            return Ok(current);
        }

        self.ctx.recorder.record_with(mutation, |_| {
            tables.protocols.insert(id, next.clone());
        })?;
        Ok(next)
    }

    /// Soft delete.
    pub fn delete(&self, user: &User, id: i64) -> LabtrailResult<()> {
        self.ctx.authorize(user, Permission::ProtocolDelete)?;

        let mut tables = self.ctx.store.write()?;
        let current = tables
            .live_protocol(id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(Protocol::ENTITY_TYPE, id))?;

        let mut deleted = current.clone();
        deleted.deleted_at = Some(self.ctx.clock.now());

        let mutation = Mutation::delete(
            Protocol::ENTITY_TYPE,
            id,
            protocol_snapshot(&current),
            protocol_snapshot(&deleted),
        )
        .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.protocols.insert(id, deleted);
        })?;

        info!(protocol_id = id, "protocol soft-deleted");
        Ok(())
    }
}

fn protocol_snapshot(protocol: &Protocol) -> Snapshot {
    snapshot(json!({
        "id": protocol.id,
        "title": protocol.title,
        "description": protocol.description,
        "steps": protocol.steps,
        "deleted_at": optional_timestamp(protocol.deleted_at),
    }))
}
