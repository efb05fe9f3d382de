//! The mutation recorder: the only write path business code uses to audit a
//! state change.
//!
//! ```text
//!   service validates → builds Mutation → recorder appends → commit runs
//! ```
//!
//! `record_with` gives unit-of-work semantics: the staged entity write runs
//! only after the ledger accepted the audit record. If the append fails, the
//! closure is dropped and the entity is never written, so data and audit
//! cannot diverge.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use labtrail_contracts::{
    audit::{AuditRecord, Changes, FieldChange, NewAuditRecord, Operation, Snapshot},
    error::LabtrailResult,
    lab::User,
};

use crate::traits::AuditLedger;

/// A pending audit entry, built from entity snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    entity_type: String,
    entity_id: i64,
    operation: Operation,
    changes: Changes,
    snapshot_before: Snapshot,
    snapshot_after: Snapshot,
    user_id: Option<i64>,
    user_email: Option<String>,
}

impl Mutation {
    /// A new entity. Every field of `after` except `id` is recorded as a
    /// change from `null`.
    pub fn create(entity_type: impl Into<String>, entity_id: i64, after: Snapshot) -> Self {
        let changes = after
            .iter()
            .filter(|(field, _)| field.as_str() != "id")
            .map(|(field, value)| (field.clone(), FieldChange::new(Value::Null, value.clone())))
            .collect();
        Self::build(entity_type, entity_id, Operation::Create, changes, Snapshot::new(), after)
    }

    /// A modification. Only fields whose value differs are recorded.
    pub fn update(
        entity_type: impl Into<String>,
        entity_id: i64,
        before: Snapshot,
        after: Snapshot,
    ) -> Self {
        let changes = diff(&before, &after);
        Self::build(entity_type, entity_id, Operation::Update, changes, before, after)
    }

    /// A logical deletion. `after` is the soft-deleted state.
    pub fn delete(
        entity_type: impl Into<String>,
        entity_id: i64,
        before: Snapshot,
        after: Snapshot,
    ) -> Self {
        let changes = diff(&before, &after);
        Self::build(entity_type, entity_id, Operation::Delete, changes, before, after)
    }

    fn build(
        entity_type: impl Into<String>,
        entity_id: i64,
        operation: Operation,
        changes: Changes,
        snapshot_before: Snapshot,
        snapshot_after: Snapshot,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            operation,
            changes,
            snapshot_before,
            snapshot_after,
            user_id: None,
            user_email: None,
        }
    }

    /// Replace the derived change set.
    pub fn with_changes(mut self, changes: Changes) -> Self {
        self.changes = changes;
        self
    }

    /// Attribute the mutation to `user`.
    pub fn attributed_to(mut self, user: &User) -> Self {
        self.user_id = Some(user.id);
        self.user_email = Some(user.email.clone());
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    /// True when an update changed nothing.
    pub fn is_noop(&self) -> bool {
        self.operation == Operation::Update && self.changes.is_empty()
    }

    fn into_entry(self) -> NewAuditRecord {
        NewAuditRecord {
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            operation: self.operation,
            changes: self.changes,
            snapshot_before: self.snapshot_before,
            snapshot_after: self.snapshot_after,
            user_id: self.user_id,
            user_email: self.user_email,
        }
    }
}

/// Field-level diff over the union of both snapshots' keys.
///
/// A key missing on one side is treated as `null` there.
pub fn diff(before: &Snapshot, after: &Snapshot) -> Changes {
    let mut changes = Changes::new();
    for (field, old) in before {
        let new = after.get(field).cloned().unwrap_or(Value::Null);
        if *old != new {
            changes.insert(field.clone(), FieldChange::new(old.clone(), new));
        }
    }
    for (field, new) in after {
        if !before.contains_key(field) && !new.is_null() {
            changes.insert(field.clone(), FieldChange::new(Value::Null, new.clone()));
        }
    }
    changes
}

/// Thin orchestration over an `AuditLedger`.
#[derive(Clone)]
pub struct MutationRecorder {
    ledger: Arc<dyn AuditLedger>,
}

impl MutationRecorder {
    pub fn new(ledger: Arc<dyn AuditLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn AuditLedger> {
        &self.ledger
    }

    /// Append `mutation` to the ledger.
    pub fn record(&self, mutation: Mutation) -> LabtrailResult<AuditRecord> {
        let record = self.ledger.append(mutation.into_entry())?;
        debug!(
            entity_type = %record.entity_type,
            entity_id = record.entity_id,
            operation = %record.operation,
            record_id = record.id,
            "mutation recorded"
        );
        Ok(record)
    }

    /// Append `mutation`, then run `commit` with the stored record.
    ///
    /// `commit` must be the infallible tail of the unit of work: callers
    /// validate and acquire every lock they need before calling this.
    pub fn record_with<T>(
        &self,
        mutation: Mutation,
        commit: impl FnOnce(&AuditRecord) -> T,
    ) -> LabtrailResult<T> {
        let record = self.record(mutation)?;
        Ok(commit(&record))
    }
}
