//! File ingestion and the human review gate.
//!
//! ```text
//!   upload (hash, dedup) → propose (AI payload + structural check, PENDING)
//!     → confirm (re-validated, VALIDATED) | reject (REJECTED)
//! ```
//!
//! An AI proposal is never authoritative. Structural validation returns a
//! typed `Result<ValidatedData, ValidationFailure>`; a failing payload is
//! still stored as PENDING so a reviewer can see what went wrong, but it can
//! only be confirmed with a corrected payload that passes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use labtrail_contracts::{
    audit::{Changes, FieldChange},
    error::{LabtrailError, LabtrailResult},
    lab::{ParsedData, ParsedDataState, RawFile, User},
    policy::Permission,
    validation::{ValidatedData, ValidationFailure},
};
use labtrail_core::{
    traits::{BlobStore, Clock, ExtractionValidator},
    Mutation,
};

use super::{snapshot, ServiceContext};
use crate::store::LabTables;

/// SHA-256 of `content`, hex encoded.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Outcome of an upload. `duplicate` is true when identical content was
/// already stored in the tenant and the existing file was returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub raw_file: RawFile,
    pub duplicate: bool,
}

/// A stored AI proposal and its structural validation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub parsed_data: ParsedData,
    pub validation: Result<ValidatedData, ValidationFailure>,
    /// Older pending proposals for the same file that this one replaced.
    pub superseded: Vec<i64>,
}

pub struct ParsingService {
    ctx: ServiceContext,
    validator: Arc<dyn ExtractionValidator>,
    confidence_threshold: f64,
}

impl ParsingService {
    pub fn new(ctx: ServiceContext, validator: Arc<dyn ExtractionValidator>, confidence_threshold: f64) -> Self {
        Self {
            ctx,
            validator,
            confidence_threshold,
        }
    }

    // ── Upload ────────────────────────────────────────────────────────────────

    /// Store an uploaded machine file under its content hash.
    pub fn upload(&self, user: &User, filename: &str, content: &[u8], mime_type: &str) -> LabtrailResult<Upload> {
        self.ctx.authorize(user, Permission::DataUpload)?;
        if filename.trim().is_empty() {
            return Err(LabtrailError::field("filename", "Filename is required."));
        }

        let file_hash = content_hash(content);
        let mut tables = self.ctx.store.write()?;

        if let Some(existing) = tables
            .raw_files
            .values()
            .find(|f| f.tenant_id == user.tenant_id && f.file_hash == file_hash)
        {
            info!(raw_file_id = existing.id, file_hash = %file_hash, "duplicate upload; returning existing file");
            return Ok(Upload {
                raw_file: existing.clone(),
                duplicate: true,
            });
        }

        let storage_key = format!("raw_files/{}/{}", user.tenant_id, file_hash);
        self.ctx.blobs.put(&storage_key, content)?;

        let raw_file = RawFile {
            id: tables.next_id("raw_files"),
            tenant_id: user.tenant_id,
            user_id: user.id,
            filename: filename.to_string(),
            file_hash: file_hash.clone(),
            file_size: content.len() as u64,
            mime_type: mime_type.to_string(),
            storage_key,
            uploaded_at: self.ctx.clock.now(),
        };

        let mut changes = Changes::new();
        changes.insert("filename".to_string(), FieldChange::new(Value::Null, filename));
        changes.insert("file_hash".to_string(), FieldChange::new(Value::Null, file_hash.as_str()));
        let after = snapshot(json!({
            "id": raw_file.id,
            "filename": raw_file.filename,
            "file_hash": raw_file.file_hash,
            "file_size": raw_file.file_size,
            "mime_type": raw_file.mime_type,
        }));

        let mutation = Mutation::create(RawFile::ENTITY_TYPE, raw_file.id, after)
            .with_changes(changes)
            .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.raw_files.insert(raw_file.id, raw_file.clone());
        })?;

        info!(raw_file_id = raw_file.id, size = raw_file.file_size, "raw file uploaded");
        Ok(Upload {
            raw_file,
            duplicate: false,
        })
    }

    /// True if the stored bytes still hash to the recorded `file_hash`.
    pub fn verify_raw_file(&self, user: &User, raw_file_id: i64) -> LabtrailResult<bool> {
        let raw_file = {
            let tables = self.ctx.store.read()?;
            tenant_raw_file(&tables, user.tenant_id, raw_file_id)?.clone()
        };
        let intact = self
            .ctx
            .blobs
            .get(&raw_file.storage_key)?
            .is_some_and(|bytes| content_hash(&bytes) == raw_file.file_hash);
        if !intact {
            warn!(raw_file_id, "raw file content no longer matches its hash");
        }
        Ok(intact)
    }

    // ── AI proposal ───────────────────────────────────────────────────────────

    /// Record an AI extraction of `raw_file_id` for review.
    ///
    /// `field_confidence` maps field paths to the model's per-field
    /// confidence; every path below the configured threshold is flagged.
    /// Older pending proposals for the same file are superseded once the new
    /// one is recorded; any that cannot be stay pending.
    pub fn propose(
        &self,
        user: &User,
        raw_file_id: i64,
        payload: Value,
        model: &str,
        confidence: f64,
        field_confidence: BTreeMap<String, f64>,
    ) -> LabtrailResult<Proposal> {
        self.ctx.authorize(user, Permission::DataUpload)?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(LabtrailError::field(
                "extraction_confidence",
                format!("Confidence must be between 0 and 1, got {confidence}."),
            ));
        }

        let validation = self.validator.validate(&payload);
        let schema_valid = validation.is_ok();
        let validation_error = validation.as_ref().err().map(ValidationFailure::describe);
        let flagged_fields: Vec<String> = field_confidence
            .iter()
            .filter(|(_, score)| **score < self.confidence_threshold)
            .map(|(field, _)| field.clone())
            .collect();

        let mut tables = self.ctx.store.write()?;
        tenant_raw_file(&tables, user.tenant_id, raw_file_id)?;

        let older: Vec<i64> = tables
            .parsed_data
            .values()
            .filter(|p| p.raw_file_id == raw_file_id && p.state == ParsedDataState::Pending)
            .map(|p| p.id)
            .collect();

        let parsed_data = ParsedData {
            id: tables.next_id("parsed_data"),
            raw_file_id,
            tenant_id: user.tenant_id,
            extracted_at: self.ctx.clock.now(),
            parsed_json: payload,
            extraction_confidence: confidence,
            extraction_model: model.to_string(),
            field_confidence_scores: field_confidence,
            flagged_fields,
            confidence_threshold: self.confidence_threshold,
            schema_valid,
            state: ParsedDataState::Pending,
            validated_by: None,
            validated_at: None,
            validation_notes: String::new(),
            confirmed_json: None,
        };

        let mut changes = Changes::new();
        changes.insert("state".to_string(), FieldChange::new(Value::Null, ParsedDataState::Pending.as_str()));
        changes.insert("extraction_model".to_string(), FieldChange::new(Value::Null, model));
        changes.insert("schema_valid".to_string(), FieldChange::new(Value::Null, schema_valid));
        let after = snapshot(json!({
            "id": parsed_data.id,
            "raw_file_id": raw_file_id,
            "state": ParsedDataState::Pending.as_str(),
            "schema_valid": schema_valid,
            "validation_error": validation_error,
            "flagged_fields": parsed_data.flagged_fields,
        }));

        let mutation = Mutation::create(ParsedData::ENTITY_TYPE, parsed_data.id, after)
            .with_changes(changes)
            .attributed_to(user);
        self.ctx.recorder.record_with(mutation, |_| {
            tables.parsed_data.insert(parsed_data.id, parsed_data.clone());
        })?;

        // An older proposal that cannot be superseded stays pending.
        let mut superseded = Vec::with_capacity(older.len());
        for id in older {
            match self.transition(&mut tables, user, id, ParsedDataState::Superseded, Changes::new(), |_| {}) {
                Ok(_) => superseded.push(id),
                Err(e) => warn!(parsed_data_id = id, error = %e, "older proposal left pending"),
            }
        }

        match &validation {
            Ok(_) => info!(
                parsed_data_id = parsed_data.id,
                flagged = parsed_data.flagged_fields.len(),
                "extraction proposal stored for review"
            ),
            Err(failure) => warn!(
                parsed_data_id = parsed_data.id,
                violations = failure.violations.len(),
                "extraction proposal failed schema; stored for review"
            ),
        }
        Ok(Proposal { parsed_data, validation, superseded })
    }

    // ── Review gate ───────────────────────────────────────────────────────────

    /// Accept a pending proposal, as extracted or with reviewer corrections.
    ///
    /// The accepted payload is validated again; a payload that fails is
    /// refused with `SchemaValidation` and the proposal stays pending.
    pub fn confirm(
        &self,
        user: &User,
        parsed_data_id: i64,
        corrected: Option<Value>,
        notes: &str,
    ) -> LabtrailResult<ParsedData> {
        self.ctx.authorize(user, Permission::DataValidate)?;

        let mut tables = self.ctx.store.write()?;
        let current = pending(&tables, user.tenant_id, parsed_data_id, ParsedDataState::Validated)?.clone();
        let confirmed = corrected.unwrap_or_else(|| current.parsed_json.clone());

        if let Err(failure) = self.validator.validate(&confirmed) {
            warn!(parsed_data_id, violations = failure.violations.len(), "confirmed payload rejected by schema");
            return Err(LabtrailError::SchemaValidation {
                reason: format!("confirmed data does not match schema: {}", failure.describe()),
            });
        }

        let mut changes = Changes::new();
        changes.insert("validated_by_id".to_string(), FieldChange::new(Value::Null, user.id));
        let validated_at = self.ctx.clock.now();
        let confirmed_keys = object_keys(&confirmed);
        let validated = self.transition(
            &mut tables,
            user,
            parsed_data_id,
            ParsedDataState::Validated,
            changes,
            |row| {
                row.validated_by = Some(user.id);
                row.validated_at = Some(validated_at);
                row.validation_notes = notes.to_string();
                row.confirmed_json = Some(confirmed);
            },
        )?;

        info!(
            parsed_data_id,
            validated_by = %user.username,
            confirmed_keys = ?confirmed_keys,
            "extraction confirmed"
        );
        Ok(validated)
    }

    /// Refuse a pending proposal. A reason is required.
    pub fn reject(&self, user: &User, parsed_data_id: i64, reason: &str) -> LabtrailResult<ParsedData> {
        self.ctx.authorize(user, Permission::DataValidate)?;
        if reason.trim().is_empty() {
            return Err(LabtrailError::field("rejection_reason", "A rejection reason is required."));
        }

        let mut tables = self.ctx.store.write()?;
        pending(&tables, user.tenant_id, parsed_data_id, ParsedDataState::Rejected)?;

        let mut changes = Changes::new();
        changes.insert("rejection_reason".to_string(), FieldChange::new(Value::Null, reason));
        let validated_at = self.ctx.clock.now();
        let rejected = self.transition(
            &mut tables,
            user,
            parsed_data_id,
            ParsedDataState::Rejected,
            changes,
            |row| {
                row.validated_by = Some(user.id);
                row.validated_at = Some(validated_at);
                row.validation_notes = reason.to_string();
            },
        )?;

        info!(parsed_data_id, rejected_by = %user.username, "extraction rejected");
        Ok(rejected)
    }

    /// The tenant's proposals awaiting review, oldest first.
    pub fn pending_reviews(&self, user: &User) -> LabtrailResult<Vec<ParsedData>> {
        self.ctx.authorize(user, Permission::DataValidate)?;
        let tables = self.ctx.store.read()?;
        let mut queue: Vec<ParsedData> = tables
            .parsed_data
            .values()
            .filter(|p| p.tenant_id == user.tenant_id && p.state == ParsedDataState::Pending)
            .cloned()
            .collect();
        queue.sort_by_key(|p| (p.extracted_at, p.id));
        Ok(queue)
    }

    pub fn get(&self, user: &User, parsed_data_id: i64) -> LabtrailResult<ParsedData> {
        let tables = self.ctx.store.read()?;
        tables
            .parsed_data
            .get(&parsed_data_id)
            .filter(|p| p.tenant_id == user.tenant_id)
            .cloned()
            .ok_or_else(|| LabtrailError::not_found(ParsedData::ENTITY_TYPE, parsed_data_id))
    }

    /// Move one pending row to `to`, auditing the state change plus
    /// `changes`, and apply `update` to the stored row.
    fn transition(
        &self,
        tables: &mut LabTables,
        user: &User,
        id: i64,
        to: ParsedDataState,
        mut changes: Changes,
        update: impl FnOnce(&mut ParsedData),
    ) -> LabtrailResult<ParsedData> {
        let mut row = pending(tables, user.tenant_id, id, to)?.clone();
        let before_keys = object_keys(&row.parsed_json);
        row.state = to;
        update(&mut row);

        changes.insert(
            "state".to_string(),
            FieldChange::new(ParsedDataState::Pending.as_str(), to.as_str()),
        );
        let mutation = Mutation::update(
            ParsedData::ENTITY_TYPE,
            id,
            snapshot(json!({
                "state": ParsedDataState::Pending.as_str(),
                "parsed_json_keys": before_keys,
            })),
            snapshot(json!({
                "state": to.as_str(),
                "validated_by_id": row.validated_by,
                "confirmed_json_keys": row.confirmed_json.as_ref().map(object_keys),
                "validation_notes": row.validation_notes,
            })),
        )
        .with_changes(changes)
        .attributed_to(user);

        self.ctx.recorder.record_with(mutation, |_| {
            tables.parsed_data.insert(id, row.clone());
        })?;
        Ok(row)
    }
}

fn tenant_raw_file<'a>(tables: &'a LabTables, tenant_id: i64, id: i64) -> LabtrailResult<&'a RawFile> {
    tables
        .raw_files
        .get(&id)
        .filter(|f| f.tenant_id == tenant_id)
        .ok_or_else(|| LabtrailError::not_found(RawFile::ENTITY_TYPE, id))
}

/// The tenant's parsed data, which must still be pending to move to `to`.
fn pending<'a>(tables: &'a LabTables, tenant_id: i64, id: i64, to: ParsedDataState) -> LabtrailResult<&'a ParsedData> {
    let row = tables
        .parsed_data
        .get(&id)
        .filter(|p| p.tenant_id == tenant_id)
        .ok_or_else(|| LabtrailError::not_found(ParsedData::ENTITY_TYPE, id))?;
    if row.state != ParsedDataState::Pending {
        return Err(LabtrailError::InvalidTransition {
            entity: ParsedData::ENTITY_TYPE.to_string(),
            from: row.state.to_string(),
            to: to.to_string(),
        });
    }
    Ok(row)
}

fn object_keys(value: &Value) -> Vec<String> {
    value.as_object().map_or_else(Vec::new, |map| map.keys().cloned().collect())
}

#[cfg(test)]
mod tests {
    use labtrail_contracts::audit::Operation;
    use labtrail_core::traits::AuditLedger;

    use crate::fixtures::{extraction_payload, SPECTRO_CSV};
    use crate::testing::{harness, harness_over, FailingLedger, Harness};

    use super::*;

    fn confidence(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn upload_hashes_and_deduplicates_within_tenant() {
        let Harness { lab, technician, outsider, .. } = harness();

        let first = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();
        let again = lab.parsing.upload(&technician, "copy.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();
        let elsewhere = lab
            .parsing
            .upload(&outsider, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv")
            .unwrap();

        assert!(!first.duplicate);
        assert_eq!(first.raw_file.file_hash.len(), 64);
        assert_eq!(first.raw_file.file_hash, content_hash(SPECTRO_CSV.as_bytes()));
        assert!(again.duplicate, "same content in the same tenant is deduplicated");
        assert_eq!(again.raw_file.id, first.raw_file.id);
        assert!(!elsewhere.duplicate, "other tenants get their own copy");

        assert_eq!(lab.ledger.chain("RawFile").unwrap().len(), 2, "duplicates are not audited");
        assert!(lab.parsing.verify_raw_file(&technician, first.raw_file.id).unwrap());
    }

    #[test]
    fn tampered_blob_fails_raw_file_check() {
        let Harness { lab, technician, .. } = harness();
        let upload = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();

        lab.blobs.put(&upload.raw_file.storage_key, b"edited").unwrap();

        assert!(!lab.parsing.verify_raw_file(&technician, upload.raw_file.id).unwrap());
    }

    #[test]
    fn proposal_is_pending_and_flags_low_confidence_fields() {
        let Harness { lab, technician, .. } = harness();
        let upload = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();

        let proposal = lab
            .parsing
            .propose(
                &technician,
                upload.raw_file.id,
                extraction_payload(),
                "extractor-v2",
                0.92,
                confidence(&[("sample_records/0/sample_type", 0.55), ("sample_records/0/sample_name", 0.98)]),
            )
            .unwrap();

        let validated = proposal.validation.as_ref().expect("fixture payload is schema-valid");
        assert_eq!(validated.sample_count, 1);
        assert_eq!(proposal.parsed_data.state, ParsedDataState::Pending);
        assert!(proposal.parsed_data.schema_valid);
        assert_eq!(proposal.parsed_data.flagged_fields, vec!["sample_records/0/sample_type".to_string()]);
        assert!(proposal.parsed_data.confirmed_json.is_none(), "a proposal is never authoritative");
    }

    #[test]
    fn invalid_proposal_is_stored_with_typed_failure() {
        let Harness { lab, technician, reviewer, .. } = harness();
        let upload = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();

        let mut payload = extraction_payload();
        payload["sample_records"][0]["sample_type"] = json!("saliva");
        let proposal = lab
            .parsing
            .propose(&technician, upload.raw_file.id, payload, "extractor-v2", 0.8, BTreeMap::new())
            .unwrap();

        let failure = proposal.validation.as_ref().expect_err("saliva is not an allowed type");
        assert!(failure.violations.iter().any(|v| v.path == "/sample_records/0/sample_type"));
        assert!(!proposal.parsed_data.schema_valid);

        let err = lab.parsing.confirm(&reviewer, proposal.parsed_data.id, None, "").unwrap_err();
        assert!(matches!(err, LabtrailError::SchemaValidation { .. }), "got {err:?}");
        assert_eq!(
            lab.parsing.get(&reviewer, proposal.parsed_data.id).unwrap().state,
            ParsedDataState::Pending,
            "a refused confirmation leaves the proposal pending"
        );

        let fixed = lab
            .parsing
            .confirm(&reviewer, proposal.parsed_data.id, Some(extraction_payload()), "corrected type")
            .unwrap();
        assert_eq!(fixed.state, ParsedDataState::Validated);
        assert_eq!(fixed.confirmed_json, Some(extraction_payload()));
    }

    #[test]
    fn review_gate_confirm_and_reject() {
        let Harness { lab, technician, reviewer, .. } = harness();
        let upload = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();
        let propose = || {
            lab.parsing
                .propose(&technician, upload.raw_file.id, extraction_payload(), "extractor-v2", 0.9, BTreeMap::new())
                .unwrap()
                .parsed_data
        };

        let first = propose();
        let second = propose();
        assert_eq!(
            lab.parsing.get(&reviewer, first.id).unwrap().state,
            ParsedDataState::Superseded,
            "a newer proposal supersedes the pending one"
        );
        assert_eq!(lab.parsing.pending_reviews(&reviewer).unwrap(), vec![second.clone()]);

        assert!(matches!(
            lab.parsing.confirm(&technician, second.id, None, ""),
            Err(LabtrailError::PermissionDenied { .. })
        ));

        let confirmed = lab.parsing.confirm(&reviewer, second.id, None, "matches printout").unwrap();
        assert_eq!(confirmed.validated_by, Some(reviewer.id));
        assert!(lab.parsing.pending_reviews(&reviewer).unwrap().is_empty());

        let err = lab.parsing.reject(&reviewer, second.id, "too late").unwrap_err();
        assert!(matches!(err, LabtrailError::InvalidTransition { .. }));

        let history = lab.ledger.history_for("ParsedData", second.id).unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.operation, Operation::Update);
        assert_eq!(last.changes["state"], FieldChange::new("pending", "validated"));
        assert_eq!(last.changes["validated_by_id"], FieldChange::new(Value::Null, reviewer.id));
    }

    #[test]
    fn failed_proposal_leaves_review_queue_intact() {
        let ledger = Arc::new(FailingLedger::new());
        let Harness { lab, technician, reviewer, .. } = harness_over(ledger.clone());
        let upload = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();
        let propose = || {
            lab.parsing
                .propose(&technician, upload.raw_file.id, extraction_payload(), "extractor-v2", 0.9, BTreeMap::new())
        };

        let first = propose().unwrap();
        let second = propose().unwrap();
        assert_eq!(second.superseded, vec![first.parsed_data.id]);

        // The new proposal's audit record is refused.
        ledger.fail_after(0);
        let err = propose().unwrap_err();
        assert!(matches!(err, LabtrailError::LedgerWrite { .. }), "got {err:?}");
        assert_eq!(lab.parsing.pending_reviews(&reviewer).unwrap(), vec![second.parsed_data.clone()]);
        assert_eq!(lab.ledger.chain("ParsedData").unwrap().len(), 3, "no supersede was recorded");

        // The new proposal is recorded; superseding its predecessor is refused.
        ledger.fail_after(1);
        let fourth = propose().unwrap();
        assert!(fourth.superseded.is_empty());
        let queue: Vec<i64> = lab.parsing.pending_reviews(&reviewer).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(queue, vec![second.parsed_data.id, fourth.parsed_data.id]);
    }

    #[test]
    fn reject_requires_reason() {
        let Harness { lab, technician, reviewer, .. } = harness();
        let upload = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();
        let proposal = lab
            .parsing
            .propose(&technician, upload.raw_file.id, extraction_payload(), "extractor-v2", 0.4, BTreeMap::new())
            .unwrap();

        assert!(matches!(
            lab.parsing.reject(&reviewer, proposal.parsed_data.id, "  "),
            Err(LabtrailError::Validation { .. })
        ));

        let rejected = lab
            .parsing
            .reject(&reviewer, proposal.parsed_data.id, "Too many extraction errors")
            .unwrap();
        assert_eq!(rejected.state, ParsedDataState::Rejected);
        assert_eq!(rejected.validation_notes, "Too many extraction errors");
    }

    #[test]
    fn validated_data_without_step_is_orphaned() {
        let Harness { lab, technician, reviewer, .. } = harness();
        let upload = lab.parsing.upload(&technician, "run.csv", SPECTRO_CSV.as_bytes(), "text/csv").unwrap();
        let proposal = lab
            .parsing
            .propose(&technician, upload.raw_file.id, extraction_payload(), "extractor-v2", 0.9, BTreeMap::new())
            .unwrap();
        lab.parsing.confirm(&reviewer, proposal.parsed_data.id, None, "").unwrap();

        let orphans = lab.executions.orphaned_parsed_data(&reviewer).unwrap();
        assert_eq!(orphans.iter().map(|p| p.id).collect::<Vec<_>>(), vec![proposal.parsed_data.id]);

        let (_, steps) = crate::testing::execution_with_steps(&lab, &technician, &reviewer, 1);
        lab.executions
            .link_parsed_data(&technician, steps[0].id, proposal.parsed_data.id)
            .unwrap();

        assert!(lab.executions.orphaned_parsed_data(&reviewer).unwrap().is_empty());
    }
}
