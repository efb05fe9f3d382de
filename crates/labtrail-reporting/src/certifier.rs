//! The report certifier.
//!
//! `certify` is the only way a report reaches `Certified`. The pipeline:
//!
//! ```text
//!   1. load execution (tenant-scoped)          → NotFound if absent
//!   2. create report row (PENDING)
//!   3. verify the tenant's audit footprint
//!        invalid → REVOKED + audit UPDATE      → Err(ChainCorrupted)
//!   4. aggregate execution data
//!   5. render (preferred format, text on failure)
//!   6. hash bytes, store blob under a key unique to the report
//!   7. CERTIFIED + audit CREATE
//! ```
//!
//! Any other failure after step 2 also revokes the row, with the error as
//! the reason. A revoked row is never deleted; it stays as the record of the
//! refused certification. If the revocation itself cannot be audited the row
//! stays PENDING and the original error is returned.

use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use labtrail_audit::ChainVerifier;
use labtrail_contracts::{
    audit::{Changes, FieldChange, Snapshot},
    error::{LabtrailError, LabtrailResult},
    integrity::IntegrityReport,
    lab::{Execution, ExecutionBundle, User},
    report::{CertifiedReport, ReportDocument, ReportState},
};
use labtrail_core::{
    config::ReportingConfig,
    traits::{AuditLedger, BlobStore, Clock, DocumentRenderer, ExecutionSource},
    LabtrailConfig, Mutation, MutationRecorder,
};

use crate::aggregate::aggregate;
use crate::registry::ReportRegistry;
use crate::render::{renderer_for, TextRenderer};

pub struct ReportCertifier {
    source: Arc<dyn ExecutionSource>,
    ledger: Arc<dyn AuditLedger>,
    recorder: MutationRecorder,
    verifier: ChainVerifier,
    registry: Arc<ReportRegistry>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    renderer: Box<dyn DocumentRenderer>,
    fallback: TextRenderer,
    settings: ReportingConfig,
}

impl ReportCertifier {
    /// Build a certifier using the renderer, verification scope and
    /// reporting settings from `config`.
    pub fn new(
        source: Arc<dyn ExecutionSource>,
        ledger: Arc<dyn AuditLedger>,
        registry: Arc<ReportRegistry>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        config: &LabtrailConfig,
    ) -> Self {
        Self {
            source,
            recorder: MutationRecorder::new(ledger.clone()),
            verifier: ChainVerifier::new(ledger.clone())
                .with_scope(config.verification.tenant_scope),
            ledger,
            registry,
            blobs,
            clock,
            renderer: renderer_for(config.reporting.preferred_format),
            fallback: TextRenderer,
            settings: config.reporting.clone(),
        }
    }

    /// Replace the preferred renderer.
    pub fn with_renderer(mut self, renderer: Box<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn registry(&self) -> &Arc<ReportRegistry> {
        &self.registry
    }

    /// Certify execution `execution_id` of `user`'s tenant.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the execution does not exist in the user's tenant.
    ///   No report row is created.
    /// - `ChainCorrupted` if tenant-wide verification finds any corrupted
    ///   record. The report row is persisted as `Revoked` first.
    /// - Any error raised while aggregating, storing or recording the report.
    ///   The row is revoked with that error as its reason.
    pub fn certify(&self, execution_id: i64, user: &User, notes: &str) -> LabtrailResult<CertifiedReport> {
        let tenant_id = user.tenant_id;
        let bundle = self
            .source
            .execution_bundle(tenant_id, execution_id)?
            .ok_or_else(|| LabtrailError::not_found(Execution::ENTITY_TYPE, execution_id))?;

        let report = self.registry.create_pending(tenant_id, execution_id, user.id)?;

        match self.issue(report.id, &bundle, user, notes) {
            Err(e @ LabtrailError::ChainCorrupted { .. }) => Err(e),
            Err(e) => Err(self.abandon(report.id, user, e)),
            Ok(certified) => Ok(certified),
        }
    }

    /// Steps 3 to 7 for the pending row `report_id`.
    fn issue(
        &self,
        report_id: i64,
        bundle: &ExecutionBundle,
        user: &User,
        notes: &str,
    ) -> LabtrailResult<CertifiedReport> {
        let execution_id = bundle.execution.id;
        let user_ids = self.source.tenant_user_ids(user.tenant_id)?;
        let integrity = self.verifier.verify_tenant_wide(&user_ids)?;

        if !integrity.is_valid {
            return Err(self.revoke(report_id, user, integrity));
        }

        let data = aggregate(bundle, self.ledger.as_ref())?;
        let document = ReportDocument {
            report_id,
            generated_at: self.clock.now(),
            certified_by: user.display_name().to_string(),
            standard: self.settings.regulatory_standard.clone(),
            data,
            integrity,
            notes: notes.to_string(),
        };

        let (bytes, extension) = self.render(&document);
        let report_hash = hex::encode(Sha256::digest(&bytes));
        let filename = format!(
            "execution_{}_{}_{}.{}",
            execution_id,
            report_id,
            document.generated_at.format("%Y%m%dT%H%M%SZ"),
            extension
        );
        let key = self.blob_key(&filename);
        if self.blobs.get(&key)?.is_some() {
            return Err(LabtrailError::Storage {
                reason: format!("document key '{}' is already in use", key),
            });
        }
        self.blobs.put(&key, &bytes)?;

        let certified = self.registry.transition(report_id, ReportState::Certified, |draft| {
            draft.certified_at = Some(document.generated_at);
            draft.report_hash = report_hash.clone();
            draft.pdf_filename = filename.clone();
            draft.pdf_size = bytes.len() as u64;
            draft.chain_integrity_verified = true;
            draft.chain_verification_details = Some(document.integrity.clone());

            let mut changes = Changes::new();
            changes.insert("state".to_string(), FieldChange::new(Value::Null, ReportState::Certified.as_str()));
            changes.insert("chain_verified".to_string(), FieldChange::new(Value::Null, true));

            let after = snapshot(json!({
                "id": draft.id,
                "execution_id": execution_id,
                "report_hash": draft.report_hash,
                "pdf_filename": draft.pdf_filename,
                "chain_integrity_verified": true,
            }));
            self.recorder.record(
                Mutation::create(CertifiedReport::ENTITY_TYPE, draft.id, after)
                    .with_changes(changes)
                    .attributed_to(user),
            )?;
            Ok(())
        })?;

        info!(
            report_id = certified.id,
            execution_id,
            report_hash = %certified.report_hash,
            filename = %certified.pdf_filename,
            size = certified.pdf_size,
            "report certified"
        );
        Ok(certified)
    }

    /// The stored document bytes of a certified report.
    pub fn document_bytes(&self, report_id: i64) -> LabtrailResult<Option<Vec<u8>>> {
        let report = self
            .registry
            .get(report_id)?
            .ok_or_else(|| LabtrailError::not_found(CertifiedReport::ENTITY_TYPE, report_id))?;
        if report.state != ReportState::Certified {
            return Ok(None);
        }
        self.blobs.get(&self.blob_key(&report.pdf_filename))
    }

    /// True if the stored document still hashes to the recorded `report_hash`.
    pub fn verify_document(&self, report_id: i64) -> LabtrailResult<bool> {
        let Some(bytes) = self.document_bytes(report_id)? else {
            return Ok(false);
        };
        let report = self
            .registry
            .get(report_id)?
            .ok_or_else(|| LabtrailError::not_found(CertifiedReport::ENTITY_TYPE, report_id))?;
        Ok(hex::encode(Sha256::digest(&bytes)) == report.report_hash)
    }

    fn blob_key(&self, filename: &str) -> String {
        format!("{}/{}", self.settings.blob_prefix, filename)
    }

    /// Render with the preferred renderer, falling back to text on failure.
    fn render(&self, document: &ReportDocument) -> (Vec<u8>, &'static str) {
        match self.renderer.render(document) {
            Ok(bytes) => (bytes, self.renderer.format().extension()),
            Err(e) => {
                warn!(
                    report_id = document.report_id,
                    format = self.renderer.format().extension(),
                    error = %e,
                    "preferred renderer failed; falling back to text"
                );
                let bytes = self.fallback.lines(document).join("\n").into_bytes();
                (bytes, self.fallback.format().extension())
            }
        }
    }

    /// Persist the report as `Revoked` with its audit UPDATE and build the
    /// error the caller returns.
    fn revoke(&self, report_id: i64, user: &User, integrity: IntegrityReport) -> LabtrailError {
        let corrupted = integrity.corrupted_count();
        let reason = format!("Audit chain corrupted: {} records failed verification", corrupted);

        match self.close_revoked(report_id, user, &reason, Some(integrity)) {
            Ok(_) => {
                warn!(report_id, corrupted, "certification refused; report revoked");
                LabtrailError::ChainCorrupted { report_id, corrupted }
            }
            Err(e) => e,
        }
    }

    /// Revoke a row whose certification failed after it was created, and
    /// hand back the failure.
    fn abandon(&self, report_id: i64, user: &User, error: LabtrailError) -> LabtrailError {
        let reason = format!("Certification failed: {}", error);
        match self.close_revoked(report_id, user, &reason, None) {
            Ok(_) => warn!(report_id, error = %error, "certification failed; report revoked"),
            Err(e) => warn!(
                report_id,
                error = %error,
                revoke_error = %e,
                "certification failed; report left pending"
            ),
        }
        error
    }

    fn close_revoked(
        &self,
        report_id: i64,
        user: &User,
        reason: &str,
        integrity: Option<IntegrityReport>,
    ) -> LabtrailResult<CertifiedReport> {
        self.registry.transition(report_id, ReportState::Revoked, |draft| {
            draft.revocation_reason = reason.to_string();
            draft.chain_integrity_verified = false;
            draft.chain_verification_details = integrity;

            let mut changes = Changes::new();
            changes.insert(
                "state".to_string(),
                FieldChange::new(ReportState::Pending.as_str(), ReportState::Revoked.as_str()),
            );
            self.recorder.record(
                Mutation::update(
                    CertifiedReport::ENTITY_TYPE,
                    report_id,
                    snapshot(json!({ "state": ReportState::Pending.as_str() })),
                    snapshot(json!({ "state": ReportState::Revoked.as_str(), "reason": reason })),
                )
                .with_changes(changes)
                .attributed_to(user),
            )?;
            Ok(())
        })
    }
}

fn snapshot(value: Value) -> Snapshot {
    match value {
        Value::Object(map) => map,
        _ => Snapshot::new(),
    }
}
