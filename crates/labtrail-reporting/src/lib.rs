//! # labtrail-reporting
//!
//! Certified execution reports, issued only over an intact audit trail.
//!
//! ## Overview
//!
//! [`ReportCertifier`] verifies every audit record attributed to the
//! tenant's users before rendering anything. A corrupted record anywhere in
//! that footprint revokes the report and fails the call; otherwise the
//! execution is aggregated, rendered (PDF or text), hashed with SHA-256,
//! stored in the blob store, and the report row moves to `CERTIFIED`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use labtrail_reporting::{ReportCertifier, ReportRegistry};
//!
//! let certifier = ReportCertifier::new(store, ledger, registry, blobs, clock, &config);
//! let report = certifier.certify(execution_id, &approver, "All steps reviewed")?;
//! assert_eq!(report.report_hash.len(), 64);
//! ```

pub mod aggregate;
pub mod certifier;
pub mod registry;
pub mod render;

pub use aggregate::{aggregate, footprint_of};
pub use certifier::ReportCertifier;
pub use registry::ReportRegistry;
pub use render::{renderer_for, PdfRenderer, TextRenderer};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;

    use labtrail_audit::InMemoryLedger;
    use labtrail_contracts::{
        audit::{AuditRecord, Changes, FieldChange, NewAuditRecord, Operation, Snapshot},
        error::{LabtrailError, LabtrailResult},
        integrity::VerificationScope,
        lab::{Execution, ExecutionBundle, ExecutionStatus, ExecutionStep, Protocol, Sample, User},
        report::{CertifiedReport, DocumentFormat, ReportDocument, ReportState},
    };
    use labtrail_core::{
        traits::{AuditLedger, BlobStore, Clock, DocumentRenderer, ExecutionSource},
        FixedClock, InMemoryBlobStore, LabtrailConfig, StepClock,
    };

    use crate::{aggregate, ReportCertifier, ReportRegistry};

    // ── Helpers ───────────────────────────────────────────────────────────────

    const TENANT: i64 = 1;
    const OTHER_TENANT: i64 = 2;
    const TECHNICIAN: i64 = 10;
    const APPROVER: i64 = 11;
    const EXECUTION: i64 = 42;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn user(id: i64, tenant_id: i64, username: &str) -> User {
        User {
            id,
            tenant_id,
            username: username.to_string(),
            email: format!("{username}@lab.example"),
            full_name: None,
            role: Some("qa_reviewer".to_string()),
            is_active: true,
        }
    }

    fn sample(id: i64, name: &str) -> Sample {
        Sample {
            id,
            name: name.to_string(),
            sample_type: "blood".to_string(),
            received_at: start(),
            location: "Freezer 1".to_string(),
            deleted_at: None,
        }
    }

    fn step(id: i64, step_number: i32, sample_id: i64, notes: &str) -> ExecutionStep {
        ExecutionStep {
            id,
            execution_id: EXECUTION,
            step_number,
            sample_id,
            parsed_data_id: None,
            is_valid: true,
            validation_notes: notes.to_string(),
        }
    }

    fn bundle() -> ExecutionBundle {
        ExecutionBundle {
            execution: Execution {
                id: EXECUTION,
                tenant_id: TENANT,
                protocol_id: 5,
                equipment_id: None,
                started_by: TECHNICIAN,
                started_at: start(),
                completed_at: Some(start()),
                status: ExecutionStatus::Completed,
                source_file_id: None,
                notes: String::new(),
            },
            protocol: Some(Protocol {
                id: 5,
                title: "DNA Extraction".to_string(),
                description: "Standard extraction".to_string(),
                steps: String::new(),
                deleted_at: None,
            }),
            equipment: None,
            steps: vec![step(101, 2, 2, "Step 2 OK"), step(100, 1, 1, "Step 1 OK"), step(102, 3, 1, "")],
            samples: vec![sample(1, "Sample A"), sample(2, "Sample B")],
            parsed_data: vec![],
        }
    }

    struct StubSource {
        bundles: Vec<ExecutionBundle>,
        users: BTreeMap<i64, BTreeSet<i64>>,
    }

    impl ExecutionSource for StubSource {
        fn execution_bundle(&self, tenant_id: i64, execution_id: i64) -> LabtrailResult<Option<ExecutionBundle>> {
            Ok(self
                .bundles
                .iter()
                .find(|b| b.execution.id == execution_id && b.execution.tenant_id == tenant_id)
                .cloned())
        }

        fn tenant_user_ids(&self, tenant_id: i64) -> LabtrailResult<BTreeSet<i64>> {
            Ok(self.users.get(&tenant_id).cloned().unwrap_or_default())
        }
    }

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        blobs: Arc<InMemoryBlobStore>,
        certifier: ReportCertifier,
    }

    fn harness_with(config: LabtrailConfig) -> Harness {
        harness_at(config, Arc::new(StepClock::per_second(start())))
    }

    fn harness_at(config: LabtrailConfig, clock: Arc<dyn Clock>) -> Harness {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let (ledger, certifier) = build(&config, clock, blobs.clone());
        Harness { ledger, blobs, certifier }
    }

    fn build(
        config: &LabtrailConfig,
        clock: Arc<dyn Clock>,
        blobs: Arc<dyn BlobStore>,
    ) -> (Arc<InMemoryLedger>, ReportCertifier) {
        let ledger = Arc::new(InMemoryLedger::new(clock.clone()));
        let source = Arc::new(StubSource {
            bundles: vec![bundle()],
            users: BTreeMap::from([
                (TENANT, BTreeSet::from([TECHNICIAN, APPROVER])),
                (OTHER_TENANT, BTreeSet::from([99])),
            ]),
        });
        let certifier = ReportCertifier::new(
            source,
            ledger.clone(),
            Arc::new(ReportRegistry::new(clock.clone())),
            blobs,
            clock,
            config,
        );
        (ledger, certifier)
    }

    fn harness() -> Harness {
        harness_with(LabtrailConfig::default())
    }

    fn per_entity_config() -> LabtrailConfig {
        let mut config = LabtrailConfig::default();
        config.verification.tenant_scope = VerificationScope::PerEntityType;
        config
    }

    fn entry(entity_type: &str, entity_id: i64, user_id: i64, status: &str) -> NewAuditRecord {
        let mut changes = Changes::new();
        changes.insert("status".to_string(), FieldChange::new(Value::Null, status));
        NewAuditRecord {
            entity_type: entity_type.to_string(),
            entity_id,
            operation: Operation::Update,
            changes,
            snapshot_before: Snapshot::new(),
            snapshot_after: Snapshot::new(),
            user_id: Some(user_id),
            user_email: None,
        }
    }

    /// Five updates to one execution: a single entity-type stream.
    fn seed_single_stream(ledger: &InMemoryLedger) {
        for status in ["running", "paused", "running", "completed", "validated"] {
            ledger.append(entry("ExecutionLog", EXECUTION, TECHNICIAN, status)).unwrap();
        }
    }

    fn garbage_record(id: i64) -> AuditRecord {
        AuditRecord {
            id,
            entity_type: "ExecutionLog".to_string(),
            entity_id: EXECUTION,
            operation: Operation::Update,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
            changes: Changes::new(),
            snapshot_before: Snapshot::new(),
            snapshot_after: Snapshot::new(),
            user_id: Some(TECHNICIAN),
            user_email: None,
            signature: "f".repeat(64),
            previous_signature: Some("garbage".to_string()),
        }
    }

    /// Refuses every write.
    struct FullDisk;

    impl BlobStore for FullDisk {
        fn put(&self, _key: &str, _bytes: &[u8]) -> LabtrailResult<()> {
            Err(LabtrailError::Storage {
                reason: "disk full".to_string(),
            })
        }

        fn get(&self, _key: &str) -> LabtrailResult<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    struct FailingRenderer;

    impl DocumentRenderer for FailingRenderer {
        fn format(&self) -> DocumentFormat {
            DocumentFormat::Pdf
        }

        fn render(&self, _document: &ReportDocument) -> LabtrailResult<Vec<u8>> {
            Err(LabtrailError::Render {
                reason: "font subsystem unavailable".to_string(),
            })
        }
    }

    // ── 1. happy path ─────────────────────────────────────────────────────────

    #[test]
    fn test_certify_happy_path() {
        let h = harness();
        seed_single_stream(&h.ledger);

        let approver = user(APPROVER, TENANT, "qa1");
        let report = h.certifier.certify(EXECUTION, &approver, "ok").unwrap();

        assert_eq!(report.state, ReportState::Certified);
        assert_eq!(report.report_hash.len(), 64);
        assert!(report.report_hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(report.chain_integrity_verified);
        assert!(report.certified_at.is_some());
        assert!(report.pdf_filename.starts_with("execution_42_"));
        assert!(report.pdf_filename.ends_with(".pdf"));

        let details = report.chain_verification_details.as_ref().unwrap();
        assert_eq!(details.total_records, 5);
        assert_eq!(details.verified_records, 5);

        let key = format!("certified_reports/{}", report.pdf_filename);
        let stored = h.blobs.get(&key).unwrap().expect("document stored in blob store");
        assert_eq!(stored.len() as u64, report.pdf_size);
        assert!(stored.starts_with(b"%PDF-1.4"));
        assert!(h.certifier.verify_document(report.id).unwrap());
    }

    #[test]
    fn test_certify_records_create_audit() {
        let h = harness();
        seed_single_stream(&h.ledger);

        let report = h.certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "ok").unwrap();

        let history = h.ledger.history_for(CertifiedReport::ENTITY_TYPE, report.id).unwrap();
        assert_eq!(history.len(), 1);
        let audit = &history[0];
        assert_eq!(audit.operation, Operation::Create);
        assert_eq!(audit.user_id, Some(APPROVER));
        assert_eq!(audit.changes["state"].after, "CERTIFIED");
        assert_eq!(audit.changes["chain_verified"].after, true);
        assert_eq!(audit.snapshot_after["report_hash"], report.report_hash.as_str());
    }

    #[test]
    fn test_per_entity_scope_certifies_interleaved_history() {
        let h = harness_with(per_entity_config());
        h.ledger.append(entry("Protocol", 5, TECHNICIAN, "draft")).unwrap();
        h.ledger.append(entry("Sample", 1, TECHNICIAN, "received")).unwrap();
        h.ledger.append(entry("ExecutionLog", EXECUTION, TECHNICIAN, "running")).unwrap();
        h.ledger.append(entry("ExecutionStep", 100, TECHNICIAN, "done")).unwrap();

        let approver = user(APPROVER, TENANT, "qa1");
        let first = h.certifier.certify(EXECUTION, &approver, "first").unwrap();
        let second = h.certifier.certify(EXECUTION, &approver, "second").unwrap();

        assert_eq!(first.state, ReportState::Certified);
        assert_eq!(second.state, ReportState::Certified);
        assert_ne!(first.report_hash, second.report_hash);
    }

    #[test]
    fn test_global_scope_flags_interleaved_entity_types() {
        let h = harness();
        h.ledger.append(entry("Sample", 1, TECHNICIAN, "received")).unwrap();
        h.ledger.append(entry("ExecutionLog", EXECUTION, TECHNICIAN, "running")).unwrap();

        match h.certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "ok") {
            Err(LabtrailError::ChainCorrupted { corrupted, .. }) => assert_eq!(corrupted, 1),
            other => panic!("expected ChainCorrupted, got {:?}", other),
        }
    }

    // ── 2. corrupted chain ────────────────────────────────────────────────────

    #[test]
    fn test_corrupted_chain_revokes_report() {
        let h = harness();
        seed_single_stream(&h.ledger);
        h.ledger.import(garbage_record(500)).unwrap();

        let approver = user(APPROVER, TENANT, "qa1");
        let report_id = match h.certifier.certify(EXECUTION, &approver, "ok") {
            Err(LabtrailError::ChainCorrupted { report_id, corrupted }) => {
                assert_eq!(corrupted, 1);
                report_id
            }
            other => panic!("expected ChainCorrupted, got {:?}", other),
        };

        let row = h.certifier.registry().get(report_id).unwrap().expect("revoked row kept");
        assert_eq!(row.state, ReportState::Revoked);
        assert_eq!(row.revocation_reason, "Audit chain corrupted: 1 records failed verification");
        assert!(!row.chain_integrity_verified);
        assert!(row.report_hash.is_empty());
        let details = row.chain_verification_details.unwrap();
        assert_eq!(details.corrupted_records[0].id, 500);

        let history = h.ledger.history_for(CertifiedReport::ENTITY_TYPE, report_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation, Operation::Update);
        assert_eq!(history[0].changes["state"].before, "PENDING");
        assert_eq!(history[0].changes["state"].after, "REVOKED");

        assert!(h.blobs.keys().unwrap().is_empty(), "no document for a revoked report");
        assert_eq!(h.certifier.document_bytes(report_id).unwrap(), None);
    }

    #[test]
    fn test_other_tenant_corruption_does_not_block() {
        let h = harness();
        seed_single_stream(&h.ledger);
        let mut foreign = garbage_record(500);
        foreign.user_id = Some(99);
        foreign.entity_type = "Sample".to_string();
        h.ledger.import(foreign).unwrap();

        let report = h.certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "ok").unwrap();
        assert_eq!(report.state, ReportState::Certified);
    }

    // ── 3. not found ──────────────────────────────────────────────────────────

    #[test]
    fn test_execution_of_other_tenant_not_found() {
        let h = harness();
        let outsider = user(99, OTHER_TENANT, "mallory");

        match h.certifier.certify(EXECUTION, &outsider, "ok") {
            Err(LabtrailError::NotFound { entity_type, id }) => {
                assert_eq!(entity_type, "ExecutionLog");
                assert_eq!(id, EXECUTION);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(h.certifier.registry().for_execution(EXECUTION).unwrap().is_empty());
    }

    // ── 4. rendering ──────────────────────────────────────────────────────────

    #[test]
    fn test_renderer_failure_falls_back_to_text() {
        let h = harness();
        seed_single_stream(&h.ledger);
        let certifier = h.certifier.with_renderer(Box::new(FailingRenderer));

        let report = certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "ok").unwrap();

        assert_eq!(report.state, ReportState::Certified);
        assert!(report.pdf_filename.ends_with(".txt"));
        let bytes = certifier.document_bytes(report.id).unwrap().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("CERTIFIED EXECUTION REPORT"));
        assert!(text.contains("Step 1: Sample A - Valid: ✓ - Step 1 OK"));
    }

    #[test]
    fn test_text_format_from_config() {
        let mut config = LabtrailConfig::default();
        config.reporting.preferred_format = DocumentFormat::Text;
        config.reporting.regulatory_standard = "EU GMP Annex 11".to_string();
        let h = harness_with(config);

        let report = h.certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "").unwrap();
        assert!(report.pdf_filename.ends_with(".txt"));

        let text = String::from_utf8(h.certifier.document_bytes(report.id).unwrap().unwrap()).unwrap();
        assert!(text.contains("This report certifies EU GMP Annex 11 compliance"));
        assert!(text.contains("Total Audit Records: 0"));
    }

    #[test]
    fn test_tampered_blob_fails_document_check() {
        let h = harness();
        let report = h.certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "ok").unwrap();

        h.blobs
            .put(&format!("certified_reports/{}", report.pdf_filename), b"edited")
            .unwrap();
        assert!(!h.certifier.verify_document(report.id).unwrap());
    }

    // ── 5. document storage ───────────────────────────────────────────────────

    #[test]
    fn test_same_second_certifications_keep_their_documents() {
        let h = harness_at(per_entity_config(), Arc::new(FixedClock(start())));
        seed_single_stream(&h.ledger);
        let approver = user(APPROVER, TENANT, "qa1");

        let first = h.certifier.certify(EXECUTION, &approver, "first").unwrap();
        let second = h.certifier.certify(EXECUTION, &approver, "second").unwrap();

        assert_eq!(first.pdf_filename, "execution_42_1_20240301T090000Z.pdf");
        assert_eq!(second.pdf_filename, "execution_42_2_20240301T090000Z.pdf");
        assert!(h.certifier.verify_document(first.id).unwrap(), "first document must survive the second");
        assert!(h.certifier.verify_document(second.id).unwrap());
        assert_eq!(h.blobs.keys().unwrap().len(), 2);
    }

    #[test]
    fn test_occupied_document_key_is_not_overwritten() {
        let h = harness_at(LabtrailConfig::default(), Arc::new(FixedClock(start())));
        seed_single_stream(&h.ledger);
        let key = "certified_reports/execution_42_1_20240301T090000Z.pdf";
        h.blobs.put(key, b"existing").unwrap();

        let err = h.certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "ok").unwrap_err();
        assert!(
            matches!(&err, LabtrailError::Storage { reason } if reason.contains("already in use")),
            "got {err:?}"
        );
        assert_eq!(h.blobs.get(key).unwrap().as_deref(), Some(&b"existing"[..]));

        let row = h.certifier.registry().get(1).unwrap().expect("row kept");
        assert_eq!(row.state, ReportState::Revoked);
        assert!(row.revocation_reason.starts_with("Certification failed: storage error: document key"));
    }

    #[test]
    fn test_failed_document_write_revokes_row() {
        let (ledger, certifier) = build(
            &LabtrailConfig::default(),
            Arc::new(StepClock::per_second(start())),
            Arc::new(FullDisk),
        );
        seed_single_stream(&ledger);

        let err = certifier.certify(EXECUTION, &user(APPROVER, TENANT, "qa1"), "ok").unwrap_err();
        assert!(matches!(err, LabtrailError::Storage { .. }), "got {err:?}");

        let rows = certifier.registry().for_execution(EXECUTION).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.state, ReportState::Revoked, "no row may stay pending");
        assert_eq!(row.revocation_reason, "Certification failed: storage error: disk full");
        assert!(row.report_hash.is_empty());
        assert!(!row.chain_integrity_verified);
        assert_eq!(certifier.document_bytes(row.id).unwrap(), None);

        let history = ledger.history_for(CertifiedReport::ENTITY_TYPE, row.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation, Operation::Update);
        assert_eq!(history[0].changes["state"].after, "REVOKED");
    }

    // ── 6. aggregation ────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_orders_steps_and_dedups_samples() {
        let ledger = InMemoryLedger::new(Arc::new(StepClock::per_second(start())));
        ledger.append(entry("ExecutionLog", EXECUTION, TECHNICIAN, "running")).unwrap();
        ledger.append(entry("ExecutionStep", 100, TECHNICIAN, "done")).unwrap();
        ledger.append(entry("ExecutionStep", 999, TECHNICIAN, "elsewhere")).unwrap();
        ledger.append(entry("Sample", 1, TECHNICIAN, "received")).unwrap();

        let data = aggregate(&bundle(), &ledger).unwrap();

        assert_eq!(data.execution.protocol, "DNA Extraction");
        assert_eq!(data.execution.equipment, "None");
        assert_eq!(data.execution.status, "completed");
        let numbers: Vec<i32> = data.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(data.steps[0].sample, "Sample A");
        let sample_ids: Vec<i64> = data.samples.iter().map(|s| s.id).collect();
        assert_eq!(sample_ids, vec![1, 2]);
        assert_eq!(data.audit_records_count, 2, "only the execution and its own steps count");
    }

    #[test]
    fn test_aggregate_missing_protocol_and_sample() {
        let ledger = InMemoryLedger::new(Arc::new(StepClock::per_second(start())));
        let mut bundle = bundle();
        bundle.protocol = None;
        bundle.samples.retain(|s| s.id != 2);

        let data = aggregate(&bundle, &ledger).unwrap();
        assert_eq!(data.execution.protocol, "Unknown");
        assert_eq!(data.steps[1].sample, "Unknown");
        assert_eq!(data.samples.len(), 1);
    }
}
