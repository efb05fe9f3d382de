//! Wiring of a complete lab backend.
//!
//! `Lab` owns one ledger, one blob store and one record store, and builds
//! every service and the certifier over them.

use std::sync::Arc;

use tracing::info;

use labtrail_audit::{ledger_from_config, ChainVerifier};
use labtrail_contracts::{
    error::LabtrailResult,
    lab::User,
    policy::Permission,
    report::CertifiedReport,
};
use labtrail_core::{
    ensure_permitted,
    traits::{AccessPolicy, AuditLedger, BlobStore, Clock, ExecutionSource},
    InMemoryBlobStore, LabtrailConfig, MutationRecorder,
};
use labtrail_reporting::{ReportCertifier, ReportRegistry};
use labtrail_verify::SchemaValidator;

use crate::services::{ExecutionService, ParsingService, ProtocolService, SampleService, ServiceContext};
use crate::store::LabStore;

pub struct Lab {
    pub config: LabtrailConfig,
    pub clock: Arc<dyn Clock>,
    pub policy: Arc<dyn AccessPolicy>,
    pub ledger: Arc<dyn AuditLedger>,
    pub blobs: Arc<dyn BlobStore>,
    pub store: Arc<LabStore>,
    pub verifier: ChainVerifier,
    pub samples: SampleService,
    pub protocols: ProtocolService,
    pub executions: ExecutionService,
    pub parsing: ParsingService,
    pub certifier: ReportCertifier,
}

impl Lab {
    /// A fresh lab: ledger per `config.ledger`, empty stores.
    pub fn new(config: LabtrailConfig, policy: Arc<dyn AccessPolicy>, clock: Arc<dyn Clock>) -> LabtrailResult<Self> {
        let ledger = ledger_from_config(&config, clock.clone())?;
        Self::assemble(
            config,
            policy,
            clock,
            ledger,
            Arc::new(LabStore::new()),
            Arc::new(InMemoryBlobStore::new()),
        )
    }

    /// Build a lab over existing stores, e.g. after reopening a journal.
    pub fn assemble(
        config: LabtrailConfig,
        policy: Arc<dyn AccessPolicy>,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn AuditLedger>,
        store: Arc<LabStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> LabtrailResult<Self> {
        let ctx = ServiceContext {
            store: store.clone(),
            recorder: MutationRecorder::new(ledger.clone()),
            policy: policy.clone(),
            blobs: blobs.clone(),
            clock: clock.clone(),
        };
        let validator = Arc::new(SchemaValidator::batch_extraction()?);
        let source: Arc<dyn ExecutionSource> = store.clone();
        let registry = Arc::new(ReportRegistry::new(clock.clone()));
        let certifier = ReportCertifier::new(source, ledger.clone(), registry, blobs.clone(), clock.clone(), &config);

        info!(
            scope = ?config.verification.tenant_scope,
            format = config.reporting.preferred_format.extension(),
            journal = config.ledger.journal_path.is_some(),
            "lab assembled"
        );

        Ok(Self {
            verifier: ChainVerifier::new(ledger.clone()).with_scope(config.verification.tenant_scope),
            samples: SampleService::new(ctx.clone()),
            protocols: ProtocolService::new(ctx.clone()),
            executions: ExecutionService::new(ctx.clone()),
            parsing: ParsingService::new(ctx, validator, config.parsing.confidence_threshold),
            certifier,
            config,
            clock,
            policy,
            ledger,
            blobs,
            store,
        })
    }

    /// Certify an execution on behalf of `user`, who must hold
    /// `audit:export`.
    pub fn certify(&self, user: &User, execution_id: i64, notes: &str) -> LabtrailResult<CertifiedReport> {
        ensure_permitted(self.policy.as_ref(), user, Permission::AuditExport)?;
        self.certifier.certify(execution_id, user, notes)
    }
}
