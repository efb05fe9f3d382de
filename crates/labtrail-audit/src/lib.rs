//! # labtrail-audit
//!
//! Immutable, append-only, SHA-256 hash-chained audit ledger for labtrail.
//!
//! ## Overview
//!
//! Every audited mutation becomes an `AuditRecord` whose signature commits to
//! its content and to the signature of the previous record of the same
//! entity type. Modifying a stored record changes its re-derived signature,
//! which `ChainVerifier` detects.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labtrail_audit::{ChainVerifier, InMemoryLedger};
//! use labtrail_core::SystemClock;
//!
//! let ledger = Arc::new(InMemoryLedger::new(Arc::new(SystemClock)));
//! ledger.append(entry)?;
//!
//! let check = ChainVerifier::new(ledger.clone()).verify("Sample")?;
//! assert!(check.is_valid);
//! ```

pub mod chain;
pub mod journal;
pub mod memory;
pub mod verifier;

pub use chain::{calculate_signature, canonical_json, expected_signature, ChainFault};
pub use journal::JournalLedger;
pub use memory::InMemoryLedger;
pub use verifier::ChainVerifier;

use std::sync::Arc;

use labtrail_contracts::error::LabtrailResult;
use labtrail_core::{traits::{AuditLedger, Clock}, LabtrailConfig};

/// Build the ledger the configuration asks for: a journal when
/// `ledger.journal_path` is set, otherwise in memory.
pub fn ledger_from_config(
    config: &LabtrailConfig,
    clock: Arc<dyn Clock>,
) -> LabtrailResult<Arc<dyn AuditLedger>> {
    match &config.ledger.journal_path {
        Some(path) => Ok(Arc::new(JournalLedger::open(path, clock)?)),
        None => Ok(Arc::new(InMemoryLedger::new(clock))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
