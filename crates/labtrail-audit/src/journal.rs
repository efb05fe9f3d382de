//! JSON-lines journal backend.
//!
//! `JournalLedger` keeps an `InMemoryLedger` as its index and writes every
//! record to an append-only JSONL file before the record becomes visible.
//! Reopening the file hydrates the index with every stored record, verbatim.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use labtrail_contracts::{
    audit::{AuditFootprint, AuditRecord, NewAuditRecord},
    error::{LabtrailError, LabtrailResult},
};
use labtrail_core::traits::{AuditLedger, Clock};

use crate::memory::InMemoryLedger;

/// An `AuditLedger` durably backed by an append-only JSONL file.
pub struct JournalLedger {
    path: PathBuf,
    file: Mutex<File>,
    index: InMemoryLedger,
}

impl JournalLedger {
    /// Open (or create) the journal at `path` and load its records.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> LabtrailResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LabtrailError::Storage {
                    reason: format!("failed to create journal directory '{}': {}", parent.display(), e),
                })?;
            }
        }

        let index = InMemoryLedger::new(clock);
        let loaded = load_records(&path, &index)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LabtrailError::Storage {
                reason: format!("failed to open journal '{}': {}", path.display(), e),
            })?;

        info!(path = %path.display(), records = loaded, "audit journal opened");

        Ok(Self {
            path,
            file: Mutex::new(file),
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory index over the journal's records.
    pub fn index(&self) -> &InMemoryLedger {
        &self.index
    }

    fn write_line(&self, record: &AuditRecord) -> LabtrailResult<()> {
        let json = serde_json::to_string(record).map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("failed to serialize audit record: {}", e),
        })?;

        let mut file = self.file.lock().map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("journal file lock poisoned: {}", e),
        })?;
        writeln!(file, "{}", json).map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("failed to write to journal: {}", e),
        })?;
        file.flush().map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("failed to flush journal: {}", e),
        })?;
        file.sync_data().map_err(|e| LabtrailError::LedgerWrite {
            reason: format!("failed to sync journal: {}", e),
        })
    }
}

fn load_records(path: &Path, index: &InMemoryLedger) -> LabtrailResult<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let file = File::open(path).map_err(|e| LabtrailError::Storage {
        reason: format!("failed to open journal '{}': {}", path.display(), e),
    })?;

    let mut count = 0;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| LabtrailError::Storage {
            reason: format!("failed to read journal line {}: {}", line_no + 1, e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AuditRecord = serde_json::from_str(&line).map_err(|e| LabtrailError::Storage {
            reason: format!("failed to parse journal line {}: {}", line_no + 1, e),
        })?;
        index.import(record)?;
        count += 1;
    }
    Ok(count)
}

impl AuditLedger for JournalLedger {
    fn append(&self, entry: NewAuditRecord) -> LabtrailResult<AuditRecord> {
        self.index.append_with(entry, |record| self.write_line(record))
    }

    fn history_for(&self, entity_type: &str, entity_id: i64) -> LabtrailResult<Vec<AuditRecord>> {
        self.index.history_for(entity_type, entity_id)
    }

    fn chain(&self, entity_type: &str) -> LabtrailResult<Vec<AuditRecord>> {
        self.index.chain(entity_type)
    }

    fn latest_signature(&self, entity_type: &str) -> LabtrailResult<Option<String>> {
        self.index.latest_signature(entity_type)
    }

    fn records_for_users(&self, user_ids: &BTreeSet<i64>) -> LabtrailResult<Vec<AuditRecord>> {
        self.index.records_for_users(user_ids)
    }

    fn count_footprint(&self, footprint: &AuditFootprint) -> LabtrailResult<usize> {
        self.index.count_footprint(footprint)
    }
}
