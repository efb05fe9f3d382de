//! Runtime configuration loaded from TOML.
//!
//! Every section and field has a default, so an empty document is a valid
//! configuration:
//!
//! ```toml
//! [ledger]
//! journal_path = "var/audit.jsonl"      # omit for an in-memory ledger
//!
//! [verification]
//! tenant_scope = "global-sequence"      # or "per-entity-type"
//!
//! [reporting]
//! preferred_format = "pdf"              # or "text"
//! regulatory_standard = "21 CFR Part 11"
//! blob_prefix = "certified_reports"
//!
//! [parsing]
//! confidence_threshold = 0.7
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    integrity::VerificationScope,
    report::DocumentFormat,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-lines journal file. `None` keeps the ledger in memory.
    pub journal_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub tenant_scope: VerificationScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub preferred_format: DocumentFormat,
    pub regulatory_standard: String,
    pub blob_prefix: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            preferred_format: DocumentFormat::Pdf,
            regulatory_standard: "21 CFR Part 11".to_string(),
            blob_prefix: "certified_reports".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Fields extracted with confidence below this are flagged for review.
    pub confidence_threshold: f64,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabtrailConfig {
    pub ledger: LedgerConfig,
    pub verification: VerificationConfig,
    pub reporting: ReportingConfig,
    pub parsing: ParsingConfig,
}

impl LabtrailConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `LabtrailError::ConfigError` if the TOML is malformed, does not
    /// match the schema, or holds out-of-range values.
    pub fn from_toml_str(s: &str) -> LabtrailResult<Self> {
        let config: LabtrailConfig = toml::from_str(s).map_err(|e| LabtrailError::ConfigError {
            reason: format!("failed to parse labtrail TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as configuration.
    pub fn from_file(path: &Path) -> LabtrailResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LabtrailError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> LabtrailResult<()> {
        let threshold = self.parsing.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LabtrailError::ConfigError {
                reason: format!("parsing.confidence_threshold must be within 0..=1, got {threshold}"),
            });
        }
        if self.reporting.blob_prefix.trim().is_empty() {
            return Err(LabtrailError::ConfigError {
                reason: "reporting.blob_prefix must not be empty".to_string(),
            });
        }
        if self.reporting.regulatory_standard.trim().is_empty() {
            return Err(LabtrailError::ConfigError {
                reason: "reporting.regulatory_standard must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = LabtrailConfig::from_toml_str("").unwrap();
        assert_eq!(config, LabtrailConfig::default());
        assert_eq!(config.verification.tenant_scope, VerificationScope::GlobalSequence);
        assert_eq!(config.reporting.regulatory_standard, "21 CFR Part 11");
        assert!(config.ledger.journal_path.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = LabtrailConfig::from_toml_str(
            r#"
            [ledger]
            journal_path = "/var/lib/labtrail/audit.jsonl"

            [verification]
            tenant_scope = "per-entity-type"

            [reporting]
            preferred_format = "text"

            [parsing]
            confidence_threshold = 0.85
            "#,
        )
        .unwrap();

        assert_eq!(
            config.ledger.journal_path.as_deref(),
            Some(Path::new("/var/lib/labtrail/audit.jsonl"))
        );
        assert_eq!(config.verification.tenant_scope, VerificationScope::PerEntityType);
        assert_eq!(config.reporting.preferred_format, DocumentFormat::Text);
        assert_eq!(config.reporting.blob_prefix, "certified_reports");
        assert!((config.parsing.confidence_threshold - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_scope_is_a_config_error() {
        let err = LabtrailConfig::from_toml_str("[verification]\ntenant_scope = \"sideways\"")
            .unwrap_err();
        assert!(matches!(err, LabtrailError::ConfigError { .. }), "got {err:?}");
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = LabtrailConfig::from_toml_str("[parsing]\nconfidence_threshold = 1.5").unwrap_err();
        assert!(err.to_string().contains("confidence_threshold"));
    }

    #[test]
    fn from_file_reads_and_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reporting]\nblob_prefix = \"exports\"").unwrap();

        let config = LabtrailConfig::from_file(file.path()).unwrap();
        assert_eq!(config.reporting.blob_prefix, "exports");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = LabtrailConfig::from_file(Path::new("/nonexistent/labtrail.toml")).unwrap_err();
        assert!(matches!(err, LabtrailError::ConfigError { .. }));
    }
}
