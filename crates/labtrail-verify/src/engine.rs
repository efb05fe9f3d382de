//! Schema-based extraction validator.
//!
//! `SchemaValidator` implements `ExtractionValidator` from `labtrail-core`.
//! Validation runs in two phases:
//!
//! 1. **Structural**: the payload is validated against a JSON Schema document
//!    using the `jsonschema` crate.
//! 2. **Semantic**: every registered rule is evaluated in order. Rules cover
//!    what JSON Schema cannot express cleanly, such as ISO-8601 parsing or
//!    "not blank after trimming".
//!
//! All violations from both phases are collected before returning, so the
//! reviewer sees the whole picture in one pass.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, warn};

use labtrail_contracts::{
    error::{LabtrailError, LabtrailResult},
    validation::{FieldViolation, ValidatedData, ValidationFailure},
};
use labtrail_core::traits::ExtractionValidator;

use crate::schema::{batch_extraction_schema, BATCH_EXTRACTION_SCHEMA_ID};

/// A semantic check. Returns every violation it finds, empty on success.
pub type CustomRuleFn = Box<dyn Fn(&Value) -> Vec<FieldViolation> + Send + Sync>;

pub struct SchemaValidator {
    schema_id: String,
    validator: jsonschema::Validator,
    rules: Vec<(String, CustomRuleFn)>,
}

impl SchemaValidator {
    /// Compile `schema` under `schema_id` with no semantic rules.
    ///
    /// Returns `LabtrailError::ConfigError` if the schema document is invalid.
    pub fn from_schema(schema_id: impl Into<String>, schema: &Value) -> LabtrailResult<Self> {
        let schema_id = schema_id.into();
        let validator = jsonschema::validator_for(schema).map_err(|e| LabtrailError::ConfigError {
            reason: format!("invalid JSON Schema document '{}': {}", schema_id, e),
        })?;
        Ok(Self {
            schema_id,
            validator,
            rules: Vec::new(),
        })
    }

    /// The batch extraction validator with its date and blank-string rules.
    pub fn batch_extraction() -> LabtrailResult<Self> {
        let mut validator = Self::from_schema(BATCH_EXTRACTION_SCHEMA_ID, &batch_extraction_schema())?;
        validator.register_rule("iso-dates", Box::new(check_iso_dates));
        validator.register_rule("non-blank-identifiers", Box::new(check_non_blank));
        Ok(validator)
    }

    /// Append a semantic rule. Rules run in registration order.
    pub fn register_rule(&mut self, name: impl Into<String>, rule: CustomRuleFn) {
        self.rules.push((name.into(), rule));
    }
}

impl ExtractionValidator for SchemaValidator {
    fn schema_id(&self) -> &str {
        &self.schema_id
    }

    fn validate(&self, payload: &Value) -> Result<ValidatedData, ValidationFailure> {
        let mut violations: Vec<FieldViolation> = Vec::new();

        // ── Phase 1: JSON Schema structural validation ────────────────────────
        for error in self.validator.iter_errors(payload) {
            let path = error.instance_path.to_string();
            let violation = FieldViolation {
                path: if path.is_empty() { "/".to_string() } else { path },
                message: error.to_string(),
            };
            warn!(
                schema_id = %self.schema_id,
                path = %violation.path,
                message = %violation.message,
                "structural validation failure"
            );
            violations.push(violation);
        }

        // ── Phase 2: Semantic rules ───────────────────────────────────────────
        for (name, rule) in &self.rules {
            let found = rule(payload);
            if !found.is_empty() {
                warn!(rule = %name, count = found.len(), "semantic rule failed");
            }
            violations.extend(found);
        }

        debug!(
            schema_id = %self.schema_id,
            passed = violations.is_empty(),
            violation_count = violations.len(),
            "extraction validation complete"
        );

        if !violations.is_empty() {
            return Err(ValidationFailure {
                schema_id: self.schema_id.clone(),
                violations,
            });
        }

        Ok(ValidatedData {
            schema_id: self.schema_id.clone(),
            payload: payload.clone(),
            equipment_count: record_count(payload, "equipment_records"),
            sample_count: record_count(payload, "sample_records"),
        })
    }
}

// ── Built-in semantic rules ───────────────────────────────────────────────────

fn record_count(payload: &Value, key: &str) -> usize {
    payload.get(key).and_then(Value::as_array).map_or(0, Vec::len)
}

fn records<'v>(payload: &'v Value, key: &str) -> impl Iterator<Item = (usize, &'v Value)> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
}

/// Accepts `YYYY-MM-DD`, RFC 3339, and naive date-times with `T` or a space.
pub fn is_iso_datetime(value: &str) -> bool {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok()
}

fn check_iso_dates(payload: &Value) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    let mut check = |collection: &str, idx: usize, record: &Value, field: &str| {
        if let Some(text) = record.get(field).and_then(Value::as_str) {
            if !is_iso_datetime(text) {
                violations.push(FieldViolation {
                    path: format!("/{collection}/{idx}/{field}"),
                    message: format!("invalid date format: {text}. Use ISO 8601 (YYYY-MM-DD)"),
                });
            }
        }
    };

    for (idx, record) in records(payload, "equipment_records") {
        check("equipment_records", idx, record, "purchase_date");
        check("equipment_records", idx, record, "last_maintenance");
    }
    for (idx, record) in records(payload, "sample_records") {
        check("sample_records", idx, record, "collected_at");
    }
    violations
}

fn check_non_blank(payload: &Value) -> Vec<FieldViolation> {
    const REQUIRED: [(&str, &[&str]); 2] = [
        ("equipment_records", &["equipment_id", "equipment_name", "location"]),
        ("sample_records", &["sample_id", "sample_name"]),
    ];

    let mut violations = Vec::new();
    for (collection, fields) in REQUIRED {
        for (idx, record) in records(payload, collection) {
            for field in fields {
                let blank = record
                    .get(*field)
                    .and_then(Value::as_str)
                    .is_some_and(|text| !text.is_empty() && text.trim().is_empty());
                if blank {
                    violations.push(FieldViolation {
                        path: format!("/{collection}/{idx}/{field}"),
                        message: "must not be blank".to_string(),
                    });
                }
            }
        }
    }
    violations
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use labtrail_core::traits::ExtractionValidator;

    use super::{is_iso_datetime, SchemaValidator};
    use labtrail_contracts::validation::FieldViolation;

    // ── Builder helpers ───────────────────────────────────────────────────────

    fn validator() -> SchemaValidator {
        SchemaValidator::batch_extraction().unwrap()
    }

    fn sample() -> serde_json::Value {
        json!({
            "sample_id": "S-1001",
            "sample_name": "Plasma aliquot 1",
            "sample_type": "plasma",
            "collected_at": "2024-03-01T08:30:00+00:00",
            "storage_temperature": -80,
            "quantity": 1.5,
            "quantity_unit": "ml",
            "notes": ""
        })
    }

    fn equipment() -> serde_json::Value {
        json!({
            "equipment_id": "EQ-7",
            "equipment_name": "NanoDrop One",
            "equipment_type": "spectrophotometer",
            "location": "Bench 3",
            "purchase_date": "2021-06-14",
            "status": "operational"
        })
    }

    fn paths(violations: &[FieldViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    // ── Passing payloads ──────────────────────────────────────────────────────

    #[test]
    fn test_valid_batch_passes() {
        let payload = json!({
            "equipment_records": [equipment()],
            "sample_records": [sample(), sample()],
            "extraction_warnings": ["skipped row 42: invalid type"]
        });

        let data = validator().validate(&payload).unwrap();
        assert_eq!(data.schema_id, "batch-extraction-v1");
        assert_eq!(data.equipment_count, 1);
        assert_eq!(data.sample_count, 2);
    }

    #[test]
    fn test_empty_batch_passes() {
        let data = validator().validate(&json!({})).unwrap();
        assert_eq!(data.sample_count, 0);
    }

    // ── Structural failures ───────────────────────────────────────────────────

    #[test]
    fn test_extra_fields_rejected() {
        let mut record = sample();
        record["hallucinated_field"] = json!("made up");

        let failure = validator()
            .validate(&json!({ "sample_records": [record] }))
            .unwrap_err();
        assert!(
            paths(&failure.violations).contains(&"/sample_records/0"),
            "unknown property must be reported on the record: {:?}",
            failure.violations
        );
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let failure = validator().validate(&json!({ "patients": [] })).unwrap_err();
        assert_eq!(failure.violations.len(), 1);
        assert_eq!(failure.violations[0].path, "/");
    }

    #[test]
    fn test_enum_and_range_violations_collected() {
        let mut record = sample();
        record["sample_type"] = json!("saliva");
        record["storage_temperature"] = json!(-200);
        record["quantity"] = json!(0);

        let failure = validator()
            .validate(&json!({ "sample_records": [record] }))
            .unwrap_err();
        let found = paths(&failure.violations);
        for expected in [
            "/sample_records/0/sample_type",
            "/sample_records/0/storage_temperature",
            "/sample_records/0/quantity",
        ] {
            assert!(found.contains(&expected), "missing {expected} in {found:?}");
        }
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut record = equipment();
        record.as_object_mut().unwrap().remove("location");

        let failure = validator()
            .validate(&json!({ "equipment_records": [record] }))
            .unwrap_err();
        assert!(failure.describe().contains("location"));
    }

    // ── Semantic failures ─────────────────────────────────────────────────────

    #[test]
    fn test_bad_dates_rejected() {
        let mut eq = equipment();
        eq["last_maintenance"] = json!("last tuesday");
        let mut s = sample();
        s["collected_at"] = json!("03/01/2024");

        let failure = validator()
            .validate(&json!({ "equipment_records": [eq], "sample_records": [s] }))
            .unwrap_err();
        assert_eq!(
            paths(&failure.violations),
            vec!["/equipment_records/0/last_maintenance", "/sample_records/0/collected_at"]
        );
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let mut s = sample();
        s["sample_name"] = json!("   ");

        let failure = validator()
            .validate(&json!({ "sample_records": [s] }))
            .unwrap_err();
        assert_eq!(paths(&failure.violations), vec!["/sample_records/0/sample_name"]);
    }

    #[test]
    fn test_custom_rule_runs_after_schema() {
        let mut validator = validator();
        validator.register_rule(
            "no-duplicate-sample-ids",
            Box::new(|payload| {
                let ids: Vec<&str> = payload["sample_records"]
                    .as_array()
                    .map(|records| records.iter().filter_map(|r| r["sample_id"].as_str()).collect())
                    .unwrap_or_default();
                let mut unique = ids.clone();
                unique.sort();
                unique.dedup();
                if unique.len() == ids.len() {
                    vec![]
                } else {
                    vec![FieldViolation {
                        path: "/sample_records".to_string(),
                        message: "duplicate sample_id".to_string(),
                    }]
                }
            }),
        );

        let failure = validator
            .validate(&json!({ "sample_records": [sample(), sample()] }))
            .unwrap_err();
        assert_eq!(failure.violations[0].message, "duplicate sample_id");
    }

    #[test]
    fn test_iso_datetime_forms() {
        assert!(is_iso_datetime("2024-03-01"));
        assert!(is_iso_datetime("2024-03-01T08:30:00"));
        assert!(is_iso_datetime("2024-03-01T08:30:00Z"));
        assert!(is_iso_datetime("2024-03-01 08:30:00.123"));
        assert!(!is_iso_datetime("2024-13-01"));
        assert!(!is_iso_datetime("yesterday"));
    }
}
