//! The batch extraction schema.
//!
//! This is exactly what an AI extraction is allowed to contain. Unknown
//! properties are rejected at every level.

use serde_json::{json, Value};

/// Identifier recorded with every validation result.
pub const BATCH_EXTRACTION_SCHEMA_ID: &str = "batch-extraction-v1";

/// Upper bound on records of each kind in one extraction.
pub const MAX_RECORDS: usize = 1000;

pub const EQUIPMENT_TYPES: [&str; 7] = [
    "centrifuge",
    "spectrophotometer",
    "incubator",
    "microscope",
    "pcr_machine",
    "freezer",
    "other",
];

pub const EQUIPMENT_STATUSES: [&str; 4] = ["operational", "maintenance", "broken", "decommissioned"];

pub const EXTRACTED_SAMPLE_TYPES: [&str; 8] =
    ["blood", "plasma", "serum", "urine", "tissue", "dna", "rna", "other"];

pub const QUANTITY_UNITS: [&str; 5] = ["ml", "mg", "µl", "g", "other"];

fn bounded_string(min: usize, max: usize) -> Value {
    json!({ "type": "string", "minLength": min, "maxLength": max })
}

fn optional_string(max: usize) -> Value {
    json!({ "type": ["string", "null"], "maxLength": max })
}

fn equipment_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["equipment_id", "equipment_name", "equipment_type", "location"],
        "properties": {
            "equipment_id": bounded_string(1, 100),
            "equipment_name": bounded_string(1, 255),
            "equipment_type": { "type": "string", "enum": EQUIPMENT_TYPES },
            "location": bounded_string(1, 255),
            "serial_number": optional_string(100),
            "purchase_date": { "type": ["string", "null"] },
            "last_maintenance": { "type": ["string", "null"] },
            "status": { "type": "string", "enum": EQUIPMENT_STATUSES },
            "notes": { "type": "string", "maxLength": 1000 }
        }
    })
}

fn sample_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["sample_id", "sample_name", "sample_type", "collected_at"],
        "properties": {
            "sample_id": bounded_string(1, 100),
            "sample_name": bounded_string(1, 255),
            "sample_type": { "type": "string", "enum": EXTRACTED_SAMPLE_TYPES },
            "collected_at": { "type": "string" },
            "collected_by": optional_string(255),
            "storage_temperature": { "type": ["integer", "null"], "minimum": -196, "maximum": 25 },
            "storage_location": optional_string(255),
            "quantity": { "type": ["number", "null"], "exclusiveMinimum": 0 },
            "quantity_unit": {
                "anyOf": [
                    { "type": "null" },
                    { "type": "string", "enum": QUANTITY_UNITS }
                ]
            },
            "notes": { "type": "string", "maxLength": 1000 }
        }
    })
}

/// The JSON Schema document for a batch extraction.
pub fn batch_extraction_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "equipment_records": {
                "type": "array",
                "maxItems": MAX_RECORDS,
                "items": equipment_schema()
            },
            "sample_records": {
                "type": "array",
                "maxItems": MAX_RECORDS,
                "items": sample_schema()
            },
            "extraction_warnings": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}
