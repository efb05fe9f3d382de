//! # labtrail-verify
//!
//! Strict validation of AI extraction payloads.
//!
//! This crate provides [`engine::SchemaValidator`], which implements the
//! [`labtrail_core::traits::ExtractionValidator`] trait. Payloads are checked
//! in two phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate,
//!    with unknown properties rejected everywhere.
//! 2. **Semantic**: ISO-8601 date parsing, non-blank identifiers, and any
//!    rules the host registers.
//!
//! A failing payload is returned as `Err(ValidationFailure)` and routed to
//! human review; nothing is coerced.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use labtrail_verify::SchemaValidator;
//!
//! let validator = SchemaValidator::batch_extraction()?;
//! match validator.validate(&payload) {
//!     Ok(data) => { /* queue for confirmation */ }
//!     Err(failure) => { /* flag for correction */ }
//! }
//! ```

pub mod engine;
pub mod schema;

pub use engine::{is_iso_datetime, CustomRuleFn, SchemaValidator};
pub use schema::{batch_extraction_schema, BATCH_EXTRACTION_SCHEMA_ID};
