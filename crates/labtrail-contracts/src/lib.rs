//! # labtrail-contracts
//!
//! Shared types and error definitions for the labtrail compliance backend.
//!
//! Every crate in the workspace imports from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod audit;
pub mod error;
pub mod integrity;
pub mod lab;
pub mod policy;
pub mod report;
pub mod validation;
