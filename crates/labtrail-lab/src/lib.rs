//! # labtrail-lab
//!
//! Laboratory backend for labtrail: samples, protocols, executions and AI
//! extraction review, each mutation recorded in the hash-chained audit
//! ledger, plus certification of completed executions.
//!
//! ## Layout
//!
//! - `store`: tenant-scoped tables behind one lock; the source certified
//!   reports are built from.
//! - `services`: business operations. Each one authorizes the caller,
//!   validates, commits the row and appends its audit record as one unit.
//! - `runtime`: `Lab`, which wires services, ledger, blobs and certifier.
//! - `fixtures` and `scenarios`: fictional seed data and the end-to-end
//!   runs shown by the demo CLI.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let lab = Lab::new(config, Arc::new(lab_policy()?), Arc::new(SystemClock))?;
//! let (_, staff) = seed_tenant(&lab.store, "Northbridge Biobank", "northbridge")?;
//!
//! let execution = lab.executions.start(&staff.technician, protocol.id, None, None)?;
//! let report = lab.certify(&staff.reviewer, execution.id, "ok")?;
//! ```

pub mod fixtures;
pub mod runtime;
pub mod scenarios;
pub mod services;
pub mod store;

#[cfg(test)]
mod testing;

pub use runtime::Lab;
pub use services::{
    ExecutionService, NewProtocol, NewSample, ParsingService, Proposal, ProtocolService, ProtocolUpdate,
    SampleService, SampleUpdate, ServiceContext, Upload,
};
pub use store::LabStore;
