//! # krp-core: Data model for resource-transformation scheduling
//!
//! Provides the shared building blocks of the krp toolchain:
//!
//! - [`model`] - interned identifiers, process definitions, configurations,
//!   trace entries and run results
//! - [`ledger`] - the mutable stock table with all-or-nothing consumption
//! - [`calendar`] - the FIFO-stable priority queue of in-flight completions
//! - [`error`] - the unified [`KrpError`] type
//!
//! ## Design
//!
//! Resource and process names are interned to dense integer ids at parse
//! time ([`ResourceTable`]); everything downstream of the parser works on
//! `Vec`s indexed by [`ResourceId`] / [`ProcessId`]. Quantities and cycles
//! are `u64`, so negative stock is unrepresentable and non-negativity only
//! has to be enforced at the single consume seam.

pub mod calendar;
pub mod error;
pub mod ledger;
pub mod model;

pub use calendar::{Calendar, ScheduledCompletion};
pub use error::{KrpError, KrpResult};
pub use ledger::Ledger;
pub use model::{
    Configuration, ExecutionRecord, Process, ProcessId, ResourceId, ResourceTable,
    SimulationOutcome, Termination, TraceEntry, VerificationOutcome,
};
