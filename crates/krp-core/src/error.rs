//! Unified error types for the krp ecosystem
//!
//! This module provides the common error type [`KrpError`] shared by the
//! parser, the resource ledger, the event calendar and the simulation
//! engine, so failures can be handled uniformly at API boundaries.

use thiserror::Error;

/// Unified error type for all krp operations.
///
/// Every variant carries the location information its producer knows about:
/// configuration and trace errors are located by line, runtime errors by
/// cycle and process.
#[derive(Error, Debug)]
pub enum KrpError {
    /// Configuration file errors (parse or schema), located by line
    #[error("Configuration error at line {line}: {message}")]
    Configuration { line: usize, message: String },

    /// A consume attempt would underflow a stock
    #[error(
        "Insufficient resources at cycle {cycle}: process '{process}' needs \
         {required} '{resource}', have {available}"
    )]
    InsufficientResources {
        cycle: u64,
        process: String,
        resource: String,
        required: u64,
        available: u64,
    },

    /// An invalid process was handed to the event calendar
    #[error("Scheduling error at cycle {cycle} for process '{process}': {message}")]
    Scheduling {
        cycle: u64,
        process: String,
        message: String,
    },

    /// Trace file errors (malformed entries), located by line
    #[error("Trace error at line {line}: {message}")]
    Trace { line: usize, message: String },

    /// Any of the above surfacing inside the simulation loop
    #[error("Simulation error at cycle {cycle}: {source}")]
    Simulation {
        cycle: u64,
        #[source]
        source: Box<KrpError>,
    },

    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KrpError {
    /// Wrap this error with the simulation cycle it surfaced at.
    pub fn at_cycle(self, cycle: u64) -> KrpError {
        KrpError::Simulation {
            cycle,
            source: Box::new(self),
        }
    }
}

/// Convenience type alias for Results using KrpError.
pub type KrpResult<T> = Result<T, KrpError>;
