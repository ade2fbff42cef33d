//! # krp-io: Configuration and trace I/O
//!
//! Reads `.krpsim` configuration files into [`krp_core::Configuration`],
//! reads and writes the machine trace format, and renders the human output
//! of the `simulate` and `verify` tools.
//!
//! All parse errors are located by 1-based source line and surface as
//! [`krp_core::KrpError`].

pub mod config;
pub mod report;
pub mod trace;

pub use config::{parse_config_file, parse_config_str};
pub use trace::{parse_trace_file, parse_trace_str, render_trace, write_trace_file};
