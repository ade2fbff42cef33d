//! `verify`: replay a trace against a configuration and validate it.

use anyhow::{Context, Result};
use clap::Parser;
use krp_algo::TraceVerifier;
use krp_cli::{init_logging, require_extension};
use krp_core::VerificationOutcome;
use krp_io::report;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Check that a trace is a lawful execution of a configuration"
)]
struct Cli {
    /// Path to the .krpsim configuration file
    config: PathBuf,

    /// Path to the .txt trace file to validate
    trace: PathBuf,

    /// Set the logging level
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    require_extension(&cli.config, "krpsim")?;
    require_extension(&cli.trace, "txt")?;

    let config = krp_io::parse_config_file(&cli.config)
        .with_context(|| format!("reading configuration '{}'", cli.config.display()))?;

    // Trace-level failures become a structured outcome so the report stays
    // uniform.
    let outcome = match krp_io::parse_trace_file(&cli.trace) {
        Ok((entries, claimed_final)) => {
            TraceVerifier::new(&config).verify(&entries, claimed_final)
        }
        Err(err) => VerificationOutcome::Invalid {
            cycle: None,
            process: None,
            message: err.to_string(),
        },
    };

    println!("{}", report::verification_report(&outcome));
    if outcome.is_valid() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
