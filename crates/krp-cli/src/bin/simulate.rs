//! `simulate`: run the scheduler over a configuration and emit a trace.

use anyhow::{Context, Result};
use clap::Parser;
use krp_algo::{RunLimits, SimulationEngine};
use krp_cli::{init_logging, require_extension};
use krp_io::report;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Simulate a process schedule maximizing the optimize directive"
)]
struct Cli {
    /// Path to the .krpsim configuration file
    config: PathBuf,

    /// Cycle budget for the run
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    max_cycles: u64,

    /// Output path for the machine-readable trace
    #[arg(short, long, default_value = "result_set.txt")]
    out: PathBuf,

    /// Set the logging level
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    require_extension(&cli.config, "krpsim")?;

    let config = krp_io::parse_config_file(&cli.config)
        .with_context(|| format!("reading configuration '{}'", cli.config.display()))?;
    println!("{}", report::banner(&config));

    let engine = SimulationEngine::new(&config, RunLimits::new(cli.max_cycles));
    let outcome = engine.run()?;

    for entry in &outcome.trace {
        println!("{entry}");
    }
    println!("{}", report::termination_line(&outcome));
    println!("{}", report::stock_block(&outcome.final_stocks));

    krp_io::write_trace_file(&cli.out, &outcome.trace, outcome.final_cycle)
        .with_context(|| format!("writing trace '{}'", cli.out.display()))?;
    Ok(())
}
