//! Human-readable output formatting for the two command-line tools.

use krp_core::{Configuration, SimulationOutcome, Termination, VerificationOutcome};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// The start line printed before a simulation run.
pub fn banner(config: &Configuration) -> String {
    format!(
        "Nice file! {} processes, {} stocks, {} to optimize",
        config.processes.len(),
        config.resources.len(),
        config.target_count()
    )
}

/// The line explaining why the run stopped.
pub fn termination_line(outcome: &SimulationOutcome) -> String {
    match outcome.termination {
        Termination::MaxCyclesReached => "Timeout :(".to_string(),
        Termination::NoMoreProcesses => {
            format!("no more process doable at time {}", outcome.final_cycle)
        }
        Termination::ExecutionCapReached => format!(
            "Simulation ended at cycle {}: execution cap reached",
            outcome.final_cycle
        ),
    }
}

/// The final stock block, one `name => qty` line per resource, sorted.
pub fn stock_block(stocks: &BTreeMap<String, u64>) -> String {
    let mut out = String::from("Stock :");
    for (name, qty) in stocks {
        let _ = write!(out, "\n{name} => {qty}");
    }
    out
}

/// The verifier's report: success banner with replayed state, or a located
/// error.
pub fn verification_report(outcome: &VerificationOutcome) -> String {
    match outcome {
        VerificationOutcome::Valid {
            final_stocks,
            final_cycle,
        } => {
            let mut out = String::from("Validation completed :)");
            if !final_stocks.is_empty() {
                out.push_str("\n\nFinal stocks:");
                for (name, qty) in final_stocks {
                    let _ = write!(out, "\n  {name}: {qty}");
                }
            }
            if *final_cycle > 0 {
                let _ = write!(out, "\n\nSimulation completed at cycle: {final_cycle}");
            }
            out
        }
        invalid => invalid.describe(),
    }
}
