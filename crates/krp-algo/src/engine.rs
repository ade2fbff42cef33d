//! Cycle-driven simulation loop.
//!
//! Wires the ledger, the event calendar and the optimizer together. Each
//! iteration applies the completions due at the current cycle, then starts
//! processes one optimizer query at a time (each process at most once per
//! cycle), then jumps to the next completion. In-flight work is drained at
//! the end so the reported final cycle is the last completion time, capped
//! at the cycle budget.

use crate::analysis::Analysis;
use crate::optimizer::Optimizer;
use krp_core::{
    Calendar, Configuration, ExecutionRecord, KrpResult, Ledger, ProcessId, ResourceId,
    ScheduledCompletion, SimulationOutcome, Termination, TraceEntry,
};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Caller-supplied bounds for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_cycles: u64,
    /// Runaway guard for configurations that never go idle.
    pub max_executions: usize,
}

impl RunLimits {
    pub fn new(max_cycles: u64) -> Self {
        Self {
            max_cycles,
            max_executions: 1_000_000,
        }
    }
}

/// One-shot driver for a configuration.
pub struct SimulationEngine<'a> {
    config: &'a Configuration,
    limits: RunLimits,
}

impl<'a> SimulationEngine<'a> {
    pub fn new(config: &'a Configuration, limits: RunLimits) -> Self {
        Self { config, limits }
    }

    pub fn run(&self) -> KrpResult<SimulationOutcome> {
        let started = Instant::now();
        let processes = &self.config.processes;
        let analysis = Analysis::build(
            processes,
            self.config.resources.len(),
            &self.config.targets,
            self.limits.max_cycles,
        );
        let mut optimizer = Optimizer::new(analysis, processes.len());
        let mut ledger = Ledger::new(self.config);
        let mut calendar = Calendar::new();

        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut executions: Vec<ExecutionRecord> = Vec::new();
        let mut cycle: u64 = 0;
        let termination;

        'main: loop {
            if cycle >= self.limits.max_cycles {
                termination = Termination::MaxCyclesReached;
                break;
            }

            for event in calendar.pop_due(cycle) {
                self.apply_completion(&event, &mut ledger, &mut executions);
            }

            // Start work: one optimizer query per start, each process at
            // most once per cycle.
            let mut executed = vec![false; processes.len()];
            loop {
                let available: Vec<ProcessId> = processes
                    .iter()
                    .enumerate()
                    .filter(|(idx, p)| !executed[*idx] && ledger.has(&p.needs))
                    .map(|(idx, _)| ProcessId::new(idx))
                    .collect();
                if available.is_empty() {
                    break;
                }
                let Some(choice) =
                    optimizer.select(processes, ledger.snapshot(), &available, cycle)
                else {
                    break;
                };
                let process = &processes[choice.index()];
                ledger
                    .consume(&process.name, &process.needs, cycle)
                    .map_err(|e| e.at_cycle(cycle))?;
                calendar
                    .schedule(choice, &process.name, cycle, process.delay)
                    .map_err(|e| e.at_cycle(cycle))?;
                optimizer.record_start(choice);
                executed[choice.index()] = true;
                trace.push(TraceEntry {
                    cycle,
                    process: process.name.clone(),
                });
                if trace.len() >= self.limits.max_executions {
                    termination = Termination::ExecutionCapReached;
                    break 'main;
                }
            }

            let any_executable = processes.iter().any(|p| ledger.has(&p.needs));
            if !calendar.has_active() && !any_executable {
                termination = Termination::NoMoreProcesses;
                break;
            }
            match calendar.next_completion() {
                Some(next) => cycle = next.min(self.limits.max_cycles),
                // Executable work exists but the optimizer declined it, and
                // nothing is in flight: stocks can never change again.
                None => {
                    termination = Termination::NoMoreProcesses;
                    break;
                }
            }
        }

        // Drain in-flight completions: production still lands, no new work
        // starts.
        let mut last_completion = cycle;
        while let Some(next) = calendar.next_completion() {
            for event in calendar.pop_due(next) {
                self.apply_completion(&event, &mut ledger, &mut executions);
            }
            last_completion = next;
        }
        let final_cycle = last_completion.min(self.limits.max_cycles);

        let elapsed_ms = started.elapsed().as_millis();
        info!(
            final_cycle,
            executions = trace.len(),
            ?termination,
            elapsed_ms,
            "simulation finished"
        );

        Ok(SimulationOutcome {
            trace,
            executions,
            final_stocks: ledger.as_map(),
            final_cycle,
            termination,
            elapsed_ms,
        })
    }

    fn apply_completion(
        &self,
        event: &ScheduledCompletion,
        ledger: &mut Ledger,
        executions: &mut Vec<ExecutionRecord>,
    ) {
        let process = self.config.process(event.process);
        ledger.produce(&process.results);
        executions.push(ExecutionRecord {
            process: process.name.clone(),
            start_cycle: event.start_cycle,
            end_cycle: event.completion_cycle,
            consumed: self.named_quantities(&process.needs),
            produced: self.named_quantities(&process.results),
        });
    }

    fn named_quantities(&self, pairs: &[(ResourceId, u64)]) -> BTreeMap<String, u64> {
        pairs
            .iter()
            .map(|(r, q)| (self.config.resources.name(*r).to_string(), *q))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::TraceVerifier;
    use krp_io::parse_config_str;

    const CHAIN: &str = "\
euro:10
achat:(euro:1):(widget:1):1
vente:(widget:1):(euro:3):2
optimize:(euro)
";

    const FACTORY: &str = "\
euro:1000
gather:(euro:1):(a:1):1
pack:(a:10):(box:1):2
ship:(box:5):(euro:200):3
optimize:(euro)
";

    fn run(text: &str, max_cycles: u64) -> (krp_core::Configuration, SimulationOutcome) {
        let config = parse_config_str(text).unwrap();
        let outcome = SimulationEngine::new(&config, RunLimits::new(max_cycles))
            .run()
            .unwrap();
        (config, outcome)
    }

    fn count(outcome: &SimulationOutcome, process: &str) -> usize {
        outcome
            .trace
            .iter()
            .filter(|e| e.process == process)
            .count()
    }

    #[test]
    fn test_trivial_chain_turns_a_profit() {
        let (_, outcome) = run(CHAIN, 100);
        assert!(outcome.final_stocks["euro"] >= 20);
        // The widget bought on the last cycle may still be in stock.
        assert!(outcome.final_stocks["widget"] <= 1);
        assert!(count(&outcome, "vente") >= 5);
        assert!(outcome.final_cycle <= 100);
    }

    #[test]
    fn test_gated_bulk_pipeline_ships() {
        // The float must clear the 500-euro reserve gather holds back, or
        // the pipeline starves its own gatherer before the first shipment.
        let (_, outcome) = run(FACTORY, 500);
        assert!(count(&outcome, "ship") >= 5);
        assert!(outcome.final_stocks["euro"] > 1000);
    }

    #[test]
    fn test_conversion_loop_trap_stays_sterile() {
        let with_loop = "\
euro:10
achat:(euro:1):(widget:1):1
vente:(widget:1):(euro:3):2
split:(a:2):(a1:1;a2:1):1
merge:(a1:1;a2:1):(a:2):1
optimize:(euro)
";
        let (_, base) = run(CHAIN, 100);
        let (_, looped) = run(with_loop, 100);
        assert!(count(&looped, "split") <= 2);
        assert!(count(&looped, "merge") <= 2);
        assert!(looped.final_stocks["euro"] >= base.final_stocks["euro"]);
    }

    #[test]
    fn test_deadlock_terminates_cleanly() {
        let text = "\
wood:3
make:(wood:2):(chair:1):1
optimize:(chair)
";
        let (_, outcome) = run(text, 50);
        assert_eq!(outcome.termination, Termination::NoMoreProcesses);
        assert_eq!(count(&outcome, "make"), 1);
        assert_eq!(outcome.final_stocks["chair"], 1);
        assert_eq!(outcome.final_stocks["wood"], 1);
        assert_eq!(outcome.final_cycle, 1);
    }

    #[test]
    fn test_timeout_caps_final_cycle() {
        let (_, outcome) = run(CHAIN, 3);
        assert_eq!(outcome.termination, Termination::MaxCyclesReached);
        assert!(outcome.trace.iter().all(|e| e.cycle < 3));
        assert_eq!(outcome.final_cycle, 3);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let (_, first) = run(FACTORY, 500);
        let (_, second) = run(FACTORY, 500);
        assert_eq!(first.trace, second.trace);
        assert_eq!(first.final_stocks, second.final_stocks);
        assert_eq!(first.final_cycle, second.final_cycle);
    }

    #[test]
    fn test_emitted_trace_replays_cleanly() {
        for (text, budget) in [(CHAIN, 100), (FACTORY, 500), (CHAIN, 3)] {
            let (config, outcome) = run(text, budget);
            let verifier = TraceVerifier::new(&config);
            let result = verifier.verify(&outcome.trace, outcome.final_cycle);
            assert!(
                result.is_valid(),
                "trace rejected for budget {budget}: {}",
                result.describe()
            );
            match result {
                krp_core::VerificationOutcome::Valid { final_cycle, .. } => {
                    assert_eq!(final_cycle, outcome.final_cycle)
                }
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn test_conservation_per_execution() {
        let (config, outcome) = run(CHAIN, 100);
        for record in &outcome.executions {
            let id = config.process_by_name(&record.process).unwrap();
            let process = config.process(id);
            assert_eq!(record.consumed.len(), process.needs.len());
            for (resource, quantity) in &process.needs {
                let name = config.resources.name(*resource);
                assert_eq!(record.consumed[name], *quantity);
            }
            for (resource, quantity) in &process.results {
                let name = config.resources.name(*resource);
                assert_eq!(record.produced[name], *quantity);
            }
            assert_eq!(record.end_cycle, record.start_cycle + process.delay);
        }
    }

    #[test]
    fn test_delay_one_completes_next_cycle() {
        let text = "\
seed:1
grow:(seed:1):(tree:1):1
optimize:(tree)
";
        let (_, outcome) = run(text, 10);
        assert_eq!(outcome.executions.len(), 1);
        assert_eq!(outcome.executions[0].start_cycle, 0);
        assert_eq!(outcome.executions[0].end_cycle, 1);
        assert_eq!(outcome.final_cycle, 1);
    }

    #[test]
    fn test_execution_cap_halts_runaway() {
        let text = "\
spark:0
spawn:():(spark:1):1
optimize:(spark)
";
        let config = parse_config_str(text).unwrap();
        let limits = RunLimits {
            max_cycles: 1_000_000,
            max_executions: 50,
        };
        let outcome = SimulationEngine::new(&config, limits).run().unwrap();
        assert_eq!(outcome.termination, Termination::ExecutionCapReached);
        assert_eq!(outcome.trace.len(), 50);
    }
}
