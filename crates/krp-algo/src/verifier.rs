//! Trace verifier: replays a trace against a configuration.
//!
//! Shares the ledger and the calendar with the simulator, including the
//! FIFO tie-break for same-cycle completions, so both sides agree on every
//! ordering. All failures become a structured [`VerificationOutcome`]
//! rather than an error, so the CLI wrapper can always print a clean
//! diagnostic.

use krp_core::{Calendar, Configuration, Ledger, TraceEntry, VerificationOutcome};

/// Replays traces against one configuration.
pub struct TraceVerifier<'a> {
    config: &'a Configuration,
}

impl<'a> TraceVerifier<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    /// Replay `entries` and check the claimed final cycle.
    ///
    /// Work still in flight when the claimed final cycle is reached is
    /// lawful only for a run cut by its cycle budget, which implies the
    /// claimed cycle lies strictly after the last start. Otherwise the
    /// replay must land exactly on the claimed cycle.
    pub fn verify(&self, entries: &[TraceEntry], claimed_final: u64) -> VerificationOutcome {
        let mut ledger = Ledger::new(self.config);
        let mut calendar = Calendar::new();
        let mut current: u64 = 0;

        for entry in entries {
            if entry.cycle < current {
                return VerificationOutcome::Invalid {
                    cycle: Some(entry.cycle),
                    process: Some(entry.process.clone()),
                    message: format!(
                        "entries not in chronological order: cycle {} after cycle {current}",
                        entry.cycle
                    ),
                };
            }
            for event in calendar.pop_due_through(entry.cycle) {
                ledger.produce(&self.config.process(event.process).results);
            }
            current = entry.cycle;

            let Some(id) = self.config.process_by_name(&entry.process) else {
                return VerificationOutcome::Invalid {
                    cycle: Some(entry.cycle),
                    process: Some(entry.process.clone()),
                    message: format!("Unknown process: '{}'", entry.process),
                };
            };
            let process = self.config.process(id);
            for (resource, required) in &process.needs {
                let available = ledger.get(*resource);
                if available < *required {
                    return VerificationOutcome::Invalid {
                        cycle: Some(entry.cycle),
                        process: Some(entry.process.clone()),
                        message: format!(
                            "Insufficient resources: need {required} '{}', have {available}",
                            self.config.resources.name(*resource)
                        ),
                    };
                }
            }
            if let Err(err) = ledger.consume(&process.name, &process.needs, entry.cycle) {
                return VerificationOutcome::Invalid {
                    cycle: Some(entry.cycle),
                    process: Some(entry.process.clone()),
                    message: err.to_string(),
                };
            }
            if let Err(err) = calendar.schedule(id, &process.name, entry.cycle, process.delay) {
                return VerificationOutcome::Invalid {
                    cycle: Some(entry.cycle),
                    process: Some(entry.process.clone()),
                    message: err.to_string(),
                };
            }
        }

        // Complete whatever finishes by the claimed final cycle.
        for event in calendar.pop_due_through(claimed_final) {
            ledger.produce(&self.config.process(event.process).results);
            current = event.completion_cycle;
        }

        if calendar.has_active() {
            let budget_cut = entries.last().is_some_and(|last| claimed_final > last.cycle);
            if !budget_cut {
                return VerificationOutcome::Invalid {
                    cycle: Some(claimed_final),
                    process: None,
                    message: format!(
                        "Final cycle mismatch: work still in flight at cycle {claimed_final}"
                    ),
                };
            }
        } else if current != claimed_final {
            return VerificationOutcome::Invalid {
                cycle: Some(current),
                process: None,
                message: format!(
                    "Final cycle mismatch: expected {claimed_final}, got {current}"
                ),
            };
        }

        VerificationOutcome::Valid {
            final_stocks: ledger.as_map(),
            final_cycle: claimed_final,
        }
    }
}
