//! Core data model: interned identifiers, processes, configurations and
//! run results.
//!
//! Resource and process names are interned into dense integer ids at parse
//! time so that every hot-path table (stocks, analysis arrays, executed
//! sets) is a plain `Vec` indexed by id rather than a string-keyed map.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Dense id of an interned resource name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ResourceId(usize);

impl ResourceId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Dense id of a process, its position in the configuration's process list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ProcessId(usize);

impl ProcessId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Interner mapping resource names to dense [`ResourceId`]s.
///
/// Ids are assigned in first-mention order, which is also the iteration
/// order of every dense table derived from them. This is what makes the
/// simulator and verifier agree on scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTable {
    names: Vec<String>,
    by_name: HashMap<String, ResourceId>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, interning it if unseen.
    pub fn intern(&mut self, name: &str) -> ResourceId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = ResourceId::new(self.names.len());
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<ResourceId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: ResourceId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All ids in interning order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> {
        (0..self.names.len()).map(ResourceId::new)
    }
}

/// An immutable process definition: what it consumes, what it produces,
/// and how many cycles it takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    pub needs: Vec<(ResourceId, u64)>,
    pub results: Vec<(ResourceId, u64)>,
    pub delay: u64,
}

impl Process {
    /// Quantity of `resource` consumed, 0 if not an input.
    pub fn needs_quantity(&self, resource: ResourceId) -> u64 {
        self.needs
            .iter()
            .find(|(r, _)| *r == resource)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    /// Quantity of `resource` produced, 0 if not an output.
    pub fn results_quantity(&self, resource: ResourceId) -> u64 {
        self.results
            .iter()
            .find(|(r, _)| *r == resource)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    pub fn consumes(&self, resource: ResourceId) -> bool {
        self.needs.iter().any(|(r, _)| *r == resource)
    }

    pub fn produces(&self, resource: ResourceId) -> bool {
        self.results.iter().any(|(r, _)| *r == resource)
    }

    pub fn total_needs(&self) -> u64 {
        self.needs.iter().map(|(_, q)| q).sum()
    }

    pub fn total_results(&self) -> u64 {
        self.results.iter().map(|(_, q)| q).sum()
    }

    /// Check whether `stocks` (dense, indexed by resource id) covers the needs.
    pub fn can_run(&self, stocks: &[u64]) -> bool {
        self.needs.iter().all(|(r, q)| stocks[r.index()] >= *q)
    }
}

/// A parsed configuration: initial stocks, process list and optimization
/// directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub resources: ResourceTable,
    /// Initial stock per resource, dense by [`ResourceId`]. Resources first
    /// mentioned by a process are present with quantity 0.
    pub initial_stocks: Vec<u64>,
    pub processes: Vec<Process>,
    /// Stock targets of the `optimize:` directive, in declaration order.
    /// The `time` sentinel is recorded separately.
    pub targets: Vec<ResourceId>,
    pub optimize_time: bool,
}

impl Configuration {
    pub fn process(&self, id: ProcessId) -> &Process {
        &self.processes[id.index()]
    }

    pub fn process_by_name(&self, name: &str) -> Option<ProcessId> {
        self.processes
            .iter()
            .position(|p| p.name == name)
            .map(ProcessId::new)
    }

    /// Total number of optimization targets, the `time` sentinel included.
    pub fn target_count(&self) -> usize {
        self.targets.len() + usize::from(self.optimize_time)
    }
}

/// One `cycle:process` line of a trace, in start order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub cycle: u64,
    pub process: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cycle, self.process)
    }
}

/// Record of one completed execution, with the resource movements it caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub process: String,
    pub start_cycle: u64,
    pub end_cycle: u64,
    pub consumed: BTreeMap<String, u64>,
    pub produced: BTreeMap<String, u64>,
}

/// Why a simulation run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    MaxCyclesReached,
    NoMoreProcesses,
    ExecutionCapReached,
}

/// Complete result of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutcome {
    /// Started processes in start order; this is the machine trace.
    pub trace: Vec<TraceEntry>,
    /// Completion records in completion order.
    pub executions: Vec<ExecutionRecord>,
    pub final_stocks: BTreeMap<String, u64>,
    pub final_cycle: u64,
    pub termination: Termination,
    /// Wall-clock duration of the run, for the log summary.
    pub elapsed_ms: u128,
}

impl SimulationOutcome {
    pub fn total_executions(&self) -> usize {
        self.trace.len()
    }
}

/// Result of replaying a trace against a configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VerificationOutcome {
    Valid {
        final_stocks: BTreeMap<String, u64>,
        final_cycle: u64,
    },
    Invalid {
        cycle: Option<u64>,
        process: Option<String>,
        message: String,
    },
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid { .. })
    }

    /// Human-readable description of a failed verification.
    pub fn describe(&self) -> String {
        match self {
            VerificationOutcome::Valid { .. } => "Verification successful".to_string(),
            VerificationOutcome::Invalid {
                cycle,
                process,
                message,
            } => {
                let mut parts = Vec::new();
                if let Some(cycle) = cycle {
                    parts.push(format!("Cycle {cycle}"));
                }
                if let Some(process) = process {
                    parts.push(format!("Process '{process}'"));
                }
                parts.push(message.clone());
                format!("Error: {}", parts.join(", "))
            }
        }
    }
}
