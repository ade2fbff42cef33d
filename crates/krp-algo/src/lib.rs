//! # krp-algo: Scheduling kernel
//!
//! The cycle-driven simulation loop and the heuristic optimizer that, at
//! every decision point, chooses which executable process to start next.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`analysis`] | One-shot static analysis of the process set |
//! | [`optimizer`] | Phase machine, bottleneck pass and score pipeline |
//! | [`engine`] | The simulation driver wiring ledger + calendar + optimizer |
//! | [`verifier`] | Trace replay against a configuration |
//!
//! The optimizer is deliberately split in two: [`analysis::Analysis`] holds
//! everything derivable from the process list alone (high-value set, value
//! chain, depths, bulk targets, reserves) and never changes after
//! construction; [`optimizer::Optimizer`] holds the per-run state (phase,
//! fatigue counters, the cash-flow latch) on top of it.

pub mod analysis;
pub mod engine;
pub mod optimizer;
pub mod verifier;

pub use analysis::Analysis;
pub use engine::{RunLimits, SimulationEngine};
pub use optimizer::{Optimizer, Phase};
pub use verifier::TraceVerifier;
