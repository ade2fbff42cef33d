//! Heuristic process selection.
//!
//! The optimizer answers one question, once per decision point: of the
//! processes that could start right now, which one should? It combines a
//! coarse phase machine (gather raw input, build intermediates, convert
//! them, sell), a bottleneck pass that funnels effort into whichever
//! value-chain resource is furthest below its stockpile, and a multiplier
//! score pipeline over the remaining candidates.
//!
//! `select` is total: it never fails, returning `None` to let the loop
//! advance time. It is stateful across calls (phase, fatigue counters,
//! cash-flow latch) but deterministic for a given call sequence.

use crate::analysis::Analysis;
use krp_core::{Process, ProcessId};
use tracing::debug;

/// Coarse schedule state; rescales reserves and score multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Gather,
    Build,
    Convert,
    Sell,
}

/// Consecutive empty selections before the cash-flow override latches on.
const STUCK_THRESHOLD: u32 = 3;

/// Stateful selector over one simulation run.
#[derive(Debug)]
pub struct Optimizer {
    analysis: Analysis,
    phase: Phase,
    reached_sell: bool,
    stuck_count: u32,
    cash_flow_mode: bool,
    execution_counts: Vec<u64>,
}

impl Optimizer {
    pub fn new(analysis: Analysis, process_count: usize) -> Self {
        Self {
            analysis,
            phase: Phase::Gather,
            reached_sell: false,
            stuck_count: 0,
            cash_flow_mode: false,
            execution_counts: vec![0; process_count],
        }
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_cash_flow_mode(&self) -> bool {
        self.cash_flow_mode
    }

    /// Inform the optimizer that its last choice was actually started.
    pub fn record_start(&mut self, process: ProcessId) {
        self.execution_counts[process.index()] += 1;
    }

    /// Choose the next process to start, or `None` for "let time advance".
    ///
    /// `available` must only contain processes whose needs are covered by
    /// `stocks`; the returned id is always drawn from it.
    pub fn select(
        &mut self,
        processes: &[Process],
        stocks: &[u64],
        available: &[ProcessId],
        cycle: u64,
    ) -> Option<ProcessId> {
        if available.is_empty() {
            return None;
        }
        if self.analysis.analyzed {
            let next = self.determine_phase(processes, stocks, cycle);
            if next != self.phase {
                debug!(cycle, from = ?self.phase, to = ?next, "phase transition");
                self.phase = next;
            }
        }

        if let Some(choice) = self.pick_bottleneck(processes, stocks, available) {
            return Some(self.confirm(choice));
        }
        if let Some(choice) = self.pick_scored(processes, stocks, available, self.cash_flow_mode) {
            return Some(self.confirm(choice));
        }

        self.stuck_count += 1;
        if self.stuck_count >= STUCK_THRESHOLD && !self.cash_flow_mode {
            self.cash_flow_mode = true;
            debug!(cycle, "no productive selection, entering cash-flow mode");
            if let Some(choice) = self.pick_scored(processes, stocks, available, true) {
                return Some(self.confirm(choice));
            }
        }
        None
    }

    fn confirm(&mut self, choice: ProcessId) -> ProcessId {
        self.stuck_count = 0;
        self.cash_flow_mode = false;
        choice
    }

    fn determine_phase(&mut self, processes: &[Process], stocks: &[u64], cycle: u64) -> Phase {
        let mut phase = self.raw_phase(processes, stocks, cycle);
        // Once selling has begun a transient stock dip may recompute Gather;
        // never fall back that far.
        if self.reached_sell && phase == Phase::Gather {
            phase = Phase::Build;
        }
        if phase == Phase::Sell {
            self.reached_sell = true;
        }
        phase
    }

    fn raw_phase(&self, processes: &[Process], stocks: &[u64], cycle: u64) -> Phase {
        let analysis = &self.analysis;
        if analysis.total_cycles > 0
            && cycle >= (analysis.total_cycles as f64 * 0.7) as u64
        {
            return Phase::Sell;
        }
        let hv_executable = processes
            .iter()
            .enumerate()
            .any(|(idx, p)| analysis.high_value[idx] && p.can_run(stocks));
        if hv_executable {
            return Phase::Sell;
        }

        let chain_stock: u64 = (0..stocks.len())
            .filter(|&r| analysis.value_chain[r] && !analysis.target_mask[r])
            .map(|r| stocks[r])
            .sum();
        let chain_need: u64 = analysis
            .intermediate_needs
            .iter()
            .enumerate()
            .filter(|(idx, _)| analysis.high_value[*idx])
            .filter_map(|(_, needs)| needs.as_ref())
            .flat_map(|needs| needs.iter().map(|(_, q)| q * 10))
            .sum();

        let convert_after = if analysis.total_cycles > 0 {
            (analysis.total_cycles / 10).max(100)
        } else {
            1000
        };
        let build_after = if analysis.total_cycles > 0 {
            (analysis.total_cycles / 20).max(50)
        } else {
            500
        };

        if cycle > convert_after
            || (chain_need > 0 && chain_stock as f64 > chain_need as f64 * 0.2)
        {
            return Phase::Convert;
        }
        if cycle > build_after
            || (chain_need > 0 && chain_stock as f64 > chain_need as f64 * 0.02)
        {
            return Phase::Build;
        }
        Phase::Gather
    }

    /// Reserve actually protected in the current phase: early phases may
    /// spend almost everything, `Sell` protects the full precomputed amount.
    fn effective_reserve(&self, resource: krp_core::ResourceId) -> u64 {
        let factor = match self.phase {
            Phase::Gather => 0.001,
            Phase::Build => 0.1,
            Phase::Convert => 0.5,
            Phase::Sell => 1.0,
        };
        (self.analysis.reserves[resource.index()] as f64 * factor) as u64
    }

    /// Urgency-driven pre-pass: feed starved high-value inputs and
    /// below-bulk value-chain resources before any scoring happens.
    fn pick_bottleneck(
        &self,
        processes: &[Process],
        stocks: &[u64],
        available: &[ProcessId],
    ) -> Option<ProcessId> {
        let analysis = &self.analysis;
        let resource_count = stocks.len();

        // Producers of each resource within the available set.
        let mut producers: Vec<Vec<ProcessId>> = vec![Vec::new(); resource_count];
        for &pid in available {
            for (resource, _) in &processes[pid.index()].results {
                producers[resource.index()].push(pid);
            }
        }

        let mut candidates: Vec<(ProcessId, f64)> = Vec::new();

        // Starved inputs of tracked processes.
        for (idx, needs) in analysis.intermediate_needs.iter().enumerate() {
            let Some(needs) = needs else { continue };
            let buffer = if analysis.high_value[idx] { 100 } else { 50 };
            let base = if analysis.high_value[idx] { 1e6 } else { 5e5 };
            for (resource, quantity) in needs {
                let current = stocks[resource.index()];
                let wanted = quantity * buffer;
                if current < wanted && !producers[resource.index()].is_empty() {
                    let urgency = base + (wanted - current) as f64 * 1000.0;
                    for &pid in &producers[resource.index()] {
                        candidates.push((pid, urgency));
                    }
                }
            }
        }

        // Value-chain resources below their bulk target (or simply scarce).
        for resource in 0..resource_count {
            if !analysis.value_chain[resource] {
                continue;
            }
            let current = stocks[resource];
            let bulk = analysis.bulks[resource];
            if bulk > 0 && current < bulk && !producers[resource].is_empty() {
                let urgency = (bulk - current) as f64 * 1000.0;
                for &pid in &producers[resource] {
                    candidates.push((pid, urgency));
                }
            } else if current < 10 && !producers[resource].is_empty() {
                let urgency = (10 - current) as f64 * 1000.0;
                for &pid in &producers[resource] {
                    candidates.push((pid, urgency));
                }
            }
        }

        // Late phases push hard to keep every high-value input at bulk depth.
        if matches!(self.phase, Phase::Convert | Phase::Sell) {
            for (idx, process) in processes.iter().enumerate() {
                if !analysis.high_value[idx] {
                    continue;
                }
                for (resource, quantity) in &process.needs {
                    let current = stocks[resource.index()];
                    let wanted = quantity * analysis.bulk_multiplier;
                    if current < wanted && !producers[resource.index()].is_empty() {
                        let urgency = 1e7 + (wanted - current) as f64 * 1e4;
                        for &pid in &producers[resource.index()] {
                            candidates.push((pid, urgency));
                        }
                    }
                }
            }
        }

        let mut best: Option<(ProcessId, f64)> = None;
        for (pid, urgency) in candidates {
            if !self.bottleneck_affordable(&processes[pid.index()], stocks) {
                continue;
            }
            if best.map_or(true, |(_, u)| urgency > u) {
                best = Some((pid, urgency));
            }
        }
        best.map(|(pid, _)| pid)
    }

    /// A gathering process outside the gather phase may not dip a target
    /// below its effective reserve just to feed a bottleneck.
    fn bottleneck_affordable(&self, process: &Process, stocks: &[u64]) -> bool {
        if self.phase == Phase::Gather || !self.analysis.is_gathering(process) {
            return true;
        }
        for &target in &self.analysis.targets {
            let consumed = process.needs_quantity(target);
            if consumed == 0 {
                continue;
            }
            let spendable =
                stocks[target.index()] as i128 - self.effective_reserve(target) as i128;
            if spendable < consumed as i128 {
                return false;
            }
        }
        true
    }

    fn pick_scored(
        &self,
        processes: &[Process],
        stocks: &[u64],
        available: &[ProcessId],
        allow_reserve_dip: bool,
    ) -> Option<ProcessId> {
        let mut best: Option<(ProcessId, (bool, i64, f64))> = None;
        for &pid in available {
            let (score, critical, min_depth) =
                self.score_process(processes, stocks, pid.index(), allow_reserve_dip);
            if score <= 0.0 {
                continue;
            }
            // Critical producers first, then shallow depth, then raw score.
            let depth_rank = if min_depth > 0 { -(min_depth as i64) } else { 0 };
            let key = (critical, depth_rank, score);
            if best.as_ref().map_or(true, |(_, k)| better(key, *k)) {
                best = Some((pid, key));
            }
        }
        best.map(|(pid, _)| pid)
    }

    /// Score one process; also reports whether it produces a value-chain
    /// critical resource and at which minimum depth.
    fn score_process(
        &self,
        processes: &[Process],
        stocks: &[u64],
        idx: usize,
        allow_reserve_dip: bool,
    ) -> (f64, bool, u32) {
        let process = &processes[idx];
        let mut score = base_score(process);
        score = self.target_bonus(idx, process, stocks, score, allow_reserve_dip);
        score = self.high_value_boost(idx, process, stocks, score);
        score = self.bulk_pressure(idx, process, stocks, score);
        score = self.reserve_penalty(idx, process, stocks, score);
        score = self.phase_weight(idx, process, score);
        score = self.scarcity_boost(process, stocks, score);
        score = self.loop_damping(idx, process, score);
        score -= process.delay as f64 + 0.1 * self.execution_counts[idx] as f64;

        let min_depth = process
            .results
            .iter()
            .filter_map(|(r, _)| self.analysis.depths[r.index()])
            .min()
            .unwrap_or(0);
        let critical = process
            .results
            .iter()
            .any(|(r, _)| self.analysis.depths[r.index()].is_some());
        (score, critical, min_depth)
    }

    /// Reward net target production; block cannibalising below-bulk inputs
    /// unless a target has fallen under reserve and this sale nets positive.
    fn target_bonus(
        &self,
        idx: usize,
        process: &Process,
        stocks: &[u64],
        mut score: f64,
        allow_reserve_dip: bool,
    ) -> f64 {
        let analysis = &self.analysis;
        let hv_exists = analysis.high_value.iter().any(|&h| h);
        for &target in &analysis.targets {
            if !process.produces(target) {
                continue;
            }
            let net = process.results_quantity(target) as i64
                - process.needs_quantity(target) as i64;

            let bulk_starved = !allow_reserve_dip
                && process.needs.iter().any(|(resource, quantity)| {
                    let bulk = analysis.bulks[resource.index()];
                    let current = stocks[resource.index()];
                    bulk > 0
                        && (current as f64) < bulk as f64 * 0.5
                        && current < quantity * 2
                });

            if bulk_starved {
                let targets_low = analysis
                    .targets
                    .iter()
                    .any(|&t| stocks[t.index()] < self.effective_reserve(t));
                if !(targets_low && net > 0) {
                    score *= 1e-4;
                }
            } else if !analysis.high_value[idx] && hv_exists {
                let scale = if net > 10_000 {
                    20.0
                } else if net > 1000 {
                    8.0
                } else if net > 100 {
                    3.0
                } else {
                    1.0
                };
                score += net as f64 * 5_000.0 * scale;
            } else {
                let scale = if net > 10_000 {
                    200.0
                } else if net > 1000 {
                    80.0
                } else if net > 100 {
                    30.0
                } else if net > 0 {
                    10.0
                } else {
                    1.0
                };
                score += net as f64 * 50_000.0 * scale;
            }
        }
        score
    }

    fn high_value_boost(&self, idx: usize, process: &Process, stocks: &[u64], score: f64) -> f64 {
        if !self.analysis.high_value[idx] {
            return score;
        }
        let late = matches!(self.phase, Phase::Convert | Phase::Sell);
        let can_bulk = process.needs.iter().all(|(r, q)| {
            stocks[r.index()] >= q * self.analysis.bulk_multiplier
        });
        if can_bulk {
            score * if late { 1e8 } else { 1e7 }
        } else if process.can_run(stocks) {
            score * if late { 1e7 } else { 1e3 }
        } else {
            score
        }
    }

    /// Producing a below-bulk resource is strongly favored; overshooting a
    /// met bulk target is pointless. Conversion-loop members are excluded,
    /// they would pump their own output forever.
    fn bulk_pressure(&self, idx: usize, process: &Process, stocks: &[u64], mut score: f64) -> f64 {
        if self.analysis.conversion_loop[idx] {
            return score;
        }
        for (resource, _) in &process.results {
            let bulk = self.analysis.bulks[resource.index()];
            if bulk == 0 {
                continue;
            }
            let current = stocks[resource.index()];
            if current < bulk {
                let shortage = (bulk - current) as f64 / bulk as f64;
                score *= 1000.0 + shortage * 1e5;
            } else {
                score *= 1e-4;
            }
        }
        score
    }

    fn reserve_penalty(&self, idx: usize, process: &Process, stocks: &[u64], mut score: f64) -> f64 {
        let analysis = &self.analysis;
        let gathering = analysis.is_gathering(process);
        for &target in &analysis.targets {
            let consumed = process.needs_quantity(target);
            if consumed == 0 {
                continue;
            }
            let spendable =
                stocks[target.index()] as i128 - self.effective_reserve(target) as i128;
            if spendable < consumed as i128 {
                let factor = if analysis.high_value[idx] {
                    1.0
                } else if gathering {
                    1e7
                } else if analysis.intermediate_needs[idx].is_some() {
                    1e5
                } else {
                    1e7
                };
                score -= consumed as f64 * factor;
            } else {
                let scarcity = if spendable < 100 {
                    1e4
                } else if spendable < 1000 {
                    1e3
                } else {
                    1e2
                };
                let chain_relief = if analysis.intermediate_needs[idx].is_some() {
                    0.1
                } else {
                    1.0
                };
                score -= consumed as f64 * scarcity * chain_relief;
            }
        }
        score
    }

    fn phase_weight(&self, idx: usize, process: &Process, mut score: f64) -> f64 {
        let analysis = &self.analysis;
        let gathering = analysis.is_gathering(process);
        match self.phase {
            Phase::Gather => {
                if gathering {
                    score *= 2.0;
                }
            }
            Phase::Build => {
                if gathering {
                    score *= 1e-4;
                } else if process.results.iter().any(|(r, _)| {
                    analysis.depths[r.index()].is_some_and(|d| d >= 2)
                }) {
                    score *= 50.0;
                }
            }
            Phase::Convert => {
                if gathering {
                    score *= 1e-6;
                } else {
                    for (resource, _) in &process.results {
                        match analysis.depths[resource.index()] {
                            Some(1) => {
                                score *= 500.0;
                                break;
                            }
                            Some(2) => {
                                score *= 100.0;
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
            Phase::Sell => {
                if gathering {
                    score *= 1e-8;
                } else if !analysis.high_value[idx] {
                    score *= 0.01;
                }
            }
        }
        score
    }

    fn scarcity_boost(&self, process: &Process, stocks: &[u64], mut score: f64) -> f64 {
        for (resource, _) in &process.results {
            if !self.analysis.value_chain[resource.index()] {
                continue;
            }
            let current = stocks[resource.index()];
            score *= if current == 0 {
                5.0
            } else if current < 10 {
                3.0
            } else if current < 30 {
                2.0
            } else {
                1.0
            };
        }
        score
    }

    fn loop_damping(&self, idx: usize, process: &Process, mut score: f64) -> f64 {
        for (resource, _) in &process.results {
            if process.consumes(*resource) {
                score *= 1e-4;
            }
        }
        let feeds_bulk = process
            .results
            .iter()
            .any(|(r, _)| self.analysis.bulks[r.index()] > 0);
        if self.analysis.conversion_loop[idx] && !feeds_bulk {
            score *= 1e-5;
        }
        score
    }
}

fn base_score(process: &Process) -> f64 {
    if process.needs.is_empty() {
        1e5
    } else {
        (process.total_results() as f64 / process.total_needs() as f64) * 100.0
    }
}

fn better(candidate: (bool, i64, f64), best: (bool, i64, f64)) -> bool {
    match candidate.0.cmp(&best.0) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => match candidate.1.cmp(&best.1) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => candidate.2 > best.2,
        },
    }
}
