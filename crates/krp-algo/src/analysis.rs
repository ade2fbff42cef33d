//! Static analysis of a process set.
//!
//! Derived once at optimizer construction and never mutated: which
//! processes are terminal high-value steps, which resources feed them
//! (the value chain), how far each intermediate sits from a high-value
//! input (depth), what stockpile each intermediate should reach (bulk
//! target), and how much of each target resource must be held back from
//! re-investment (reserve).
//!
//! All tables are dense vectors indexed by [`ProcessId`] / [`ResourceId`]
//! position, so two constructions from the same process list compare equal.

use krp_core::{Process, ResourceId};

/// Immutable analytic state shared by every selection decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Stock targets of the optimize directive, in declaration order.
    pub targets: Vec<ResourceId>,
    pub target_mask: Vec<bool>,
    pub total_cycles: u64,
    /// False when the directive names no stock target; every table below is
    /// then empty and the phase machine stays in its initial state.
    pub analyzed: bool,
    /// Processes that convert intermediates into targets at high yield.
    pub high_value: Vec<bool>,
    /// Resources reachable backwards from any high-value input.
    pub value_chain: Vec<bool>,
    /// Process pairs that cycle a resource set without net progress.
    pub conversion_loop: Vec<bool>,
    /// Loop-free non-high-value producers of value-chain resources.
    pub value_chain_producer: Vec<bool>,
    /// Non-target inputs per tracked process (high-value processes and
    /// loop-free value-chain producers). `None` = no non-target inputs.
    pub intermediate_needs: Vec<Option<Vec<(ResourceId, u64)>>>,
    /// Hop count back to a high-value input; 1 = direct input.
    pub depths: Vec<Option<u32>>,
    /// Desired stockpile per intermediate, 0 = none.
    pub bulks: Vec<u64>,
    /// Minimum held-back amount per target, 0 = none.
    pub reserves: Vec<u64>,
    /// Global bulk multiplier, scaled to the largest high-value yield.
    pub bulk_multiplier: u64,
    /// Reserve scale, grows with the cycle budget.
    pub reserve_multiplier: f64,
}

impl Analysis {
    /// Run the full analysis over `processes`.
    ///
    /// `targets` must already be filtered to stock targets (no `time`).
    pub fn build(
        processes: &[Process],
        resource_count: usize,
        targets: &[ResourceId],
        total_cycles: u64,
    ) -> Self {
        let process_count = processes.len();
        let mut target_mask = vec![false; resource_count];
        for t in targets {
            target_mask[t.index()] = true;
        }

        let mut analysis = Analysis {
            targets: targets.to_vec(),
            target_mask,
            total_cycles,
            analyzed: false,
            high_value: vec![false; process_count],
            value_chain: vec![false; resource_count],
            conversion_loop: detect_conversion_loops(processes),
            value_chain_producer: vec![false; process_count],
            intermediate_needs: vec![None; process_count],
            depths: vec![None; resource_count],
            bulks: vec![0; resource_count],
            reserves: vec![0; resource_count],
            bulk_multiplier: 2,
            reserve_multiplier: reserve_multiplier(total_cycles),
        };

        if targets.is_empty() {
            return analysis;
        }

        analysis.identify_high_value(processes);
        analysis.collect_value_chain(processes);
        analysis.track_chain_producers(processes);
        analysis.assign_depths(processes);
        analysis.determine_bulks(processes);
        analysis.calculate_reserves(processes);
        analysis.analyzed = true;
        analysis
    }

    pub fn is_target(&self, resource: ResourceId) -> bool {
        self.target_mask[resource.index()]
    }

    /// A gathering process spends at most one resource, and that resource
    /// is a target (typically "buy raw input with money").
    pub fn is_gathering(&self, process: &Process) -> bool {
        process.needs.len() <= 1
            && process.needs.iter().any(|(r, _)| self.is_target(*r))
    }

    fn identify_high_value(&mut self, processes: &[Process]) {
        let max_net: Vec<i64> = self
            .targets
            .iter()
            .map(|&t| {
                processes
                    .iter()
                    .filter(|p| p.produces(t))
                    .map(|p| p.results_quantity(t) as i64 - p.needs_quantity(t) as i64)
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for (idx, process) in processes.iter().enumerate() {
            let high_yield = self.targets.iter().enumerate().any(|(k, &target)| {
                if !process.produces(target) {
                    return false;
                }
                let produced = process.results_quantity(target);
                let consumed = process.needs_quantity(target);
                let net = produced as i64 - consumed as i64;
                net > 1000
                    || (consumed > 0 && net > 50 * consumed as i64)
                    || produced > 10_000
                    || (max_net[k] > 0 && net as f64 >= max_net[k] as f64 * 0.5)
            });
            if high_yield {
                self.high_value[idx] = true;
                self.record_intermediate_needs(idx, process);
            }
        }
    }

    fn record_intermediate_needs(&mut self, idx: usize, process: &Process) {
        let needs: Vec<(ResourceId, u64)> = process
            .needs
            .iter()
            .filter(|(r, _)| !self.is_target(*r))
            .copied()
            .collect();
        if !needs.is_empty() {
            self.intermediate_needs[idx] = Some(needs);
        }
    }

    /// Transitive backwards closure from high-value inputs through their
    /// producers.
    fn collect_value_chain(&mut self, processes: &[Process]) {
        for idx in 0..processes.len() {
            if !self.high_value[idx] {
                continue;
            }
            let mut visited = vec![false; self.value_chain.len()];
            let mut stack: Vec<ResourceId> =
                processes[idx].needs.iter().map(|(r, _)| *r).collect();
            while let Some(resource) = stack.pop() {
                if visited[resource.index()] {
                    continue;
                }
                visited[resource.index()] = true;
                self.value_chain[resource.index()] = true;
                for producer in processes {
                    if producer.produces(resource) {
                        for (need, _) in &producer.needs {
                            if !visited[need.index()] {
                                stack.push(*need);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Loop-free producers of value-chain resources join the intermediate
    /// bookkeeping alongside the high-value processes themselves.
    fn track_chain_producers(&mut self, processes: &[Process]) {
        for (idx, process) in processes.iter().enumerate() {
            if self.high_value[idx] || self.conversion_loop[idx] {
                continue;
            }
            if process
                .results
                .iter()
                .any(|(r, _)| self.value_chain[r.index()])
            {
                self.value_chain_producer[idx] = true;
                self.record_intermediate_needs(idx, process);
            }
        }
    }

    fn assign_depths(&mut self, processes: &[Process]) {
        for (idx, process) in processes.iter().enumerate() {
            if !self.high_value[idx] {
                continue;
            }
            for (resource, _) in &process.needs {
                if !self.is_target(*resource) {
                    self.depths[resource.index()] = Some(1);
                }
            }
        }
        // Propagate upstream, min over all paths; bounded iteration.
        for _ in 0..10 {
            for process in processes {
                for (result, _) in &process.results {
                    let Some(depth) = self.depths[result.index()] else {
                        continue;
                    };
                    for (need, _) in &process.needs {
                        if self.is_target(*need) {
                            continue;
                        }
                        let slot = &mut self.depths[need.index()];
                        let candidate = depth + 1;
                        *slot = Some(slot.map_or(candidate, |d| d.min(candidate)));
                    }
                }
            }
        }
    }

    fn determine_bulks(&mut self, processes: &[Process]) {
        let max_production = processes
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.high_value[*idx])
            .flat_map(|(_, p)| self.targets.iter().map(|&t| p.results_quantity(t)))
            .max()
            .unwrap_or(0);
        self.bulk_multiplier = if max_production >= 10_000 {
            20
        } else if max_production >= 1000 {
            10
        } else if max_production >= 100 {
            5
        } else {
            2
        };

        for (idx, process) in processes.iter().enumerate() {
            if !self.high_value[idx] {
                continue;
            }
            for (resource, quantity) in &process.needs {
                if !self.is_target(*resource) {
                    let slot = &mut self.bulks[resource.index()];
                    *slot = (*slot).max(quantity * self.bulk_multiplier);
                }
            }
        }

        // Push demand upstream: enough input stock for half the runs that
        // would fill each bulk target.
        for _ in 0..2 {
            let with_bulk: Vec<usize> = (0..self.bulks.len())
                .filter(|&r| self.bulks[r] > 0)
                .collect();
            for resource in with_bulk {
                for process in processes {
                    let produced = process.results_quantity(ResourceId::new(resource));
                    if produced == 0 {
                        continue;
                    }
                    let runs = self.bulks[resource].div_ceil(produced);
                    for (need, quantity) in &process.needs {
                        if self.is_target(*need) {
                            continue;
                        }
                        let slot = &mut self.bulks[need.index()];
                        *slot = (*slot).max(quantity * runs / 2);
                    }
                }
            }
        }
    }

    fn calculate_reserves(&mut self, processes: &[Process]) {
        for (idx, process) in processes.iter().enumerate() {
            if !self.high_value[idx] && !self.value_chain_producer[idx] {
                continue;
            }
            for k in 0..self.targets.len() {
                let target = self.targets[k];
                let consumed = process.needs_quantity(target);
                if consumed == 0 {
                    continue;
                }
                let weight = if self.high_value[idx] { 100.0 } else { 500.0 };
                let reserve = (consumed as f64 * weight * self.reserve_multiplier) as u64;
                let slot = &mut self.reserves[target.index()];
                *slot = (*slot).max(reserve);
            }
        }
    }
}

fn detect_conversion_loops(processes: &[Process]) -> Vec<bool> {
    processes
        .iter()
        .enumerate()
        .map(|(idx, process)| {
            processes.iter().enumerate().any(|(other_idx, other)| {
                other_idx != idx
                    && process.results.iter().any(|(r, _)| other.consumes(*r))
                    && process.needs.iter().any(|(r, _)| other.produces(*r))
            })
        })
        .collect()
}

fn reserve_multiplier(total_cycles: u64) -> f64 {
    ((total_cycles.max(1000) as f64).log10() - 2.0).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn build(text: &str, cycles: u64) -> (krp_core::Configuration, Analysis) {
        let config = parse_config_str(text).unwrap();
        let analysis = Analysis::build(
            &config.processes,
            config.resources.len(),
            &config.targets,
            cycles,
        );
        (config, analysis)
    }

    #[test]
    fn test_chain_classification() {
        let (config, analysis) = build(CHAIN, 100);
        let achat = config.process_by_name("achat").unwrap().index();
        let vente = config.process_by_name("vente").unwrap().index();
        let euro = config.resources.get("euro").unwrap();
        let widget = config.resources.get("widget").unwrap();

        assert!(analysis.analyzed);
        assert!(analysis.high_value[vente]);
        assert!(!analysis.high_value[achat]);
        assert!(analysis.value_chain[widget.index()]);
        assert!(analysis.value_chain[euro.index()]);

        // achat/vente cycle euro <-> widget, so both are conversion loops;
        // achat is therefore excluded from the intermediate bookkeeping.
        assert!(analysis.conversion_loop[achat]);
        assert!(analysis.conversion_loop[vente]);
        assert!(analysis.intermediate_needs[achat].is_none());
        assert_eq!(
            analysis.intermediate_needs[vente],
            Some(vec![(widget, 1)])
        );

        assert_eq!(analysis.depths[widget.index()], Some(1));
        assert_eq!(analysis.depths[euro.index()], None);
        assert_eq!(analysis.bulk_multiplier, 2);
        assert_eq!(analysis.bulks[widget.index()], 2);
        // vente consumes no euro, so nothing is held in reserve.
        assert_eq!(analysis.reserves[euro.index()], 0);
    }

    #[test]
    fn test_factory_bulk_propagation() {
        let (config, analysis) = build(FACTORY, 500);
        let ship = config.process_by_name("ship").unwrap().index();
        let pack = config.process_by_name("pack").unwrap().index();
        let gather = config.process_by_name("gather").unwrap().index();
        let euro = config.resources.get("euro").unwrap();
        let a = config.resources.get("a").unwrap();
        let bx = config.resources.get("box").unwrap();

        assert!(analysis.high_value[ship]);
        assert!(!analysis.high_value[pack]);
        assert!(!analysis.conversion_loop[gather]);

        // ship produces 200 -> multiplier 5; box 5*5=25; a = 10*25/2 = 125.
        assert_eq!(analysis.bulk_multiplier, 5);
        assert_eq!(analysis.bulks[bx.index()], 25);
        assert_eq!(analysis.bulks[a.index()], 125);

        assert_eq!(analysis.depths[bx.index()], Some(1));
        assert_eq!(analysis.depths[a.index()], Some(2));

        // gather spends only the target, so it carries no intermediate needs
        // but is still a tracked chain producer and holds back reserve.
        assert!(analysis.value_chain_producer[gather]);
        assert!(analysis.intermediate_needs[gather].is_none());
        assert_eq!(analysis.intermediate_needs[pack], Some(vec![(a, 10)]));
        assert_eq!(analysis.reserves[euro.index()], 500);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let (config, first) = build(FACTORY, 500);
        let second = Analysis::build(
            &config.processes,
            config.resources.len(),
            &config.targets,
            500,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_time_only_directive_skips_analysis() {
        let text = "euro:10\nachat:(euro:1):(widget:1):1\noptimize:(time)\n";
        let (_, analysis) = build(text, 100);
        assert!(!analysis.analyzed);
        assert!(analysis.high_value.iter().all(|&hv| !hv));
        assert!(analysis.bulks.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reserves_scale_with_cycle_budget() {
        let text = "\
euro:1000
forge:(euro:50;ore:10):(euro:5200):5
mine:(euro:2):(ore:1):3
optimize:(euro)
";
        let (config, analysis) = build(text, 100_000);
        let euro = config.resources.get("euro").unwrap();
        let forge = config.process_by_name("forge").unwrap().index();
        let mine = config.process_by_name("mine").unwrap().index();
        assert!(analysis.high_value[forge]);
        // mine cycles euro <-> ore with forge, so it stays untracked and
        // adds nothing to the reserve.
        assert!(analysis.conversion_loop[mine]);
        assert!(!analysis.value_chain_producer[mine]);
        // log10(100000) - 2 = 3; forge is high-value: 50 * 100 * 3.
        assert_eq!(analysis.reserve_multiplier, 3.0);
        assert_eq!(analysis.reserves[euro.index()], 15_000);
    }

    #[test]
    fn test_target_only_chain_producer_contributes_reserve() {
        // dig's only input is the target itself; it still feeds the chain
        // (rock -> ore -> smelt) and must hold euro back in reserve.
        let text = "\
euro:1000
dig:(euro:2):(rock:1):1
crush:(rock:3):(ore:1):1
smelt:(ore:10):(euro:5200):5
optimize:(euro)
";
        let (config, analysis) = build(text, 100_000);
        let euro = config.resources.get("euro").unwrap();
        let dig = config.process_by_name("dig").unwrap().index();
        let crush = config.process_by_name("crush").unwrap().index();

        assert!(analysis.value_chain_producer[dig]);
        assert!(analysis.intermediate_needs[dig].is_none());
        assert!(analysis.value_chain_producer[crush]);
        // dig: 2 * 500 * 3.
        assert_eq!(analysis.reserves[euro.index()], 3000);
    }

    #[test]
    fn test_gathering_definition() {
        let (config, analysis) = build(FACTORY, 500);
        let gather = config.process_by_name("gather").unwrap();
        let pack = config.process_by_name("pack").unwrap();
        assert!(analysis.is_gathering(config.process(gather)));
        assert!(!analysis.is_gathering(config.process(pack)));
    }
}
