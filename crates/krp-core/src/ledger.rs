//! Resource ledger: the sole mutable authority for stock quantities.
//!
//! Stocks are a dense `u64` vector indexed by [`ResourceId`], so every
//! quantity is non-negative by construction. `consume` is all-or-nothing:
//! it mutates only after the full availability check passes.

use crate::error::{KrpError, KrpResult};
use crate::model::{Configuration, ResourceId};
use std::collections::BTreeMap;

/// Current stock per resource for one simulation or verification run.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    stocks: Vec<u64>,
    names: Vec<String>,
}

impl Ledger {
    /// Initialise from a configuration's initial stocks.
    pub fn new(config: &Configuration) -> Self {
        Self {
            stocks: config.initial_stocks.clone(),
            names: config.resources.ids().map(|id| config.resources.name(id).to_string()).collect(),
        }
    }

    pub fn get(&self, resource: ResourceId) -> u64 {
        self.stocks[resource.index()]
    }

    /// Dense view of all stocks, indexed by [`ResourceId`].
    pub fn snapshot(&self) -> &[u64] {
        &self.stocks
    }

    /// Check whether every requirement is covered by current stock.
    pub fn has(&self, requirements: &[(ResourceId, u64)]) -> bool {
        requirements
            .iter()
            .all(|(r, q)| self.stocks[r.index()] >= *q)
    }

    /// Remove `requirements` from stock on behalf of `process`.
    ///
    /// Fails without mutating anything if any single requirement exceeds
    /// the current stock.
    pub fn consume(
        &mut self,
        process: &str,
        requirements: &[(ResourceId, u64)],
        cycle: u64,
    ) -> KrpResult<()> {
        for (resource, required) in requirements {
            let available = self.stocks[resource.index()];
            if available < *required {
                return Err(KrpError::InsufficientResources {
                    cycle,
                    process: process.to_string(),
                    resource: self.names[resource.index()].clone(),
                    required: *required,
                    available,
                });
            }
        }
        for (resource, required) in requirements {
            self.stocks[resource.index()] -= required;
        }
        Ok(())
    }

    /// Add `results` to stock on behalf of a completing process.
    ///
    /// Never fails: production only grows stocks. Quantities saturate at the
    /// platform word width rather than wrapping.
    pub fn produce(&mut self, results: &[(ResourceId, u64)]) {
        for (resource, quantity) in results {
            let slot = &mut self.stocks[resource.index()];
            *slot = slot.saturating_add(*quantity);
        }
    }

    /// Stocks as a name-sorted map, for reports and results.
    pub fn as_map(&self) -> BTreeMap<String, u64> {
        self.names
            .iter()
            .zip(&self.stocks)
            .map(|(name, qty)| (name.clone(), *qty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Process, ResourceTable};

    fn config() -> Configuration {
        let mut resources = ResourceTable::new();
        let euro = resources.intern("euro");
        let widget = resources.intern("widget");
        Configuration {
            resources,
            initial_stocks: vec![10, 0],
            processes: vec![Process {
                name: "achat".into(),
                needs: vec![(euro, 1)],
                results: vec![(widget, 1)],
                delay: 1,
            }],
            targets: vec![euro],
            optimize_time: false,
        }
    }

    #[test]
    fn test_consume_and_produce() {
        let cfg = config();
        let euro = cfg.resources.get("euro").unwrap();
        let widget = cfg.resources.get("widget").unwrap();
        let mut ledger = Ledger::new(&cfg);

        assert!(ledger.has(&[(euro, 10)]));
        ledger.consume("achat", &[(euro, 3)], 0).unwrap();
        assert_eq!(ledger.get(euro), 7);

        ledger.produce(&[(widget, 2)]);
        assert_eq!(ledger.get(widget), 2);
    }

    #[test]
    fn test_consume_is_all_or_nothing() {
        let cfg = config();
        let euro = cfg.resources.get("euro").unwrap();
        let widget = cfg.resources.get("widget").unwrap();
        let mut ledger = Ledger::new(&cfg);

        // euro is available but widget is not; nothing may be deducted.
        let err = ledger
            .consume("vente", &[(euro, 5), (widget, 1)], 4)
            .unwrap_err();
        match err {
            KrpError::InsufficientResources {
                cycle,
                process,
                resource,
                required,
                available,
            } => {
                assert_eq!(cycle, 4);
                assert_eq!(process, "vente");
                assert_eq!(resource, "widget");
                assert_eq!(required, 1);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.get(euro), 10);
        assert_eq!(ledger.get(widget), 0);
    }

    #[test]
    fn test_stocks_stay_non_negative() {
        let cfg = config();
        let euro = cfg.resources.get("euro").unwrap();
        let mut ledger = Ledger::new(&cfg);
        ledger.consume("achat", &[(euro, 10)], 0).unwrap();
        assert_eq!(ledger.get(euro), 0);
        // Draining to zero is fine; going below is not.
        assert!(ledger.consume("achat", &[(euro, 1)], 1).is_err());
        assert_eq!(ledger.get(euro), 0);
    }

    #[test]
    fn test_as_map_sorted_by_name() {
        let cfg = config();
        let ledger = Ledger::new(&cfg);
        let map = ledger.as_map();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, ["euro", "widget"]);
        assert_eq!(map["euro"], 10);
    }
}
