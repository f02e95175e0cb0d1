//! Project selection as maximum-weight closure.
//!
//! Every item has a profit (possibly negative) and a list of items it
//! requires. The best selection closed under requirements is worth the sum of
//! positive profits minus the minimum cut of the network built by
//! [`ClosureInstance::as_network`].

use std::{fs::File, path::Path};

use anyhow::{Context, bail, ensure};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    algorithm::{self, Strategy},
    network::{Capacity, Network},
};

/// Largest instance [`ClosureInstance::brute_force`] will enumerate.
pub const BRUTE_FORCE_LIMIT: usize = 20;

#[derive(Deserialize, Debug, Clone)]
pub struct ClosureInstance {
    pub profits: Box<[Capacity]>,
    /// `dependencies[i]` lists the items item `i` requires, 0-based
    pub dependencies: Box<[Box<[usize]>]>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StrategyFlow {
    pub strategy: Strategy,
    pub flow: Capacity,
}

#[derive(Serialize, Debug, Clone)]
pub struct ClosureReport {
    pub total_profit: Capacity,
    pub max_flow: Capacity,
    pub best_profit: Capacity,
    pub selected: Vec<usize>,
    /// saturated edges leaving the selection, as `(from, to)`
    pub cut: Vec<(usize, usize)>,
    pub flows: Vec<StrategyFlow>,
}

impl ClosureInstance {
    pub fn load<S: AsRef<Path>>(x: S) -> anyhow::Result<Self> {
        let path = x.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let instance: Self = simd_json::from_reader(file)
            .with_context(|| format!("parsing {}", path.display()))?;
        instance.validate()?;
        Ok(instance)
    }

    pub fn size(&self) -> usize {
        self.profits.len()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.dependencies.len() == self.size(),
            "{} profits but {} dependency lists",
            self.size(),
            self.dependencies.len()
        );
        for (item, required) in self.dependencies.iter().enumerate() {
            if let Some(bad) = required.iter().find(|&&other| other >= self.size()) {
                bail!("item {item} requires unknown item {bad}");
            }
        }
        Ok(())
    }

    /// Sum of positive profits.
    pub fn total_profit(&self) -> Capacity {
        self.profits.iter().filter(|&&p| p > 0).sum()
    }

    /// Items are vertices `0..n`, the source is `n` and the sink `n + 1`.
    pub fn as_network(&self) -> Network {
        let n = self.size();
        let (source, sink) = (n, n + 1);
        let unbounded = self.total_profit().saturating_add(1);
        let mut network = Network::new(n + 2, source, sink);
        for (item, profit) in self.profits.iter().copied().enumerate() {
            if profit > 0 {
                network.insert_edge(source, item, profit, true);
            } else if profit < 0 {
                network.insert_edge(item, sink, -profit, true);
            }
        }
        for (item, required) in self.dependencies.iter().enumerate() {
            for other in required.iter().copied() {
                network.insert_edge(item, other, unbounded, true);
            }
        }
        network
    }

    /// Runs every strategy on the same network and fails unless they agree.
    pub fn solve(&self, strategies: &[Strategy]) -> anyhow::Result<ClosureReport> {
        self.validate()?;
        let Some((&first, rest)) = strategies.split_first() else {
            bail!("no strategy selected");
        };
        let network = self.as_network();
        let (max_flow, solved) = algorithm::solve(first, network.clone());
        solved
            .check_flow()
            .with_context(|| format!("{first:?} produced an invalid flow"))?;
        let mut flows = vec![StrategyFlow {
            strategy: first,
            flow: max_flow,
        }];
        for &strategy in rest {
            let (flow, other) = algorithm::solve(strategy, network.clone());
            other
                .check_flow()
                .with_context(|| format!("{strategy:?} produced an invalid flow"))?;
            debug!("{:?}: {}", strategy, flow);
            if flow != max_flow {
                bail!("{first:?} found flow {max_flow} but {strategy:?} found {flow}");
            }
            flows.push(StrategyFlow { strategy, flow });
        }
        let n = self.size();
        let side = solved.min_cut_source_side();
        let cut = solved
            .saturated_edges()
            .map(|id| solved.edge(id))
            .filter(|edge| side[edge.start] && !side[edge.finish])
            .map(|edge| (edge.start, edge.finish))
            .collect();
        let selected = side
            .into_iter()
            .take(n)
            .enumerate()
            .filter_map(|(item, chosen)| chosen.then_some(item))
            .collect();
        let total_profit = self.total_profit();
        info!(
            "{} items, total profit {}, max flow {}",
            n, total_profit, max_flow
        );
        Ok(ClosureReport {
            total_profit,
            max_flow,
            best_profit: total_profit - max_flow,
            selected,
            cut,
            flows,
        })
    }

    /// Enumerates every closed selection.
    pub fn brute_force(&self) -> anyhow::Result<Capacity> {
        self.validate()?;
        let n = self.size();
        ensure!(
            n <= BRUTE_FORCE_LIMIT,
            "{n} items is too many to enumerate (limit {BRUTE_FORCE_LIMIT})"
        );
        let requires: Vec<u32> = self
            .dependencies
            .iter()
            .map(|required| required.iter().fold(0, |mask, &other| mask | 1 << other))
            .collect();
        let best = (0u32..1 << n)
            .filter(|&mask| {
                (0..n).all(|item| mask & 1 << item == 0 || requires[item] & !mask == 0)
            })
            .map(|mask| {
                (0..n)
                    .filter(|&item| mask & 1 << item != 0)
                    .map(|item| self.profits[item])
                    .sum::<Capacity>()
            })
            .max()
            .unwrap_or(0);
        Ok(best)
    }
}
