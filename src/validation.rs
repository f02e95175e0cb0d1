use anyhow::{Context, bail, ensure};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info};

use crate::{
    algorithm::{self, Strategy},
    network::{Capacity, Network},
};

pub struct RandomConfig {
    /// number of vertices, source is 0 and sink is the last one
    pub vertices: usize,
    /// number of edge pairs to insert
    pub edges: usize,
    /// capacities are drawn from `0..=max_capacity`
    pub max_capacity: Capacity,
    /// probability that an inserted edge is directed
    pub directed_ratio: f64,
    /// seed of the first trial, trial `i` uses `seed + i`
    pub seed: u64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        RandomConfig {
            vertices: 64,
            edges: 512,
            max_capacity: 100,
            directed_ratio: 1.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    pub seed: u64,
    pub flow: Capacity,
}

pub fn random_network(config: &RandomConfig, seed: u64) -> Network {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = config.vertices;
    let mut network = Network::new(n, 0, n - 1);
    for _ in 0..config.edges {
        let from = rng.random_range(0..n);
        let to = rng.random_range(0..n);
        let capacity = rng.random_range(0..=config.max_capacity);
        let directed = rng.random_bool(config.directed_ratio);
        network.insert_edge(from, to, capacity, directed);
    }
    network
}

fn run_trial(config: &RandomConfig, seed: u64) -> anyhow::Result<TrialOutcome> {
    let network = random_network(config, seed);
    let mut expected = None;
    for strategy in Strategy::ALL {
        let (flow, solved) = algorithm::solve(strategy, network.clone());
        solved
            .check_flow()
            .with_context(|| format!("seed {seed}: {strategy:?} produced an invalid flow"))?;
        ensure!(
            solved.outflow(solved.source()) == flow,
            "seed {seed}: {strategy:?} reports {flow} but routes {}",
            solved.outflow(solved.source())
        );
        let (reference, value) = *expected.get_or_insert((strategy, flow));
        if value != flow {
            bail!("seed {seed}: {reference:?} found {value} but {strategy:?} found {flow}");
        }
    }
    let flow = expected.map_or(0, |(_, flow)| flow);
    debug!("seed {}: flow {}", seed, flow);
    Ok(TrialOutcome { seed, flow })
}

/// Runs `trials` random networks through every strategy in parallel and
/// fails on the first invalid flow or disagreement.
pub fn cross_validate(config: &RandomConfig, trials: usize) -> anyhow::Result<Vec<TrialOutcome>> {
    ensure!(config.vertices >= 2, "need at least a source and a sink");
    ensure!(config.max_capacity >= 0, "capacities must be non-negative");
    ensure!(
        (0.0..=1.0).contains(&config.directed_ratio),
        "directed ratio {} is not a probability",
        config.directed_ratio
    );
    let outcomes = (0..trials as u64)
        .into_par_iter()
        .map(|trial| run_trial(config, config.seed.wrapping_add(trial)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    info!("{} trials agree", outcomes.len());
    Ok(outcomes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithm::FlowFindingAlgorithm;

    #[test]
    fn strategies_agree() {
        let config = RandomConfig {
            vertices: 12,
            edges: 40,
            max_capacity: 10,
            directed_ratio: 0.8,
            seed: 1,
        };
        let outcomes = cross_validate(&config, 300).unwrap();
        assert_eq!(outcomes.len(), 300);
        assert!(outcomes.iter().any(|outcome| outcome.flow > 0));
    }

    #[test]
    fn dense_directed() {
        let config = RandomConfig {
            vertices: 30,
            edges: 400,
            max_capacity: 1000,
            directed_ratio: 1.0,
            seed: 1000,
        };
        cross_validate(&config, 40).unwrap();
    }

    #[test]
    fn unit_capacities() {
        let config = RandomConfig {
            vertices: 50,
            edges: 200,
            max_capacity: 1,
            directed_ratio: 0.5,
            seed: 77,
        };
        cross_validate(&config, 40).unwrap();
    }

    #[test]
    fn same_seed_same_network() {
        let config = RandomConfig::default();
        let a = random_network(&config, 5);
        let b = random_network(&config, 5);
        let edges = |network: &Network| {
            network
                .edges()
                .map(|(_, e)| (e.start, e.finish, e.capacity))
                .collect::<Vec<_>>()
        };
        assert_eq!(edges(&a), edges(&b));
        assert_eq!(a.edge_count(), 2 * config.edges);
    }

    #[test]
    fn rerun_after_reset() {
        let config = RandomConfig {
            vertices: 20,
            edges: 80,
            ..RandomConfig::default()
        };
        for seed in 0..20 {
            for strategy in Strategy::ALL {
                let mut algorithm = strategy.build();
                algorithm.load_network(random_network(&config, seed));
                algorithm.reset();
                assert!(algorithm.run());
                let first = algorithm.result();
                algorithm.reset();
                assert!(algorithm.run());
                assert_eq!(algorithm.result(), first);
                assert_eq!(algorithm.network().unwrap().check_flow(), Ok(()));
            }
        }
    }

    #[test]
    fn rejects_bad_config() {
        let config = RandomConfig {
            vertices: 1,
            ..RandomConfig::default()
        };
        assert!(cross_validate(&config, 1).is_err());
        let config = RandomConfig {
            directed_ratio: 1.5,
            ..RandomConfig::default()
        };
        assert!(cross_validate(&config, 1).is_err());
    }
}
