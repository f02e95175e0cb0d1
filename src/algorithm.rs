use clap::ValueEnum;
use serde::Serialize;

use crate::{
    dinic::Dinic,
    mkm::MalhotraKumarMaheshwari,
    network::{Capacity, Network},
    preflow_push::PreflowPush,
};

/// Ownership and run contract shared by all max-flow strategies.
///
/// A network is moved in with [`load_network`](Self::load_network) and moved
/// back out with [`store_network`](Self::store_network). Running without a
/// loaded network fails and leaves everything untouched.
pub trait FlowFindingAlgorithm {
    fn load_network(&mut self, network: Network);
    fn store_network(&mut self) -> Option<Network>;
    fn network(&self) -> Option<&Network>;
    /// Clears the loaded network's flow and the accumulated result.
    fn reset(&mut self);
    /// Augments the current flow of the loaded network to a maximum one.
    fn run(&mut self) -> bool;
    fn result(&self) -> Capacity;
    fn name(&self) -> &'static str;
}

/// Loaded network plus accumulated flow value, the part of the state every
/// strategy carries in the same way.
#[derive(Default)]
pub(crate) struct Slot {
    pub network: Option<Network>,
    pub flow: Capacity,
}

impl Slot {
    pub fn load(&mut self, network: Network) {
        self.network = Some(network);
        self.flow = 0;
    }
    pub fn store(&mut self) -> Option<Network> {
        self.flow = 0;
        self.network.take()
    }
    pub fn reset(&mut self) {
        if let Some(network) = self.network.as_mut() {
            network.clear();
        }
        self.flow = 0;
    }
}

#[derive(Debug, ValueEnum, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Mkm,
    PreflowPush,
    Dinic,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Mkm, Strategy::PreflowPush, Strategy::Dinic];

    pub fn build(self) -> Box<dyn FlowFindingAlgorithm + Send> {
        match self {
            Strategy::Mkm => Box::new(MalhotraKumarMaheshwari::default()),
            Strategy::PreflowPush => Box::new(PreflowPush::default()),
            Strategy::Dinic => Box::new(Dinic::default()),
        }
    }
}

/// Full load, reset, run, store cycle. Returns the flow value and the network
/// holding the final flow assignment.
pub fn solve(strategy: Strategy, network: Network) -> (Capacity, Network) {
    let mut algorithm = strategy.build();
    algorithm.load_network(network);
    algorithm.reset();
    let finished = algorithm.run();
    debug_assert!(finished);
    let flow = algorithm.result();
    match algorithm.store_network() {
        Some(network) => (flow, network),
        None => unreachable!("network was loaded above"),
    }
}
