use std::collections::VecDeque;

use tracing::{debug, info};

use crate::{
    algorithm::{FlowFindingAlgorithm, Slot},
    network::{Capacity, Network, View},
};

/// Dinic's algorithm, kept as an independent reference for cross-checking
/// the other strategies.
#[derive(Default)]
pub struct Dinic {
    slot: Slot,
    /// level graph
    level: Vec<usize>,
    /// pointer to the next edge
    pointer: Vec<View>,
    queue: VecDeque<usize>,
}

impl Dinic {
    fn bfs(&mut self, network: &Network) -> bool {
        self.level.fill(usize::MAX);
        self.queue.clear();
        self.queue.push_back(network.source());
        self.level[network.source()] = 0;
        while let Some(v) = self.queue.pop_front() {
            for id in network.vertex_edge_list(v).iter(network) {
                let u = network.edge(id).finish;
                if network.residual_capacity(id) < 1 || self.level[u] != usize::MAX {
                    continue;
                }
                self.level[u] = self.level[v] + 1;
                self.queue.push_back(u);
            }
        }
        self.level[network.sink()] != usize::MAX
    }

    fn dfs(&mut self, network: &mut Network, v: usize, budget: Capacity) -> Capacity {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
            if budget == 0 {
                return 0;
            }
            if v == network.sink() {
                return budget;
            }
            while let Some(id) = self.pointer[v].current() {
                let u = network.edge(id).finish;
                let space = network.residual_capacity(id);
                if self.level[v] + 1 != self.level[u] || space < 1 {
                    self.pointer[v].pop(network);
                    continue;
                }
                let update = self.dfs(network, u, budget.min(space));
                if update < 1 {
                    self.pointer[v].pop(network);
                    continue;
                }
                network.push_flow(id, update);
                return update;
            }
            0
        })
    }
}

impl FlowFindingAlgorithm for Dinic {
    fn load_network(&mut self, network: Network) {
        self.slot.load(network);
    }

    fn store_network(&mut self) -> Option<Network> {
        self.slot.store()
    }

    fn network(&self) -> Option<&Network> {
        self.slot.network.as_ref()
    }

    fn reset(&mut self) {
        self.slot.reset();
    }

    fn run(&mut self) -> bool {
        let Some(mut network) = self.slot.network.take() else {
            return false;
        };
        let (n, source) = (network.vertex_count(), network.source());
        self.level = vec![usize::MAX; n];
        let mut phases = 0;
        while self.bfs(&network) {
            self.pointer = (0..n).map(|v| network.vertex_edge_list(v)).collect();
            let mut flow = 0;
            loop {
                let update = self.dfs(&mut network, source, Capacity::MAX);
                if update < 1 {
                    break;
                }
                flow += update;
            }
            debug!("phase {}: sink level {}, flow {}", phases, self.level[network.sink()], flow);
            self.slot.flow += flow;
            phases += 1;
        }
        info!("{}: flow {} after {} phases", self.name(), self.slot.flow, phases);
        self.slot.network = Some(network);
        true
    }

    fn result(&self) -> Capacity {
        self.slot.flow
    }

    fn name(&self) -> &'static str {
        "dinic"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn maxflow_example() {
        let mut g = Network::new(6, 0, 5);
        g.insert_edge(0, 1, 16, true);
        g.insert_edge(0, 2, 13, true);
        g.insert_edge(1, 2, 10, true);
        g.insert_edge(1, 3, 12, true);
        g.insert_edge(2, 1, 4, true);
        g.insert_edge(2, 4, 14, true);
        g.insert_edge(3, 2, 9, true);
        g.insert_edge(3, 5, 20, true);
        g.insert_edge(4, 3, 7, true);
        g.insert_edge(4, 5, 4, true);
        let mut dinic = Dinic::default();
        dinic.load_network(g);
        assert!(dinic.run());
        assert_eq!(dinic.result(), 23);
        let g = dinic.store_network().unwrap();
        assert_eq!(g.check_flow(), Ok(()));
        println!("{:?}", g.current_flow().collect::<Vec<_>>());
    }

    #[test]
    fn deep_chain() {
        let n = 100_000;
        let mut g = Network::new(n, 0, n - 1);
        for v in 0..n - 1 {
            g.insert_edge(v, v + 1, 3, true);
        }
        let mut dinic = Dinic::default();
        dinic.load_network(g);
        assert!(dinic.run());
        assert_eq!(dinic.result(), 3);
    }
}
