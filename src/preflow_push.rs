use tracing::{debug, info, trace};

use crate::{
    algorithm::{FlowFindingAlgorithm, Slot},
    network::{Capacity, Network, View},
};

/// Generic push-relabel. Vertices are discharged in index order, round after
/// round, until a whole round finds no vertex with excess.
#[derive(Default)]
pub struct PreflowPush {
    slot: Slot,
    height: Vec<usize>,
    excess: Vec<Capacity>,
    /// next edge to try when discharging
    view: Vec<View>,
    relabels: usize,
}

impl PreflowPush {
    fn initialize(&mut self, network: &mut Network) {
        let n = network.vertex_count();
        let source = network.source();
        self.height = vec![0; n];
        self.height[source] = n;
        self.view = (0..n).map(|v| network.vertex_edge_list(v)).collect();
        self.relabels = 0;
        // the network may already carry a flow, which is a valid preflow
        self.excess = (0..n).map(|v| -network.outflow(v)).collect();
        let saturate: Vec<_> = network.vertex_edge_list(source).iter(network).collect();
        for id in saturate {
            let residual = network.residual_capacity(id);
            if residual < 1 {
                continue;
            }
            network.push_flow(id, residual);
            self.excess[source] -= residual;
            self.excess[network.edge(id).finish] += residual;
        }
    }

    fn relabel(&mut self, network: &Network, v: usize) -> bool {
        let lowest = network
            .vertex_edge_list(v)
            .iter(network)
            .filter(|&id| network.residual_capacity(id) > 0)
            .map(|id| network.edge(id).finish)
            .filter(|&u| u != v)
            .map(|u| self.height[u])
            .min();
        let Some(lowest) = lowest else {
            return false;
        };
        trace!("relabel {} from {} to {}", v, self.height[v], lowest + 1);
        self.height[v] = lowest + 1;
        self.view[v] = network.vertex_edge_list(v);
        self.relabels += 1;
        true
    }

    fn discharge(&mut self, network: &mut Network, v: usize) {
        while self.excess[v] > 0 {
            let Some(id) = self.view[v].current() else {
                if !self.relabel(network, v) {
                    debug_assert!(false, "vertex {v} holds excess without residual edges");
                    return;
                }
                continue;
            };
            let residual = network.residual_capacity(id);
            let to = network.edge(id).finish;
            if residual > 0 && self.height[v] == self.height[to] + 1 {
                let delta = self.excess[v].min(residual);
                network.push_flow(id, delta);
                self.excess[v] -= delta;
                self.excess[to] += delta;
            } else {
                self.view[v].pop(network);
            }
        }
    }
}

impl FlowFindingAlgorithm for PreflowPush {
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
        let (source, sink) = (network.source(), network.sink());
        let before = -network.outflow(sink);
        self.initialize(&mut network);
        let mut rounds = 0;
        loop {
            let mut discharged = false;
            for v in 0..network.vertex_count() {
                if v == source || v == sink || self.excess[v] < 1 {
                    continue;
                }
                self.discharge(&mut network, v);
                discharged = true;
            }
            rounds += 1;
            if !discharged {
                break;
            }
        }
        debug!("{} rounds, {} relabels", rounds, self.relabels);
        self.slot.flow += self.excess[sink] - before;
        info!("{}: flow {}", self.name(), self.slot.flow);
        self.slot.network = Some(network);
        true
    }

    fn result(&self) -> Capacity {
        self.slot.flow
    }

    fn name(&self) -> &'static str {
        "preflow-push"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(network: Network) -> (Capacity, Network) {
        let mut algorithm = PreflowPush::default();
        algorithm.load_network(network);
        algorithm.reset();
        assert!(algorithm.run());
        let flow = algorithm.result();
        (flow, algorithm.store_network().unwrap())
    }

    #[test]
    fn two_paths() {
        let mut network = Network::new(4, 0, 3);
        network.insert_edge(0, 1, 3, true);
        network.insert_edge(1, 3, 2, true);
        network.insert_edge(0, 2, 2, true);
        network.insert_edge(2, 3, 3, true);
        let (flow, network) = run(network);
        assert_eq!(flow, 4);
        assert_eq!(network.check_flow(), Ok(()));
    }

    #[test]
    fn excess_returns_to_source() {
        // the source can push 10 but only 1 reaches the sink
        let mut network = Network::new(3, 0, 2);
        network.insert_edge(0, 1, 10, true);
        network.insert_edge(1, 2, 1, true);
        let (flow, network) = run(network);
        assert_eq!(flow, 1);
        assert_eq!(network.check_flow(), Ok(()));
        assert_eq!(network.outflow(0), 1);
    }

    #[test]
    fn no_path() {
        let mut network = Network::new(3, 0, 2);
        network.insert_edge(0, 1, 4, true);
        network.insert_edge(2, 1, 4, true);
        let (flow, network) = run(network);
        assert_eq!(flow, 0);
        assert_eq!(network.check_flow(), Ok(()));
    }

    #[test]
    fn single_edge() {
        let mut network = Network::new(2, 0, 1);
        network.insert_edge(0, 1, 9, true);
        assert_eq!(run(network).0, 9);
    }

    #[test]
    fn undirected_cycle() {
        let mut network = Network::new(4, 0, 2);
        network.insert_edge(0, 1, 3, false);
        network.insert_edge(1, 2, 2, false);
        network.insert_edge(2, 3, 4, false);
        network.insert_edge(3, 0, 1, false);
        let (flow, network) = run(network);
        assert_eq!(flow, 3);
        assert_eq!(network.check_flow(), Ok(()));
    }
}
