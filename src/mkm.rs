//! Malhotra–Kumar–Maheshwari blocking flow.
//!
//! Every phase layers the residual graph by BFS distance from the source and
//! saturates it with a blocking flow. The blocking flow is built by picking
//! the vertex with the smallest throughput potential and spreading exactly
//! that much flow through it towards both the sink and the source, so the
//! picked vertex always becomes saturated and leaves the layered graph.

use std::collections::VecDeque;

use tracing::{debug, info, trace};

use crate::{
    algorithm::{FlowFindingAlgorithm, Slot},
    network::{Capacity, EdgeId, Network, View},
};

/// Potential that never bottlenecks: the source's income and the sink's
/// outcome.
pub const INFINITE_POTENTIAL: Capacity = Capacity::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VertexState {
    Valid,
    CandidateToDelete,
    Deleted,
}

#[derive(Default)]
pub struct MalhotraKumarMaheshwari {
    slot: Slot,
    /// BFS distance from the source, `n` if unreached
    slice: Vec<usize>,
    /// reaches the sink through layered residual edges
    to_sink: Vec<bool>,
    state: Vec<VertexState>,
    /// residual capacity of valid incoming edges
    income_phi: Vec<Capacity>,
    /// residual capacity of valid outgoing edges
    outcome_phi: Vec<Capacity>,
    out_view: Vec<View>,
    in_view: Vec<View>,
    /// flow waiting to be spread further from a vertex
    pending: Vec<Capacity>,
    deletion: Vec<usize>,
    queue: VecDeque<usize>,
}

fn decrease(phi: &mut Capacity, amount: Capacity) {
    if *phi != INFINITE_POTENTIAL {
        *phi -= amount;
    }
}

fn increase(phi: &mut Capacity, amount: Capacity) {
    if *phi != INFINITE_POTENTIAL {
        *phi = phi.saturating_add(amount);
    }
}

impl MalhotraKumarMaheshwari {
    fn prepare(&mut self, n: usize) {
        self.slice = vec![n; n];
        self.to_sink = vec![false; n];
        self.state = vec![VertexState::Deleted; n];
        self.income_phi = vec![0; n];
        self.outcome_phi = vec![0; n];
        self.pending = vec![0; n];
        self.out_view.clear();
        self.in_view.clear();
        self.deletion.clear();
        self.queue.clear();
    }

    fn phi(&self, v: usize) -> Capacity {
        self.income_phi[v].min(self.outcome_phi[v])
    }

    fn is_layered(&self, network: &Network, id: EdgeId) -> bool {
        let edge = network.edge(id);
        edge.residual_capacity() > 0 && self.slice[edge.finish] == self.slice[edge.start] + 1
    }

    /// Layered residual edge between two vertices that are still in play.
    fn is_valid(&self, network: &Network, id: EdgeId) -> bool {
        let edge = network.edge(id);
        self.is_layered(network, id)
            && self.state[edge.start] != VertexState::Deleted
            && self.state[edge.finish] != VertexState::Deleted
    }

    /// Returns whether the sink is reachable.
    fn layering(&mut self, network: &Network) -> bool {
        let n = network.vertex_count();
        self.slice.fill(n);
        self.queue.clear();
        self.slice[network.source()] = 0;
        self.queue.push_back(network.source());
        while let Some(v) = self.queue.pop_front() {
            for id in network.vertex_edge_list(v).iter(network) {
                let edge = network.edge(id);
                if edge.residual_capacity() < 1 || self.slice[edge.finish] != n {
                    continue;
                }
                self.slice[edge.finish] = self.slice[v] + 1;
                self.queue.push_back(edge.finish);
            }
        }
        self.slice[network.sink()] != n
    }

    fn back_validation(&mut self, network: &Network) {
        self.to_sink.fill(false);
        self.queue.clear();
        self.to_sink[network.sink()] = true;
        self.queue.push_back(network.sink());
        while let Some(v) = self.queue.pop_front() {
            for id in network.vertex_back_edge_list(v).iter(network) {
                let from = network.edge(id).start;
                if self.to_sink[from] || !self.is_layered(network, id) {
                    continue;
                }
                self.to_sink[from] = true;
                self.queue.push_back(from);
            }
        }
    }

    fn compute_potentials(&mut self, network: &Network) {
        let n = network.vertex_count();
        for v in 0..n {
            self.state[v] = if self.slice[v] < n && self.to_sink[v] {
                VertexState::Valid
            } else {
                VertexState::Deleted
            };
        }
        self.income_phi.fill(0);
        self.outcome_phi.fill(0);
        self.income_phi[network.source()] = INFINITE_POTENTIAL;
        self.outcome_phi[network.sink()] = INFINITE_POTENTIAL;
        for v in (0..n).filter(|&v| self.state[v] == VertexState::Valid) {
            for id in network.vertex_edge_list(v).iter(network) {
                if !self.is_valid(network, id) {
                    continue;
                }
                let residual = network.residual_capacity(id);
                increase(&mut self.outcome_phi[v], residual);
                increase(&mut self.income_phi[network.edge(id).finish], residual);
            }
        }
        self.out_view = (0..n).map(|v| network.vertex_edge_list(v)).collect();
        self.in_view = (0..n).map(|v| network.vertex_back_edge_list(v)).collect();
        self.pending.fill(0);
        for v in 0..n {
            if self.phi(v) == 0 {
                self.schedule_deletion(v);
            }
        }
        self.cascade_deletion(network);
    }

    fn schedule_deletion(&mut self, v: usize) {
        if self.state[v] == VertexState::Valid {
            self.state[v] = VertexState::CandidateToDelete;
            self.deletion.push(v);
        }
    }

    /// Removes every scheduled vertex from the layered graph, withdrawing the
    /// capacity of its valid edges from the neighbours' potentials. Neighbours
    /// left without potential are removed as well.
    fn cascade_deletion(&mut self, network: &Network) {
        while let Some(v) = self.deletion.pop() {
            self.state[v] = VertexState::Deleted;
            for id in network.vertex_edge_list(v).iter(network) {
                let to = network.edge(id).finish;
                if self.state[to] == VertexState::Deleted || !self.is_layered(network, id) {
                    continue;
                }
                decrease(&mut self.income_phi[to], network.residual_capacity(id));
                if self.phi(to) == 0 {
                    self.schedule_deletion(to);
                }
            }
            for id in network.vertex_back_edge_list(v).iter(network) {
                let from = network.edge(id).start;
                if self.state[from] == VertexState::Deleted || !self.is_layered(network, id) {
                    continue;
                }
                decrease(&mut self.outcome_phi[from], network.residual_capacity(id));
                if self.phi(from) == 0 {
                    self.schedule_deletion(from);
                }
            }
        }
    }

    fn push(&mut self, network: &mut Network, id: EdgeId, amount: Capacity) {
        let (from, to) = {
            let edge = network.edge(id);
            (edge.start, edge.finish)
        };
        trace!("push {} along {} -> {}", amount, from, to);
        network.push_flow(id, amount);
        decrease(&mut self.outcome_phi[from], amount);
        decrease(&mut self.income_phi[to], amount);
    }

    /// Moves `amount` from `v` to the sink, layer by layer.
    fn spread_forward(&mut self, network: &mut Network, v: usize, amount: Capacity) {
        let sink = network.sink();
        self.queue.clear();
        self.pending[v] = amount;
        self.queue.push_back(v);
        while let Some(u) = self.queue.pop_front() {
            while self.pending[u] > 0 {
                let Some(id) = self.out_view[u].current() else {
                    break;
                };
                if !self.is_valid(network, id) {
                    self.out_view[u].pop(network);
                    continue;
                }
                let delta = self.pending[u].min(network.residual_capacity(id));
                self.push(network, id, delta);
                self.pending[u] -= delta;
                let to = network.edge(id).finish;
                if to != sink {
                    if self.pending[to] == 0 {
                        self.queue.push_back(to);
                    }
                    self.pending[to] += delta;
                }
            }
            debug_assert_eq!(self.pending[u], 0, "vertex {u} cannot forward its flow");
            self.pending[u] = 0;
        }
    }

    /// Pulls `amount` into `v` from the source, layer by layer.
    fn spread_backward(&mut self, network: &mut Network, v: usize, amount: Capacity) {
        let source = network.source();
        self.queue.clear();
        self.pending[v] = amount;
        self.queue.push_back(v);
        while let Some(u) = self.queue.pop_front() {
            while self.pending[u] > 0 {
                let Some(id) = self.in_view[u].current() else {
                    break;
                };
                if !self.is_valid(network, id) {
                    self.in_view[u].pop(network);
                    continue;
                }
                let delta = self.pending[u].min(network.residual_capacity(id));
                self.push(network, id, delta);
                self.pending[u] -= delta;
                let from = network.edge(id).start;
                if from != source {
                    if self.pending[from] == 0 {
                        self.queue.push_back(from);
                    }
                    self.pending[from] += delta;
                }
            }
            debug_assert_eq!(self.pending[u], 0, "vertex {u} cannot pull its flow");
            self.pending[u] = 0;
        }
    }

    fn blocking_flow(&mut self, network: &mut Network) -> Capacity {
        let (source, sink) = (network.source(), network.sink());
        let mut flow = 0;
        while self.state[source] == VertexState::Valid && self.state[sink] == VertexState::Valid {
            let Some(v) = (0..network.vertex_count())
                .filter(|&v| self.state[v] == VertexState::Valid)
                .min_by_key(|&v| self.phi(v))
            else {
                break;
            };
            let amount = self.phi(v);
            debug_assert!(amount > 0 && amount != INFINITE_POTENTIAL);
            trace!("spreading {} through vertex {}", amount, v);
            if v != sink {
                self.spread_forward(network, v, amount);
            }
            if v != source {
                self.spread_backward(network, v, amount);
            }
            flow += amount;
            for u in 0..network.vertex_count() {
                if self.state[u] == VertexState::Valid && self.phi(u) == 0 {
                    self.schedule_deletion(u);
                }
            }
            self.cascade_deletion(network);
        }
        flow
    }
}

impl FlowFindingAlgorithm for MalhotraKumarMaheshwari {
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
        self.prepare(network.vertex_count());
        let mut phases = 0;
        while self.layering(&network) {
            self.back_validation(&network);
            self.compute_potentials(&network);
            let flow = self.blocking_flow(&mut network);
            debug!(
                "phase {}: sink distance {}, blocking flow {}",
                phases,
                self.slice[network.sink()],
                flow
            );
            phases += 1;
            self.slot.flow += flow;
            if flow == 0 {
                break;
            }
        }
        info!("{}: flow {} after {} phases", self.name(), self.slot.flow, phases);
        self.slot.network = Some(network);
        true
    }

    fn result(&self) -> Capacity {
        self.slot.flow
    }

    fn name(&self) -> &'static str {
        "malhotra-kumar-maheshwari"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(network: Network) -> (Capacity, Network) {
        let mut algorithm = MalhotraKumarMaheshwari::default();
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
    fn maxflow_example() {
        let mut network = Network::new(6, 0, 5);
        for (from, to, capacity) in [
            (0, 1, 16),
            (0, 2, 13),
            (1, 2, 10),
            (1, 3, 12),
            (2, 1, 4),
            (2, 4, 14),
            (3, 2, 9),
            (3, 5, 20),
            (4, 3, 7),
            (4, 5, 4),
        ] {
            network.insert_edge(from, to, capacity, true);
        }
        let (flow, network) = run(network);
        assert_eq!(flow, 23);
        assert_eq!(network.check_flow(), Ok(()));
        assert_eq!(network.outflow(0), 23);
    }

    #[test]
    fn crossing_paths() {
        // routing through 1 -> 2 blocks both other paths
        let mut network = Network::new(6, 0, 5);
        network.insert_edge(0, 1, 1, true);
        network.insert_edge(1, 2, 1, true);
        network.insert_edge(2, 5, 1, true);
        network.insert_edge(0, 3, 1, true);
        network.insert_edge(3, 2, 1, true);
        network.insert_edge(1, 4, 1, true);
        network.insert_edge(4, 5, 1, true);
        let (flow, network) = run(network);
        assert_eq!(flow, 2);
        assert_eq!(network.check_flow(), Ok(()));
    }

    #[test]
    fn no_path() {
        let mut network = Network::new(4, 0, 3);
        network.insert_edge(0, 1, 5, true);
        network.insert_edge(2, 3, 5, true);
        network.insert_edge(3, 0, 5, true);
        let (flow, network) = run(network);
        assert_eq!(flow, 0);
        assert!(network.current_flow().next().is_none());
    }

    #[test]
    fn single_edge() {
        let mut network = Network::new(2, 0, 1);
        network.insert_edge(0, 1, 7, true);
        assert_eq!(run(network).0, 7);
    }

    #[test]
    fn undirected_and_parallel_edges() {
        let mut network = Network::new(3, 0, 2);
        network.insert_edge(0, 1, 2, false);
        network.insert_edge(0, 1, 3, true);
        network.insert_edge(2, 1, 4, false);
        network.insert_edge(0, 2, 1, false);
        let (flow, network) = run(network);
        assert_eq!(flow, 5);
        assert_eq!(network.check_flow(), Ok(()));
    }

    #[test]
    fn zero_capacity_edges_are_ignored() {
        let mut network = Network::new(3, 0, 2);
        network.insert_edge(0, 1, 0, true);
        network.insert_edge(1, 2, 5, true);
        assert_eq!(run(network).0, 0);
    }
}
