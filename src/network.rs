use std::collections::VecDeque;
use std::fmt;

pub type Capacity = i64;

/// Index of an edge inside a [`Network`]. Edges come in pairs: the forward
/// edge sits at an even index and its reverse right after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(usize);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
    pub fn reverse(self) -> Self {
        EdgeId(self.0 ^ 1)
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    pub start: usize,
    pub finish: usize,
    pub capacity: Capacity,
    pub flow: Capacity,
}

impl Edge {
    pub fn residual_capacity(&self) -> Capacity {
        self.capacity - self.flow
    }
}

#[derive(Clone, Debug)]
pub struct Network {
    /// source node
    source: usize,
    /// sink node
    sink: usize,
    /// edge storage, paired as (2k, 2k + 1)
    edges: Vec<Edge>,
    /// most recently inserted edge starting at each vertex
    last_edge: Vec<Option<EdgeId>>,
    /// next edge in the incidence list of the edge's start vertex
    previous_edge: Vec<Option<EdgeId>>,
}

/// Cursor over the incidence list of one vertex.
///
/// An outgoing view yields the stored edges (those starting at the vertex),
/// a backward view yields their reverses (those finishing at the vertex).
#[derive(Clone, Copy, Debug)]
pub struct View {
    cursor: Option<EdgeId>,
    backward: bool,
}

impl View {
    pub fn current(&self) -> Option<EdgeId> {
        self.cursor
            .map(|id| if self.backward { id.reverse() } else { id })
    }

    pub fn pop(&mut self, network: &Network) {
        if let Some(id) = self.cursor {
            self.cursor = network.previous_edge[id.index()];
        }
    }

    pub fn iter(self, network: &Network) -> ViewIter<'_> {
        ViewIter {
            view: self,
            network,
        }
    }
}

pub struct ViewIter<'a> {
    view: View,
    network: &'a Network,
}

impl Iterator for ViewIter<'_> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.view.current()?;
        self.view.pop(self.network);
        Some(current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowViolation {
    Antisymmetry { edge: usize },
    Capacity { edge: usize, flow: Capacity, capacity: Capacity },
    Conservation { vertex: usize, excess: Capacity },
}

impl fmt::Display for FlowViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowViolation::Antisymmetry { edge } => {
                write!(f, "edge {edge} and its reverse carry non-opposite flow")
            }
            FlowViolation::Capacity {
                edge,
                flow,
                capacity,
            } => write!(f, "edge {edge} carries {flow} over capacity {capacity}"),
            FlowViolation::Conservation { vertex, excess } => {
                write!(f, "vertex {vertex} keeps excess {excess}")
            }
        }
    }
}

impl std::error::Error for FlowViolation {}

impl Network {
    pub fn new(n: usize, source: usize, sink: usize) -> Self {
        assert!(source < n, "source {source} out of range for {n} vertices");
        assert!(sink < n, "sink {sink} out of range for {n} vertices");
        assert_ne!(source, sink, "source and sink must differ");
        Network {
            source,
            sink,
            edges: vec![],
            last_edge: vec![None; n],
            previous_edge: vec![],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.last_edge.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn sink(&self) -> usize {
        self.sink
    }

    fn base_insert_edge(&mut self, from: usize, to: usize, capacity: Capacity) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.previous_edge.push(self.last_edge[from]);
        self.last_edge[from] = Some(id);
        self.edges.push(Edge {
            start: from,
            finish: to,
            capacity,
            flow: 0,
        });
        id
    }

    /// Inserts `from -> to` together with its reverse edge and returns the
    /// forward one. An undirected edge gives the reverse the same capacity.
    pub fn insert_edge(
        &mut self,
        from: usize,
        to: usize,
        capacity: Capacity,
        directed: bool,
    ) -> EdgeId {
        let n = self.vertex_count();
        assert!(from < n && to < n, "edge {from} -> {to} out of range");
        assert!(capacity >= 0, "negative capacity {capacity}");
        let id = self.base_insert_edge(from, to, capacity);
        self.base_insert_edge(to, from, if directed { 0 } else { capacity });
        id
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(index, edge)| (EdgeId(index), edge))
    }

    pub fn residual_capacity(&self, id: EdgeId) -> Capacity {
        self.edges[id.index()].residual_capacity()
    }

    pub fn vertex_edge_list(&self, v: usize) -> View {
        View {
            cursor: self.last_edge[v],
            backward: false,
        }
    }

    pub fn vertex_back_edge_list(&self, v: usize) -> View {
        View {
            cursor: self.last_edge[v],
            backward: true,
        }
    }

    pub fn push_flow(&mut self, id: EdgeId, amount: Capacity) {
        debug_assert!(amount >= 0, "negative push {amount}");
        debug_assert!(
            amount <= self.residual_capacity(id),
            "push {amount} beyond residual {}",
            self.residual_capacity(id)
        );
        self.edges[id.index()].flow += amount;
        self.edges[id.reverse().index()].flow -= amount;
    }

    pub fn clear(&mut self) {
        self.edges.iter_mut().for_each(|edge| edge.flow = 0);
    }

    /// Net amount leaving `v`.
    pub fn outflow(&self, v: usize) -> Capacity {
        self.vertex_edge_list(v)
            .iter(self)
            .map(|id| self.edge(id).flow)
            .sum()
    }

    pub fn current_flow(&self) -> impl Iterator<Item = (usize, usize, Capacity)> + '_ {
        self.edges.iter().step_by(2).filter_map(|edge| {
            if edge.flow < 1 {
                return None;
            }
            Some((edge.start, edge.finish, edge.flow))
        })
    }

    pub fn saturated_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges().step_by(2).filter_map(|(id, edge)| {
            (edge.capacity > 0 && edge.residual_capacity() == 0).then_some(id)
        })
    }

    /// Vertices reachable from the source in the residual graph. After a
    /// maximum flow this is the source side of a minimum cut.
    pub fn min_cut_source_side(&self) -> Vec<bool> {
        let mut reached = vec![false; self.vertex_count()];
        let mut queue = VecDeque::new();
        reached[self.source] = true;
        queue.push_back(self.source);
        while let Some(v) = queue.pop_front() {
            for id in self.vertex_edge_list(v).iter(self) {
                let u = self.edge(id).finish;
                if reached[u] || self.residual_capacity(id) < 1 {
                    continue;
                }
                reached[u] = true;
                queue.push_back(u);
            }
        }
        reached
    }

    pub fn check_flow(&self) -> Result<(), FlowViolation> {
        for (id, edge) in self.edges().step_by(2) {
            let reverse = self.edge(id.reverse());
            if edge.flow != -reverse.flow {
                return Err(FlowViolation::Antisymmetry { edge: id.index() });
            }
            for (index, e) in [(id.index(), edge), (id.reverse().index(), reverse)] {
                if e.flow > e.capacity {
                    return Err(FlowViolation::Capacity {
                        edge: index,
                        flow: e.flow,
                        capacity: e.capacity,
                    });
                }
            }
        }
        for v in (0..self.vertex_count()).filter(|&v| v != self.source && v != self.sink) {
            let excess = self.outflow(v);
            if excess != 0 {
                return Err(FlowViolation::Conservation { vertex: v, excess });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn diamond() -> Network {
        let mut network = Network::new(4, 0, 3);
        network.insert_edge(0, 1, 3, true);
        network.insert_edge(1, 3, 2, true);
        network.insert_edge(0, 2, 2, true);
        network.insert_edge(2, 3, 3, true);
        network
    }

    #[test]
    fn edges_are_paired() {
        let mut network = Network::new(3, 0, 2);
        let directed = network.insert_edge(0, 1, 5, true);
        let undirected = network.insert_edge(1, 2, 4, false);
        assert_eq!(network.edge_count(), 4);
        assert_eq!(directed.index(), 0);
        assert_eq!(undirected.index(), 2);
        assert_eq!(directed.reverse().index(), 1);
        assert_eq!(network.edge(directed.reverse()).start, 1);
        assert_eq!(network.edge(directed.reverse()).finish, 0);
        assert_eq!(network.edge(directed.reverse()).capacity, 0);
        assert_eq!(network.edge(undirected.reverse()).capacity, 4);
    }

    #[test]
    fn incidence_lists_share_storage() {
        let network = diamond();
        let outgoing: Vec<_> = network
            .vertex_edge_list(1)
            .iter(&network)
            .map(|id| (network.edge(id).start, network.edge(id).finish))
            .collect();
        // most recent first: 1 -> 3 was inserted after the reverse of 0 -> 1
        assert_eq!(outgoing, vec![(1, 3), (1, 0)]);
        let incoming: Vec<_> = network
            .vertex_back_edge_list(1)
            .iter(&network)
            .map(|id| (network.edge(id).start, network.edge(id).finish))
            .collect();
        assert_eq!(incoming, vec![(3, 1), (0, 1)]);
    }

    #[test]
    fn view_pops_until_empty() {
        let network = diamond();
        let mut view = network.vertex_edge_list(0);
        let mut seen = 0;
        while let Some(id) = view.current() {
            assert_eq!(network.edge(id).start, 0);
            view.pop(&network);
            seen += 1;
        }
        assert_eq!(seen, 2);
        assert!(view.current().is_none());
        view.pop(&network);
        assert!(view.current().is_none());
    }

    #[test]
    fn push_and_clear() {
        let mut network = diamond();
        let first = EdgeId(0);
        network.push_flow(first, 2);
        assert_eq!(network.edge(first).flow, 2);
        assert_eq!(network.edge(first.reverse()).flow, -2);
        assert_eq!(network.residual_capacity(first), 1);
        assert_eq!(network.residual_capacity(first.reverse()), 2);
        assert_eq!(
            network.check_flow(),
            Err(FlowViolation::Conservation {
                vertex: 1,
                excess: -2
            })
        );
        network.clear();
        assert!(network.edges().all(|(_, edge)| edge.flow == 0));
        assert_eq!(network.check_flow(), Ok(()));
    }

    #[test]
    fn read_back_after_manual_flow() {
        let mut network = diamond();
        // route 2 along each path by hand
        for id in [0, 2, 4, 6].map(EdgeId) {
            network.push_flow(id, 2);
        }
        assert_eq!(network.check_flow(), Ok(()));
        assert_eq!(network.outflow(0), 4);
        assert_eq!(network.outflow(3), -4);
        let flows: Vec<_> = network.current_flow().collect();
        assert_eq!(flows, vec![(0, 1, 2), (1, 3, 2), (0, 2, 2), (2, 3, 2)]);
        let saturated: Vec<_> = network.saturated_edges().map(EdgeId::index).collect();
        assert_eq!(saturated, vec![2, 4]);
        assert_eq!(network.min_cut_source_side(), vec![true, true, false, false]);
    }

    #[test]
    #[should_panic]
    fn out_of_range_vertex() {
        let mut network = Network::new(2, 0, 1);
        network.insert_edge(0, 2, 1, true);
    }
}
