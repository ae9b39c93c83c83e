//! Flow hypergraph assembled by the flow-based refiner.
//!
//! A small append-only structure with the builder protocol the refiner
//! needs: nodes carry weights, hyperedges carry a capacity and a contiguous
//! pin range, the hyperedge under construction can be aborted, and
//! `finalize` freezes the instance and derives the node→hyperedge
//! incidence used by the cut-distance BFS and by max-flow solvers.

use crate::hypergraph::EdgeWeight;

/// Dense node id within a flow problem.
pub type FlowNodeId = u32;
/// Dense hyperedge id within a flow problem.
pub type FlowEdgeId = u32;
/// Hyperedge capacity.
pub type Capacity = EdgeWeight;

#[derive(Debug, Clone, Copy)]
struct FlowEdge {
    capacity: Capacity,
    first_pin: u32,
    num_pins: u32,
}

/// Weighted flow hypergraph under construction / after `finalize`.
#[derive(Debug, Default, Clone)]
pub struct FlowHypergraph {
    node_weights: Vec<i64>,
    edges: Vec<FlowEdge>,
    pins: Vec<FlowNodeId>,
    /// Set while a hyperedge is being assembled.
    open_edge: Option<FlowEdge>,
    /// CSR incidence node -> hyperedges, built by `finalize`.
    incidence_index: Vec<u32>,
    incidence: Vec<FlowEdgeId>,
    finalized: bool,
}

impl FlowHypergraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node; returns its id.
    pub fn add_node(&mut self, weight: i64) -> FlowNodeId {
        debug_assert!(!self.finalized);
        self.node_weights.push(weight);
        (self.node_weights.len() - 1) as FlowNodeId
    }

    #[inline]
    pub fn node_weight(&self, u: FlowNodeId) -> i64 {
        self.node_weights[u as usize]
    }

    #[inline]
    pub fn set_node_weight(&mut self, u: FlowNodeId, weight: i64) {
        self.node_weights[u as usize] = weight;
    }

    /// Open a new hyperedge; pins are appended via [`Self::add_pin`].
    pub fn start_hyperedge(&mut self, capacity: Capacity) {
        debug_assert!(self.open_edge.is_none(), "previous hyperedge still open");
        self.open_edge = Some(FlowEdge {
            capacity,
            first_pin: self.pins.len() as u32,
            num_pins: 0,
        });
    }

    pub fn add_pin(&mut self, pin: FlowNodeId) {
        let edge = self.open_edge.as_mut().expect("no open hyperedge");
        self.pins.push(pin);
        edge.num_pins += 1;
    }

    /// Commit the hyperedge under construction; returns its id.
    pub fn close_hyperedge(&mut self) -> FlowEdgeId {
        let edge = self.open_edge.take().expect("no open hyperedge");
        self.edges.push(edge);
        (self.edges.len() - 1) as FlowEdgeId
    }

    /// Abort the hyperedge under construction, discarding its pins.
    pub fn remove_current_hyperedge(&mut self) {
        let edge = self.open_edge.take().expect("no open hyperedge");
        self.pins.truncate(edge.first_pin as usize);
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.node_weights.len()
    }

    #[inline]
    pub fn num_hyperedges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn num_pins(&self) -> usize {
        self.pins.len()
    }

    #[inline]
    pub fn capacity(&self, e: FlowEdgeId) -> Capacity {
        self.edges[e as usize].capacity
    }

    /// Merge another (identical) net's weight into this hyperedge.
    #[inline]
    pub fn add_capacity(&mut self, e: FlowEdgeId, amount: Capacity) {
        self.edges[e as usize].capacity += amount;
    }

    #[inline]
    pub fn pin_count(&self, e: FlowEdgeId) -> usize {
        self.edges[e as usize].num_pins as usize
    }

    #[inline]
    pub fn pins_of(&self, e: FlowEdgeId) -> &[FlowNodeId] {
        let edge = &self.edges[e as usize];
        &self.pins[edge.first_pin as usize..(edge.first_pin + edge.num_pins) as usize]
    }

    /// Hyperedges incident to `u`. Only valid after [`Self::finalize`].
    pub fn hyperedges_of(&self, u: FlowNodeId) -> &[FlowEdgeId] {
        debug_assert!(self.finalized, "incidence requires finalize()");
        let lo = self.incidence_index[u as usize] as usize;
        let hi = self.incidence_index[u as usize + 1] as usize;
        &self.incidence[lo..hi]
    }

    /// Freeze the instance and build the node→hyperedge incidence.
    pub fn finalize(&mut self) {
        debug_assert!(self.open_edge.is_none(), "hyperedge still open");
        let n = self.node_weights.len();
        let mut degree = vec![0u32; n + 1];
        for &p in &self.pins {
            degree[p as usize + 1] += 1;
        }
        for i in 0..n {
            degree[i + 1] += degree[i];
        }
        let mut incidence = vec![0 as FlowEdgeId; self.pins.len()];
        let mut cursor = degree.clone();
        for (e, edge) in self.edges.iter().enumerate() {
            for &p in &self.pins[edge.first_pin as usize..(edge.first_pin + edge.num_pins) as usize]
            {
                incidence[cursor[p as usize] as usize] = e as FlowEdgeId;
                cursor[p as usize] += 1;
            }
        }
        self.incidence_index = degree;
        self.incidence = incidence;
        self.finalized = true;
    }

    pub fn total_node_weight(&self) -> i64 {
        self.node_weights.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_protocol() {
        let mut fhg = FlowHypergraph::new();
        let a = fhg.add_node(0);
        let b = fhg.add_node(2);
        let c = fhg.add_node(3);
        fhg.start_hyperedge(5);
        fhg.add_pin(a);
        fhg.add_pin(b);
        let e0 = fhg.close_hyperedge();
        fhg.start_hyperedge(1);
        fhg.add_pin(b);
        fhg.add_pin(c);
        fhg.remove_current_hyperedge();
        fhg.start_hyperedge(4);
        fhg.add_pin(a);
        fhg.add_pin(c);
        let e1 = fhg.close_hyperedge();
        fhg.finalize();

        assert_eq!(fhg.num_nodes(), 3);
        assert_eq!(fhg.num_hyperedges(), 2);
        assert_eq!(fhg.num_pins(), 4);
        assert_eq!(fhg.capacity(e0), 5);
        assert_eq!(fhg.pins_of(e1), &[a, c]);
        assert_eq!(fhg.hyperedges_of(a), &[e0, e1]);
        assert_eq!(fhg.hyperedges_of(b), &[e0]);
        assert_eq!(fhg.total_node_weight(), 5);
    }

    #[test]
    fn capacity_merge_accumulates() {
        let mut fhg = FlowHypergraph::new();
        let a = fhg.add_node(1);
        let b = fhg.add_node(1);
        fhg.start_hyperedge(3);
        fhg.add_pin(a);
        fhg.add_pin(b);
        let e = fhg.close_hyperedge();
        fhg.add_capacity(e, 5);
        assert_eq!(fhg.capacity(e), 8);
    }
}
