//! Mutable hypergraph topology.
//!
//! The hypergraph stores vertices and hyperedges in dense id ranges with
//! *enabled* flags: coarsening disables entities in place instead of
//! compacting ids, so every id stays stable across the whole multilevel
//! hierarchy and iteration simply skips disabled elements.
//!
//! Contraction is invertible: [`Hypergraph::contract`] returns a
//! [`Memento`] recording, per hyperedge of the removed vertex, exactly how
//! the pin list changed. Mementos (and removed-net records) must be undone
//! in reverse order of creation; under that LIFO discipline
//! [`Hypergraph::uncontract`] restores the topology bit for bit.

use std::hash::Hasher;

use ahash::AHasher;

use crate::error::PartitionError;
use crate::hypergraph::{EdgeWeight, HyperedgeId, HypernodeId, NodeWeight};

/// Deterministic per-element hash; summing it over a pin set gives a
/// commutative set hash for parallel-net detection.
pub(crate) fn pin_hash(x: u64) -> u64 {
    let mut hasher = AHasher::default();
    hasher.write_u64(x);
    hasher.finish()
}

#[derive(Debug, Clone)]
struct Hypernode {
    weight: NodeWeight,
    community: u32,
    enabled: bool,
    /// Hyperedges this vertex currently participates in. Maintained by
    /// contraction and net removal; never contains disabled nets.
    incident_nets: Vec<HyperedgeId>,
}

#[derive(Debug, Clone)]
struct Hyperedge {
    weight: EdgeWeight,
    enabled: bool,
    pins: Vec<HypernodeId>,
}

/// How one hyperedge of the contraction partner was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeOpKind {
    /// The representative was already a pin; the partner's pin was removed
    /// from position `pos`.
    RemovedPin,
    /// The partner's slot at `pos` was rewritten to the representative, and
    /// the net was appended to the representative's incident list.
    ReplacedPin,
}

#[derive(Debug, Clone)]
struct EdgeOp {
    he: HyperedgeId,
    pos: u32,
    kind: EdgeOpKind,
}

/// Record of a single contraction, sufficient for an exact inverse.
#[derive(Debug, Clone)]
pub struct Memento {
    pub u: HypernodeId,
    pub v: HypernodeId,
    ops: Vec<EdgeOp>,
}

impl Memento {
    /// Nets that regain the partner as an additional pin when this memento
    /// is undone (the representative stays a pin of these nets).
    pub fn reinserted_nets(&self) -> impl Iterator<Item = HyperedgeId> + '_ {
        self.ops
            .iter()
            .filter(|op| op.kind == EdgeOpKind::RemovedPin)
            .map(|op| op.he)
    }
}

/// Record of a net disabled during coarsening, sufficient to re-link it.
#[derive(Debug, Clone)]
pub struct RemovedNet {
    pub he: HyperedgeId,
    /// For a parallel net: the surviving representative whose weight
    /// absorbed this net's weight.
    pub representative: Option<HyperedgeId>,
    /// `(pin, position in the pin's incident list)` at removal time.
    incidences: Vec<(HypernodeId, u32)>,
}

/// Mutable hypergraph with stable ids.
#[derive(Debug, Clone, Default)]
pub struct Hypergraph {
    hypernodes: Vec<Hypernode>,
    hyperedges: Vec<Hyperedge>,
    initial_num_pins: usize,
    current_num_nodes: usize,
    current_num_edges: usize,
    current_num_pins: usize,
    total_weight: NodeWeight,
    has_communities: bool,
}

impl Hypergraph {
    /// Construct from CSR-style arrays: `edge_indices` has `|E| + 1` offsets
    /// into `pins`. Missing weight slices default to 1. Duplicate pins
    /// within a net are rejected; pins out of range and non-positive
    /// weights are errors.
    pub fn from_csr(
        num_nodes: usize,
        edge_indices: &[usize],
        pins: &[u64],
        edge_weights: Option<&[EdgeWeight]>,
        node_weights: Option<&[NodeWeight]>,
    ) -> Result<Self, PartitionError> {
        let num_edges = edge_indices.len().saturating_sub(1);
        if num_nodes > HypernodeId::MAX as usize - 1 {
            return Err(PartitionError::TooManyEntities {
                entity: "vertex",
                count: num_nodes,
            });
        }
        if num_edges > HyperedgeId::MAX as usize - 1 {
            return Err(PartitionError::TooManyEntities {
                entity: "hyperedge",
                count: num_edges,
            });
        }
        if let Some(ws) = node_weights {
            for (i, &w) in ws.iter().enumerate() {
                if w <= 0 {
                    return Err(PartitionError::NonPositiveWeight {
                        entity: "vertex",
                        index: i,
                        weight: w,
                    });
                }
            }
        }
        if let Some(ws) = edge_weights {
            for (i, &w) in ws.iter().enumerate() {
                if w <= 0 {
                    return Err(PartitionError::NonPositiveWeight {
                        entity: "hyperedge",
                        index: i,
                        weight: w,
                    });
                }
            }
        }

        let mut hypernodes: Vec<Hypernode> = (0..num_nodes)
            .map(|i| Hypernode {
                weight: node_weights.map_or(1, |ws| ws[i]),
                community: 0,
                enabled: true,
                incident_nets: Vec::new(),
            })
            .collect();
        let mut hyperedges: Vec<Hyperedge> = Vec::with_capacity(num_edges);
        let mut num_pins = 0usize;
        for e in 0..num_edges {
            let lo = edge_indices[e];
            let hi = edge_indices[e + 1];
            let mut edge_pins: Vec<HypernodeId> = Vec::with_capacity(hi - lo);
            for &p in &pins[lo..hi] {
                if p >= num_nodes as u64 {
                    return Err(PartitionError::PinOutOfRange {
                        hyperedge: e,
                        pin: p,
                        num_nodes,
                    });
                }
                let p = p as HypernodeId;
                if !edge_pins.contains(&p) {
                    edge_pins.push(p);
                }
            }
            for &p in &edge_pins {
                hypernodes[p as usize].incident_nets.push(e as HyperedgeId);
            }
            num_pins += edge_pins.len();
            hyperedges.push(Hyperedge {
                weight: edge_weights.map_or(1, |ws| ws[e]),
                enabled: true,
                pins: edge_pins,
            });
        }

        let total_weight = hypernodes.iter().map(|hn| hn.weight).sum();
        Ok(Self {
            hypernodes,
            hyperedges,
            initial_num_pins: num_pins,
            current_num_nodes: num_nodes,
            current_num_edges: num_edges,
            current_num_pins: num_pins,
            total_weight,
            has_communities: false,
        })
    }

    // --- counts & global properties ------------------------------------

    /// Size of the vertex id range (including disabled vertices).
    #[inline]
    pub fn initial_num_nodes(&self) -> usize {
        self.hypernodes.len()
    }

    /// Size of the hyperedge id range (including disabled nets).
    #[inline]
    pub fn initial_num_edges(&self) -> usize {
        self.hyperedges.len()
    }

    #[inline]
    pub fn initial_num_pins(&self) -> usize {
        self.initial_num_pins
    }

    /// Number of enabled vertices.
    #[inline]
    pub fn current_num_nodes(&self) -> usize {
        self.current_num_nodes
    }

    /// Number of enabled hyperedges.
    #[inline]
    pub fn current_num_edges(&self) -> usize {
        self.current_num_edges
    }

    #[inline]
    pub fn current_num_pins(&self) -> usize {
        self.current_num_pins
    }

    /// Total weight of all enabled vertices. Invariant under contraction.
    #[inline]
    pub fn total_weight(&self) -> NodeWeight {
        self.total_weight
    }

    // --- vertex accessors ----------------------------------------------

    #[inline]
    pub fn node_is_enabled(&self, u: HypernodeId) -> bool {
        self.hypernodes[u as usize].enabled
    }

    #[inline]
    pub fn node_weight(&self, u: HypernodeId) -> NodeWeight {
        self.hypernodes[u as usize].weight
    }

    #[inline]
    pub fn set_node_weight(&mut self, u: HypernodeId, weight: NodeWeight) {
        self.hypernodes[u as usize].weight = weight;
    }

    #[inline]
    pub fn node_degree(&self, u: HypernodeId) -> usize {
        self.hypernodes[u as usize].incident_nets.len()
    }

    #[inline]
    pub fn community(&self, u: HypernodeId) -> u32 {
        self.hypernodes[u as usize].community
    }

    #[inline]
    pub fn has_communities(&self) -> bool {
        self.has_communities
    }

    /// Attach community tags (one per vertex). Coarsening only matches
    /// vertices within the same community once tags are present.
    pub fn set_communities(&mut self, communities: Vec<u32>) {
        debug_assert_eq!(communities.len(), self.hypernodes.len());
        for (hn, c) in self.hypernodes.iter_mut().zip(communities) {
            hn.community = c;
        }
        self.has_communities = true;
    }

    // --- hyperedge accessors -------------------------------------------

    #[inline]
    pub fn edge_is_enabled(&self, e: HyperedgeId) -> bool {
        self.hyperedges[e as usize].enabled
    }

    #[inline]
    pub fn edge_weight(&self, e: HyperedgeId) -> EdgeWeight {
        self.hyperedges[e as usize].weight
    }

    #[inline]
    pub fn set_edge_weight(&mut self, e: HyperedgeId, weight: EdgeWeight) {
        self.hyperedges[e as usize].weight = weight;
    }

    #[inline]
    pub fn edge_size(&self, e: HyperedgeId) -> usize {
        self.hyperedges[e as usize].pins.len()
    }

    /// Commutative hash of the pin set, used for parallel-net detection.
    pub fn edge_hash(&self, e: HyperedgeId) -> u64 {
        self.hyperedges[e as usize]
            .pins
            .iter()
            .fold(0u64, |acc, &p| acc.wrapping_add(pin_hash(p as u64)))
    }

    // --- iteration ------------------------------------------------------

    /// Iterate over enabled vertices.
    pub fn nodes(&self) -> impl Iterator<Item = HypernodeId> + '_ {
        self.hypernodes
            .iter()
            .enumerate()
            .filter(|(_, hn)| hn.enabled)
            .map(|(i, _)| i as HypernodeId)
    }

    /// Iterate over enabled hyperedges.
    pub fn edges(&self) -> impl Iterator<Item = HyperedgeId> + '_ {
        self.hyperedges
            .iter()
            .enumerate()
            .filter(|(_, he)| he.enabled)
            .map(|(i, _)| i as HyperedgeId)
    }

    /// Hyperedges incident to `u`.
    #[inline]
    pub fn incident_edges(&self, u: HypernodeId) -> &[HyperedgeId] {
        &self.hypernodes[u as usize].incident_nets
    }

    /// Pins of hyperedge `e`.
    #[inline]
    pub fn pins(&self, e: HyperedgeId) -> &[HypernodeId] {
        &self.hyperedges[e as usize].pins
    }

    // --- contraction ----------------------------------------------------

    /// Contract the vertex pair `(u, v)`: the representative `u` absorbs
    /// `v`'s weight and incidence, `v` is disabled.
    ///
    /// For each hyperedge `e` incident to `v`: if `u` is already a pin of
    /// `e`, `v` is removed from the pin list; otherwise `v`'s slot is
    /// rewritten to `u` and `e` joins `u`'s incident list.
    ///
    /// The caller must own both endpoints (the clustering protocol
    /// guarantees a unique writer per representative); the topology itself
    /// is single-writer during coarsening.
    pub fn contract(&mut self, u: HypernodeId, v: HypernodeId) -> Memento {
        debug_assert!(self.node_is_enabled(u), "representative {u} is disabled");
        debug_assert!(self.node_is_enabled(v), "partner {v} is disabled");
        debug_assert!(u != v);
        debug_assert!(
            !self.has_communities || self.community(u) == self.community(v),
            "cross-community contraction ({u}, {v})"
        );

        self.hypernodes[u as usize].weight += self.hypernodes[v as usize].weight;

        let nets_of_v = std::mem::take(&mut self.hypernodes[v as usize].incident_nets);
        let mut ops = Vec::with_capacity(nets_of_v.len());
        for &he in &nets_of_v {
            let pins = &mut self.hyperedges[he as usize].pins;
            let pos_v = pins
                .iter()
                .position(|&p| p == v)
                .expect("incident net without the vertex as pin") as u32;
            if pins.contains(&u) {
                pins.remove(pos_v as usize);
                self.current_num_pins -= 1;
                ops.push(EdgeOp {
                    he,
                    pos: pos_v,
                    kind: EdgeOpKind::RemovedPin,
                });
            } else {
                pins[pos_v as usize] = u;
                self.hypernodes[u as usize].incident_nets.push(he);
                ops.push(EdgeOp {
                    he,
                    pos: pos_v,
                    kind: EdgeOpKind::ReplacedPin,
                });
            }
        }
        self.hypernodes[v as usize].incident_nets = nets_of_v;
        self.hypernodes[v as usize].enabled = false;
        self.current_num_nodes -= 1;

        Memento { u, v, ops }
    }

    /// Undo a contraction. Only valid as the exact inverse of the most
    /// recent not-yet-undone mutation (LIFO discipline).
    pub fn uncontract(&mut self, memento: &Memento) {
        let Memento { u, v, ops } = memento;
        debug_assert!(self.node_is_enabled(*u), "representative {u} is disabled");
        debug_assert!(!self.node_is_enabled(*v), "partner {v} is still enabled");

        self.hypernodes[*v as usize].enabled = true;
        self.current_num_nodes += 1;
        for op in ops.iter().rev() {
            let pins = &mut self.hyperedges[op.he as usize].pins;
            match op.kind {
                EdgeOpKind::RemovedPin => {
                    pins.insert(op.pos as usize, *v);
                    self.current_num_pins += 1;
                }
                EdgeOpKind::ReplacedPin => {
                    debug_assert_eq!(pins[op.pos as usize], *u);
                    pins[op.pos as usize] = *v;
                    let popped = self.hypernodes[*u as usize].incident_nets.pop();
                    debug_assert_eq!(popped, Some(op.he));
                }
            }
        }
        let v_weight = self.hypernodes[*v as usize].weight;
        self.hypernodes[*u as usize].weight -= v_weight;
    }

    // --- net removal / restore -----------------------------------------

    /// Disable hyperedge `e` and unlink it from all pin incident lists.
    /// Pass the surviving representative for a parallel net (its weight
    /// must be adjusted by the caller), `None` for a single-pin net.
    pub fn remove_edge(&mut self, e: HyperedgeId, representative: Option<HyperedgeId>) -> RemovedNet {
        debug_assert!(self.edge_is_enabled(e), "hyperedge {e} is disabled");
        let pins = std::mem::take(&mut self.hyperedges[e as usize].pins);
        let mut incidences = Vec::with_capacity(pins.len());
        for &p in &pins {
            let nets = &mut self.hypernodes[p as usize].incident_nets;
            let pos = nets
                .iter()
                .position(|&he| he == e)
                .expect("pin without the net in its incident list") as u32;
            nets.remove(pos as usize);
            incidences.push((p, pos));
        }
        self.hyperedges[e as usize].pins = pins;
        self.hyperedges[e as usize].enabled = false;
        self.current_num_edges -= 1;
        self.current_num_pins -= incidences.len();
        RemovedNet {
            he: e,
            representative,
            incidences,
        }
    }

    /// Re-enable a removed net with its recorded pin list, re-linking it at
    /// the recorded incident-list positions. Only valid in reverse removal
    /// order (LIFO discipline).
    pub fn restore_edge(&mut self, net: &RemovedNet) {
        debug_assert!(!self.edge_is_enabled(net.he), "hyperedge already enabled");
        self.hyperedges[net.he as usize].enabled = true;
        self.current_num_edges += 1;
        self.current_num_pins += net.incidences.len();
        for &(p, pos) in net.incidences.iter().rev() {
            self.hypernodes[p as usize]
                .incident_nets
                .insert(pos as usize, net.he);
        }
    }

    // --- debug invariants ----------------------------------------------

    /// Recompute incidence ground truth and panic on divergence. Debug-only
    /// surface; a no-op in release builds.
    pub fn debug_check_integrity(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let mut num_nodes = 0usize;
        let mut total = 0;
        for (i, hn) in self.hypernodes.iter().enumerate() {
            if !hn.enabled {
                continue;
            }
            num_nodes += 1;
            total += hn.weight;
            for &he in &hn.incident_nets {
                assert!(
                    self.hyperedges[he as usize].enabled,
                    "vertex {i} linked to disabled net {he}"
                );
                assert!(
                    self.hyperedges[he as usize].pins.contains(&(i as HypernodeId)),
                    "vertex {i} not a pin of incident net {he}"
                );
            }
        }
        assert_eq!(num_nodes, self.current_num_nodes);
        assert_eq!(total, self.total_weight);
        let mut num_edges = 0usize;
        let mut num_pins = 0usize;
        for (e, he) in self.hyperedges.iter().enumerate() {
            if !he.enabled {
                continue;
            }
            num_edges += 1;
            num_pins += he.pins.len();
            let mut seen = he.pins.clone();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), he.pins.len(), "duplicate pins in net {e}");
            for &p in &he.pins {
                assert!(
                    self.hypernodes[p as usize].enabled,
                    "net {e} contains disabled pin {p}"
                );
                assert!(
                    self.hypernodes[p as usize]
                        .incident_nets
                        .contains(&(e as HyperedgeId)),
                    "net {e} missing from incident list of pin {p}"
                );
            }
        }
        assert_eq!(num_edges, self.current_num_edges);
        assert_eq!(num_pins, self.current_num_pins);
    }
}

/// Convenience constructor used by tests and the reader: build from explicit
/// pin lists instead of CSR offsets.
#[derive(Debug, Default)]
pub struct HypergraphBuilder {
    num_nodes: usize,
    nets: Vec<Vec<u64>>,
    edge_weights: Option<Vec<EdgeWeight>>,
    node_weights: Option<Vec<NodeWeight>>,
}

impl HypergraphBuilder {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            ..Default::default()
        }
    }

    pub fn add_net(mut self, pins: &[u64]) -> Self {
        self.nets.push(pins.to_vec());
        self
    }

    pub fn with_edge_weights(mut self, weights: Vec<EdgeWeight>) -> Self {
        self.edge_weights = Some(weights);
        self
    }

    pub fn with_node_weights(mut self, weights: Vec<NodeWeight>) -> Self {
        self.node_weights = Some(weights);
        self
    }

    pub fn build(self) -> Result<Hypergraph, PartitionError> {
        let mut edge_indices = Vec::with_capacity(self.nets.len() + 1);
        let mut pins = Vec::new();
        edge_indices.push(0);
        for net in &self.nets {
            pins.extend_from_slice(net);
            edge_indices.push(pins.len());
        }
        Hypergraph::from_csr(
            self.num_nodes,
            &edge_indices,
            &pins,
            self.edge_weights.as_deref(),
            self.node_weights.as_deref(),
        )
    }
}
