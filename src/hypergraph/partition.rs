//! k-way partition overlay.
//!
//! [`PartitionedHypergraph`] owns a [`Hypergraph`] plus every per-partition
//! aggregate the refiners need: part ids, block weights and sizes,
//! pin-count-in-part `p(e, i)`, per-edge connectivity sets, and an
//! optional `km1` gain cache. All move-path state lives in atomics so that
//! refiners can move vertices concurrently through a shared reference.
//!
//! A single move is atomic per touched cell: a concurrent reader observes
//! either the pre- or post-move value of each `(e, block)` counter, but no
//! cross-cell snapshot is provided.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, Ordering};

use rayon::prelude::*;

use crate::hypergraph::hypergraph::{Hypergraph, Memento, RemovedNet};
use crate::hypergraph::{
    EdgeWeight, Gain, HyperedgeId, HypernodeId, NodeWeight, PartitionId, INVALID_NODE,
    INVALID_PARTITION,
};

/// Hypergraph plus mutable k-way partition overlay.
pub struct PartitionedHypergraph {
    hg: Hypergraph,
    k: PartitionId,
    part_ids: Vec<AtomicI32>,
    part_weights: Vec<AtomicI64>,
    part_sizes: Vec<AtomicI64>,
    /// `p(e, i)` at index `e * k + i`. The single source of truth for
    /// the connectivity set: a block is in `Λ(e)` iff its cell is non-zero,
    /// so every move stays consistent per cell without a second structure.
    pin_count_in_part: Vec<AtomicU32>,
    gain_cache_initialized: bool,
    /// `moveFromBenefit(u)` for u's current block.
    move_from_benefit: Vec<AtomicI64>,
    /// `moveToPenalty(u, i)` at index `u * k + i`.
    move_to_penalty: Vec<AtomicI64>,
}

impl PartitionedHypergraph {
    /// Create an empty overlay (all vertices unassigned) over `hg`.
    pub fn new(k: PartitionId, hg: Hypergraph) -> Self {
        debug_assert!(k >= 2);
        let num_nodes = hg.initial_num_nodes();
        let num_edges = hg.initial_num_edges();
        Self {
            hg,
            k,
            part_ids: (0..num_nodes).map(|_| AtomicI32::new(INVALID_PARTITION)).collect(),
            part_weights: (0..k).map(|_| AtomicI64::new(0)).collect(),
            part_sizes: (0..k).map(|_| AtomicI64::new(0)).collect(),
            pin_count_in_part: (0..num_edges * k as usize).map(|_| AtomicU32::new(0)).collect(),
            gain_cache_initialized: false,
            move_from_benefit: Vec::new(),
            move_to_penalty: Vec::new(),
        }
    }

    /// Number of blocks the overlay was allocated for.
    #[inline]
    pub fn k(&self) -> PartitionId {
        self.k
    }

    #[inline]
    pub fn hypergraph(&self) -> &Hypergraph {
        &self.hg
    }

    /// Tear the overlay apart and return the topology.
    pub fn into_hypergraph(self) -> Hypergraph {
        self.hg
    }

    // --- delegated topology accessors ------------------------------------

    #[inline]
    pub fn node_weight(&self, u: HypernodeId) -> NodeWeight {
        self.hg.node_weight(u)
    }

    #[inline]
    pub fn edge_weight(&self, e: HyperedgeId) -> EdgeWeight {
        self.hg.edge_weight(e)
    }

    #[inline]
    pub fn edge_size(&self, e: HyperedgeId) -> usize {
        self.hg.edge_size(e)
    }

    #[inline]
    pub fn incident_edges(&self, u: HypernodeId) -> &[HyperedgeId] {
        self.hg.incident_edges(u)
    }

    #[inline]
    pub fn pins(&self, e: HyperedgeId) -> &[HypernodeId] {
        self.hg.pins(e)
    }

    #[inline]
    pub fn total_weight(&self) -> NodeWeight {
        self.hg.total_weight()
    }

    #[inline]
    pub fn current_num_nodes(&self) -> usize {
        self.hg.current_num_nodes()
    }

    pub fn nodes(&self) -> impl Iterator<Item = HypernodeId> + '_ {
        self.hg.nodes()
    }

    pub fn edges(&self) -> impl Iterator<Item = HyperedgeId> + '_ {
        self.hg.edges()
    }

    // --- partition queries ------------------------------------------------

    /// Block of `u`, or `INVALID_PARTITION` while unassigned.
    #[inline]
    pub fn part_id(&self, u: HypernodeId) -> PartitionId {
        self.part_ids[u as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn part_weight(&self, block: PartitionId) -> NodeWeight {
        self.part_weights[block as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn part_size(&self, block: PartitionId) -> i64 {
        self.part_sizes[block as usize].load(Ordering::Relaxed)
    }

    /// `p(e, block)`: number of enabled pins of `e` in `block`.
    #[inline]
    pub fn pin_count_in_part(&self, e: HyperedgeId, block: PartitionId) -> usize {
        self.pin_count_in_part[e as usize * self.k as usize + block as usize].load(Ordering::Relaxed)
            as usize
    }

    /// `|Λ(e)|`: number of blocks with at least one pin of `e`.
    pub fn connectivity(&self, e: HyperedgeId) -> PartitionId {
        self.connectivity_set(e).count() as PartitionId
    }

    /// Iterate over `Λ(e)`, the blocks with at least one pin of `e`.
    pub fn connectivity_set(&self, e: HyperedgeId) -> impl Iterator<Item = PartitionId> + '_ {
        let base = e as usize * self.k as usize;
        (0..self.k).filter(move |&block| {
            self.pin_count_in_part[base + block as usize].load(Ordering::Relaxed) > 0
        })
    }

    /// A border vertex has an incident net spanning more than one block.
    pub fn is_border_node(&self, u: HypernodeId) -> bool {
        self.hg
            .incident_edges(u)
            .iter()
            .any(|&e| self.connectivity(e) > 1)
    }

    // --- assignment --------------------------------------------------------

    /// Assign `u` without touching any aggregate. Must be followed by
    /// [`Self::initialize_partition`] before any partition query.
    #[inline]
    pub fn set_only_node_part(&self, u: HypernodeId, block: PartitionId) {
        debug_assert!(block >= 0 && block < self.k);
        self.part_ids[u as usize].store(block, Ordering::Relaxed);
    }

    /// Assign an unassigned vertex, maintaining every aggregate
    /// incrementally.
    pub fn set_node_part(&self, u: HypernodeId, block: PartitionId) {
        debug_assert!(block >= 0 && block < self.k);
        debug_assert_eq!(self.part_id(u), INVALID_PARTITION, "vertex {u} already assigned");
        self.part_ids[u as usize].store(block, Ordering::Relaxed);
        self.part_weights[block as usize].fetch_add(self.hg.node_weight(u), Ordering::Relaxed);
        self.part_sizes[block as usize].fetch_add(1, Ordering::Relaxed);
        for &e in self.hg.incident_edges(u) {
            let idx = e as usize * self.k as usize + block as usize;
            self.pin_count_in_part[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Recount all aggregates from the stored part ids. Used after a bulk
    /// [`Self::set_only_node_part`] pass.
    pub fn initialize_partition(&mut self) {
        for w in &self.part_weights {
            w.store(0, Ordering::Relaxed);
        }
        for s in &self.part_sizes {
            s.store(0, Ordering::Relaxed);
        }
        for c in &self.pin_count_in_part {
            c.store(0, Ordering::Relaxed);
        }
        let nodes: Vec<HypernodeId> = self.hg.nodes().collect();
        nodes.par_iter().for_each(|&u| {
            let block = self.part_id(u);
            debug_assert!(block != INVALID_PARTITION, "vertex {u} unassigned");
            self.part_weights[block as usize].fetch_add(self.hg.node_weight(u), Ordering::Relaxed);
            self.part_sizes[block as usize].fetch_add(1, Ordering::Relaxed);
        });
        let edges: Vec<HyperedgeId> = self.hg.edges().collect();
        edges.par_iter().for_each(|&e| {
            for &p in self.hg.pins(e) {
                let block = self.part_id(p);
                let idx = e as usize * self.k as usize + block as usize;
                self.pin_count_in_part[idx].fetch_add(1, Ordering::Relaxed);
            }
        });
        self.gain_cache_initialized = false;
    }

    /// Clear the overlay back to the unassigned state.
    pub fn reset_partition(&mut self) {
        for p in &self.part_ids {
            p.store(INVALID_PARTITION, Ordering::Relaxed);
        }
        for w in &self.part_weights {
            w.store(0, Ordering::Relaxed);
        }
        for s in &self.part_sizes {
            s.store(0, Ordering::Relaxed);
        }
        for c in &self.pin_count_in_part {
            c.store(0, Ordering::Relaxed);
        }
        self.gain_cache_initialized = false;
    }

    // --- moves --------------------------------------------------------------

    /// Move `u` from `from` to `to`, maintaining every aggregate. The update
    /// touches exactly the `(e, from)` and `(e, to)` counters of each
    /// incident net.
    pub fn change_node_part(&self, u: HypernodeId, from: PartitionId, to: PartitionId) {
        let moved = self.change_node_part_impl(u, from, to, None);
        debug_assert!(moved);
    }

    /// As [`Self::change_node_part`], but atomically reject the move iff it
    /// would push `to` above `max_weight`. Linearizable: no two concurrent
    /// successful moves can overshoot the cap together.
    pub fn change_node_part_with_balance_check(
        &self,
        u: HypernodeId,
        from: PartitionId,
        to: PartitionId,
        max_weight: NodeWeight,
    ) -> bool {
        self.change_node_part_impl(u, from, to, Some(max_weight))
    }

    fn change_node_part_impl(
        &self,
        u: HypernodeId,
        from: PartitionId,
        to: PartitionId,
        max_weight: Option<NodeWeight>,
    ) -> bool {
        debug_assert!(self.hg.node_is_enabled(u));
        debug_assert!(from >= 0 && from < self.k && to >= 0 && to < self.k && from != to);
        debug_assert_eq!(self.part_id(u), from, "vertex {u} is not in block {from}");
        let w = self.hg.node_weight(u);

        // The target-weight update is the linearization point of the
        // balance check.
        match max_weight {
            Some(max) => {
                let target = &self.part_weights[to as usize];
                let mut cur = target.load(Ordering::Relaxed);
                loop {
                    if cur + w > max {
                        return false;
                    }
                    match target.compare_exchange_weak(
                        cur,
                        cur + w,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => break,
                        Err(observed) => cur = observed,
                    }
                }
            }
            None => {
                self.part_weights[to as usize].fetch_add(w, Ordering::Relaxed);
            }
        }
        self.part_weights[from as usize].fetch_sub(w, Ordering::Relaxed);
        self.part_sizes[from as usize].fetch_sub(1, Ordering::Relaxed);
        self.part_sizes[to as usize].fetch_add(1, Ordering::Relaxed);
        self.part_ids[u as usize].store(to, Ordering::Relaxed);

        let k = self.k as usize;
        for &e in self.hg.incident_edges(u) {
            let base = e as usize * k;
            let pcf_after =
                self.pin_count_in_part[base + from as usize].fetch_sub(1, Ordering::AcqRel) - 1;
            let pct_after =
                self.pin_count_in_part[base + to as usize].fetch_add(1, Ordering::AcqRel) + 1;
            if self.gain_cache_initialized {
                self.gain_cache_delta(u, e, from, to, pcf_after, pct_after);
            }
        }
        if self.gain_cache_initialized {
            self.recompute_move_from_benefit(u);
        }
        true
    }

    // --- gain tables ----------------------------------------------------------

    /// Build the `km1` gain cache from the current partition. Refiners that
    /// use the cache must call this after any bulk partition change.
    pub fn initialize_gain_cache(&mut self) {
        let num_nodes = self.hg.initial_num_nodes();
        let k = self.k as usize;
        if self.move_from_benefit.len() != num_nodes {
            self.move_from_benefit = (0..num_nodes).map(|_| AtomicI64::new(0)).collect();
            self.move_to_penalty = (0..num_nodes * k).map(|_| AtomicI64::new(0)).collect();
        }
        let nodes: Vec<HypernodeId> = self.hg.nodes().collect();
        nodes.par_iter().for_each(|&u| {
            let from = self.part_id(u);
            let mut benefit: Gain = 0;
            let mut incident_weight: Gain = 0;
            let mut in_block = vec![0 as Gain; k];
            for &e in self.hg.incident_edges(u) {
                let we = self.hg.edge_weight(e);
                incident_weight += we;
                if self.pin_count_in_part(e, from) == 1 {
                    benefit += we;
                }
                for block in self.connectivity_set(e) {
                    in_block[block as usize] += we;
                }
            }
            self.move_from_benefit[u as usize].store(benefit, Ordering::Relaxed);
            for block in 0..k {
                self.move_to_penalty[u as usize * k + block]
                    .store(incident_weight - in_block[block], Ordering::Relaxed);
            }
        });
        self.gain_cache_initialized = true;
    }

    #[inline]
    pub fn is_gain_cache_initialized(&self) -> bool {
        self.gain_cache_initialized
    }

    /// Drop cache validity (e.g. after uncontractions); the next FM round
    /// re-initializes it.
    pub fn invalidate_gain_cache(&mut self) {
        self.gain_cache_initialized = false;
    }

    /// Cached `moveFromBenefit(u)`: total weight of incident nets that `u`
    /// is the last pin of in its current block.
    #[inline]
    pub fn move_from_benefit(&self, u: HypernodeId) -> Gain {
        debug_assert!(self.gain_cache_initialized);
        self.move_from_benefit[u as usize].load(Ordering::Relaxed)
    }

    /// Cached `moveToPenalty(u, block)`: total weight of incident nets with
    /// no pin in `block` yet.
    #[inline]
    pub fn move_to_penalty(&self, u: HypernodeId, block: PartitionId) -> Gain {
        debug_assert!(self.gain_cache_initialized);
        self.move_to_penalty[u as usize * self.k as usize + block as usize].load(Ordering::Relaxed)
    }

    /// Cached `km1` gain of moving `u` to `to`.
    #[inline]
    pub fn km1_gain(&self, u: HypernodeId, to: PartitionId) -> Gain {
        self.move_from_benefit(u) - self.move_to_penalty(u, to)
    }

    /// Recompute the cached benefit of `u` for its current block.
    pub fn recompute_move_from_benefit(&self, u: HypernodeId) {
        let from = self.part_id(u);
        let mut benefit: Gain = 0;
        for &e in self.hg.incident_edges(u) {
            if self.pin_count_in_part(e, from) == 1 {
                benefit += self.hg.edge_weight(e);
            }
        }
        self.move_from_benefit[u as usize].store(benefit, Ordering::Relaxed);
    }

    /// `km1` gain computed from pin counts alone, in `O(deg(u))`. Used where
    /// no cache is maintained (label propagation, move replay).
    pub fn compute_km1_gain(&self, u: HypernodeId, from: PartitionId, to: PartitionId) -> Gain {
        let mut gain: Gain = 0;
        for &e in self.hg.incident_edges(u) {
            let we = self.hg.edge_weight(e);
            if self.pin_count_in_part(e, from) == 1 {
                gain += we;
            }
            if self.pin_count_in_part(e, to) == 0 {
                gain -= we;
            }
        }
        gain
    }

    fn gain_cache_delta(
        &self,
        mover: HypernodeId,
        e: HyperedgeId,
        from: PartitionId,
        to: PartitionId,
        pcf_after: u32,
        pct_after: u32,
    ) {
        let k = self.k as usize;
        let we = self.hg.edge_weight(e);
        if pct_after == 1 {
            for &v in self.hg.pins(e) {
                self.move_to_penalty[v as usize * k + to as usize]
                    .fetch_sub(we, Ordering::Relaxed);
            }
        }
        if pcf_after == 0 {
            for &v in self.hg.pins(e) {
                self.move_to_penalty[v as usize * k + from as usize]
                    .fetch_add(we, Ordering::Relaxed);
            }
        }
        if pct_after == 2 {
            // The previously sole pin of `to` no longer benefits from leaving.
            for &v in self.hg.pins(e) {
                if v != mover && self.part_id(v) == to {
                    self.move_from_benefit[v as usize].fetch_sub(we, Ordering::Relaxed);
                    break;
                }
            }
        }
        if pcf_after == 1 {
            // Exactly one pin remains in `from`; it now benefits from leaving.
            for &v in self.hg.pins(e) {
                if self.part_id(v) == from {
                    self.move_from_benefit[v as usize].fetch_add(we, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    // --- coarsening interplay ----------------------------------------------

    /// Undo a contraction with the partition in place: `v` rejoins in `u`'s
    /// block and the pin counts of every net that regains `v` as a pin are
    /// adjusted. Invalidates the gain cache.
    pub fn uncontract(&mut self, memento: &Memento) {
        let block = self.part_id(memento.u);
        debug_assert!(block != INVALID_PARTITION);
        self.hg.uncontract(memento);
        self.part_ids[memento.v as usize].store(block, Ordering::Relaxed);
        self.part_sizes[block as usize].fetch_add(1, Ordering::Relaxed);
        for e in memento.reinserted_nets() {
            let idx = e as usize * self.k as usize + block as usize;
            self.pin_count_in_part[idx].fetch_add(1, Ordering::Relaxed);
        }
        self.gain_cache_initialized = false;
    }

    /// Disable a net and zero its partition counters.
    pub fn remove_edge(&mut self, e: HyperedgeId, representative: Option<HyperedgeId>) -> RemovedNet {
        let k = self.k as usize;
        for block in 0..k {
            self.pin_count_in_part[e as usize * k + block].store(0, Ordering::Relaxed);
        }
        self.hg.remove_edge(e, representative)
    }

    /// Restore a net removed during coarsening and immediately recount its
    /// pin counts and connectivity set, so no subsequent partition query
    /// observes stale counters for the restored edge. For a parallel net,
    /// the weight aggregated onto its representative is taken back.
    pub fn restore_edge(&mut self, net: &RemovedNet) {
        if let Some(rep) = net.representative {
            let w = self.hg.edge_weight(net.he);
            self.hg.set_edge_weight(rep, self.hg.edge_weight(rep) - w);
        }
        self.hg.restore_edge(net);
        let e = net.he;
        for &p in self.hg.pins(e) {
            let block = self.part_id(p);
            debug_assert!(block != INVALID_PARTITION);
            let idx = e as usize * self.k as usize + block as usize;
            self.pin_count_in_part[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    // --- subhypergraph extraction -------------------------------------------

    /// Extract the subhypergraph induced by `block`. Returns the extracted
    /// hypergraph and a mapping from original vertex ids to extracted ids
    /// (`INVALID_NODE` for vertices outside the block).
    ///
    /// With `cut_net_splitting` (connectivity objective) cut nets are kept
    /// restricted to their pins inside the block; otherwise (cut objective)
    /// cut nets are dropped entirely.
    pub fn extract(
        &self,
        block: PartitionId,
        cut_net_splitting: bool,
    ) -> (Hypergraph, Vec<HypernodeId>) {
        let mut mapping = vec![INVALID_NODE; self.hg.initial_num_nodes()];
        let mut node_weights = Vec::new();
        for u in self.hg.nodes() {
            if self.part_id(u) == block {
                mapping[u as usize] = node_weights.len() as HypernodeId;
                node_weights.push(self.hg.node_weight(u));
            }
        }

        let mut edge_indices = vec![0usize];
        let mut pins: Vec<u64> = Vec::new();
        let mut edge_weights = Vec::new();
        for e in self.hg.edges() {
            let pins_in_block = self.pin_count_in_part(e, block);
            if pins_in_block < 2 {
                continue;
            }
            let keep = if cut_net_splitting {
                true
            } else {
                pins_in_block == self.hg.edge_size(e)
            };
            if !keep {
                continue;
            }
            for &p in self.hg.pins(e) {
                if mapping[p as usize] != INVALID_NODE {
                    pins.push(mapping[p as usize] as u64);
                }
            }
            edge_indices.push(pins.len());
            edge_weights.push(self.hg.edge_weight(e));
        }

        let sub = Hypergraph::from_csr(
            node_weights.len(),
            &edge_indices,
            &pins,
            Some(&edge_weights),
            Some(&node_weights),
        )
        .expect("extracted subhypergraph is structurally valid");
        (sub, mapping)
    }

    // --- debug invariants ------------------------------------------------------

    /// Recount every overlay aggregate from ground truth and panic on
    /// divergence. Debug-only surface; a no-op in release builds.
    pub fn debug_check_partition(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let k = self.k as usize;
        let mut weights = vec![0 as NodeWeight; k];
        let mut sizes = vec![0i64; k];
        for u in self.hg.nodes() {
            let block = self.part_id(u);
            assert!(block != INVALID_PARTITION, "vertex {u} unassigned");
            weights[block as usize] += self.hg.node_weight(u);
            sizes[block as usize] += 1;
        }
        for block in 0..k {
            assert_eq!(weights[block], self.part_weight(block as PartitionId));
            assert_eq!(sizes[block], self.part_size(block as PartitionId));
        }
        for e in self.hg.edges() {
            let mut counts = vec![0usize; k];
            for &p in self.hg.pins(e) {
                counts[self.part_id(p) as usize] += 1;
            }
            let mut connectivity = 0;
            for (block, &c) in counts.iter().enumerate() {
                assert_eq!(
                    c,
                    self.pin_count_in_part(e, block as PartitionId),
                    "pin count mismatch for (net {e}, block {block})"
                );
                if c > 0 {
                    connectivity += 1;
                    assert!(self
                        .connectivity_set(e)
                        .any(|b| b == block as PartitionId));
                }
            }
            assert_eq!(connectivity, self.connectivity(e) as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::hypergraph::tests::small_hypergraph;

    fn partitioned_small(k: PartitionId, assignment: &[PartitionId]) -> PartitionedHypergraph {
        let mut phg = PartitionedHypergraph::new(k, small_hypergraph());
        for (u, &b) in assignment.iter().enumerate() {
            phg.set_only_node_part(u as HypernodeId, b);
        }
        phg.initialize_partition();
        phg
    }

    #[test]
    fn counts_after_initialization() {
        let phg = partitioned_small(3, &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        assert_eq!(phg.part_weight(0), 4);
        assert_eq!(phg.part_weight(1), 4);
        assert_eq!(phg.part_weight(2), 2);
        assert_eq!(phg.pin_count_in_part(4, 0), 2);
        assert_eq!(phg.pin_count_in_part(4, 1), 2);
        assert_eq!(phg.connectivity(4), 2);
        assert_eq!(phg.connectivity(0), 1);
        let set: Vec<_> = phg.connectivity_set(6).collect();
        assert_eq!(set, vec![0, 2]);
        phg.debug_check_partition();
    }

    #[test]
    fn change_node_part_updates_counters() {
        let phg = partitioned_small(3, &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        phg.change_node_part(3, 0, 1);
        assert_eq!(phg.part_id(3), 1);
        assert_eq!(phg.part_weight(0), 3);
        assert_eq!(phg.part_weight(1), 5);
        assert_eq!(phg.pin_count_in_part(6, 0), 0);
        assert_eq!(phg.pin_count_in_part(6, 1), 1);
        let set: Vec<_> = phg.connectivity_set(6).collect();
        assert_eq!(set, vec![1, 2]);
        phg.debug_check_partition();
    }

    #[test]
    fn reversing_a_move_restores_counters() {
        let phg = partitioned_small(3, &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        let before: Vec<usize> = (0..8)
            .flat_map(|e| (0..3).map(move |b| (e, b)))
            .map(|(e, b)| phg.pin_count_in_part(e, b))
            .collect();
        phg.change_node_part(1, 0, 2);
        phg.change_node_part(1, 2, 0);
        let after: Vec<usize> = (0..8)
            .flat_map(|e| (0..3).map(move |b| (e, b)))
            .map(|(e, b)| phg.pin_count_in_part(e, b))
            .collect();
        assert_eq!(before, after);
        phg.debug_check_partition();
    }

    #[test]
    fn balance_check_rejects_overweight_moves() {
        let phg = partitioned_small(2, &[0, 0, 0, 0, 1, 1, 1, 1, 1, 1]);
        assert_eq!(phg.part_weight(1), 6);
        assert!(!phg.change_node_part_with_balance_check(0, 0, 1, 6));
        assert_eq!(phg.part_id(0), 0);
        assert!(phg.change_node_part_with_balance_check(0, 0, 1, 7));
        assert_eq!(phg.part_id(0), 1);
        phg.debug_check_partition();
    }

    #[test]
    fn gain_cache_matches_direct_computation() {
        let mut phg = partitioned_small(3, &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        phg.initialize_gain_cache();
        for u in 0..10u32 {
            let from = phg.part_id(u);
            for to in 0..3 {
                if to == from {
                    continue;
                }
                assert_eq!(
                    phg.km1_gain(u, to),
                    phg.compute_km1_gain(u, from, to),
                    "gain mismatch for vertex {u} -> block {to}"
                );
            }
        }
    }

    #[test]
    fn gain_cache_stays_consistent_across_moves() {
        let mut phg = partitioned_small(3, &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        phg.initialize_gain_cache();
        let moves = [(1u32, 0, 1), (4u32, 1, 0), (6u32, 1, 2), (3u32, 0, 1)];
        for &(u, from, to) in &moves {
            phg.change_node_part(u, from, to);
            for v in 0..10u32 {
                let cur = phg.part_id(v);
                for to in 0..3 {
                    if to == cur {
                        continue;
                    }
                    assert_eq!(
                        phg.km1_gain(v, to),
                        phg.compute_km1_gain(v, cur, to),
                        "stale cache for vertex {v} -> block {to} after moving {u}"
                    );
                }
            }
        }
    }

    #[test]
    fn uncontract_restores_partition_counters() {
        let mut hg = small_hypergraph();
        let memento = hg.contract(1, 3);
        let mut phg = PartitionedHypergraph::new(2, hg);
        for u in [0u32, 1, 2] {
            phg.set_only_node_part(u, 0);
        }
        for u in [4u32, 5, 6, 7, 8, 9] {
            phg.set_only_node_part(u, 1);
        }
        phg.initialize_partition();
        phg.uncontract(&memento);
        assert_eq!(phg.part_id(3), 0);
        assert_eq!(phg.part_size(0), 4);
        phg.debug_check_partition();
    }

    #[test]
    fn extract_splits_cut_nets_for_km1() {
        let phg = partitioned_small(3, &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        let (sub, mapping) = phg.extract(0, true);
        // Vertices 0..4 are in block 0.
        assert_eq!(sub.initial_num_nodes(), 4);
        // Nets inside block 0: {0,1,3}, {1,2,3}; split cut nets {1,3} (from
        // {1,3,4,6}) and {0,1} (from {0,1,4,5}); single-pin rests dropped.
        assert_eq!(sub.initial_num_edges(), 4);
        assert_eq!(mapping[2], 2);
        assert_eq!(mapping[5], INVALID_NODE);

        let (sub_cut, _) = phg.extract(0, false);
        assert_eq!(sub_cut.initial_num_edges(), 2);
    }
}
