//! A single localized k-way FM search.
//!
//! The search starts from a seed vertex, claims vertices through the shared
//! node tracker, and keeps one block priority queue (keyed by the best
//! vertex gain of each block) over per-block vertex queues. Keys are lazy:
//! the gain of the popped candidate is recomputed against the gain cache
//! and the candidate is reinserted if it deteriorated. Successful moves go
//! through the balance-checked move and are published to the shared log;
//! the neighbors of every moved vertex are activated.

use hashbrown::HashSet;
use log::trace;

use crate::context::Context;
use crate::hypergraph::pq::IndexedMaxHeap;
use crate::hypergraph::{
    Gain, HypernodeId, NodeWeight, PartitionId, PartitionedHypergraph, INVALID_PARTITION,
};
use crate::refinement::fm::{FmSharedData, Move};

pub struct LocalizedKWayFm {
    this_search: u32,
    /// Top-level PQ over blocks, keyed by their best vertex gain.
    block_pq: IndexedMaxHeap,
    /// One vertex PQ per block, keyed by gain.
    vertex_pqs: Vec<IndexedMaxHeap>,
    update_deduplicator: HashSet<HypernodeId>,
}

impl LocalizedKWayFm {
    pub fn new(num_nodes: usize, k: usize) -> Self {
        Self {
            this_search: 0,
            block_pq: IndexedMaxHeap::new(k),
            vertex_pqs: (0..k).map(|_| IndexedMaxHeap::new(num_nodes)).collect(),
            update_deduplicator: HashSet::new(),
        }
    }

    /// Run one localized search from `seed`.
    pub fn find_moves(
        &mut self,
        phg: &PartitionedHypergraph,
        shared: &FmSharedData,
        seed: HypernodeId,
        context: &Context,
        max_weights: &[NodeWeight],
    ) {
        self.this_search = shared.new_search();
        self.block_pq.clear();
        for pq in &mut self.vertex_pqs {
            pq.clear();
        }

        self.insert_or_update(phg, shared, seed, max_weights);
        let mut fruitless_moves = 0usize;
        while fruitless_moves < context.refinement.fm.max_fruitless_moves {
            let Some(m) = self.find_next_move(phg, max_weights) else {
                break;
            };
            shared.deactivate(m.node, self.this_search);
            if !phg.change_node_part_with_balance_check(
                m.node,
                m.from,
                m.to,
                max_weights[m.to as usize],
            ) {
                continue;
            }
            let move_id = shared.insert_move(m);
            shared.record_move_on_edges(phg, &m, move_id);
            trace!(
                "search {}: move {} of vertex {} from {} to {} (gain {})",
                self.this_search,
                move_id,
                m.node,
                m.from,
                m.to,
                m.gain
            );
            fruitless_moves = if m.gain > 0 { 0 } else { fruitless_moves + 1 };

            for &e in phg.incident_edges(m.node) {
                if phg.edge_size(e) < context.refinement.fm.hyperedge_size_activation_threshold {
                    for &v in phg.pins(e) {
                        if self.update_deduplicator.insert(v) {
                            self.insert_or_update(phg, shared, v, max_weights);
                        }
                    }
                }
            }
            self.update_deduplicator.clear();
        }
    }

    /// Claim and activate `u`, or refresh its key if this search already
    /// holds it.
    fn insert_or_update(
        &mut self,
        phg: &PartitionedHypergraph,
        shared: &FmSharedData,
        u: HypernodeId,
        max_weights: &[NodeWeight],
    ) {
        let owner = shared.owner(u);
        if owner == self.this_search {
            let from = phg.part_id(u) as usize;
            if self.vertex_pqs[from].contains(u) {
                let (_, gain) = self.best_destination(phg, u, max_weights);
                self.vertex_pqs[from].adjust_key(u, gain);
                self.sync_block(from as PartitionId);
            }
        } else if shared.try_claim(u, self.this_search) {
            let from = phg.part_id(u);
            let (to, gain) = self.best_destination(phg, u, max_weights);
            if to != INVALID_PARTITION {
                self.vertex_pqs[from as usize].insert(u, gain);
                self.sync_block(from);
            }
        }
    }

    /// Best target block by cached penalty, subject to the weight caps.
    fn best_destination(
        &self,
        phg: &PartitionedHypergraph,
        u: HypernodeId,
        max_weights: &[NodeWeight],
    ) -> (PartitionId, Gain) {
        let from = phg.part_id(u);
        let weight = phg.node_weight(u);
        let mut to = INVALID_PARTITION;
        let mut to_penalty = Gain::MAX;
        for block in 0..max_weights.len() as PartitionId {
            if block == from {
                continue;
            }
            let penalty = phg.move_to_penalty(u, block);
            if penalty < to_penalty
                && phg.part_weight(block) + weight <= max_weights[block as usize]
            {
                to_penalty = penalty;
                to = block;
            }
        }
        if to == INVALID_PARTITION {
            (to, Gain::MIN)
        } else {
            (to, phg.move_from_benefit(u) - to_penalty)
        }
    }

    /// Pop the best (block, vertex) pair, lazily refreshing stale keys.
    fn find_next_move(
        &mut self,
        phg: &PartitionedHypergraph,
        max_weights: &[NodeWeight],
    ) -> Option<Move> {
        while !self.block_pq.is_empty() {
            let from = self.block_pq.top() as PartitionId;
            let u = self.vertex_pqs[from as usize].top();
            let estimated_gain = self.vertex_pqs[from as usize].top_key();
            let (to, gain) = self.best_destination(phg, u, max_weights);
            if to == INVALID_PARTITION {
                self.vertex_pqs[from as usize].remove(u);
                self.sync_block(from);
                continue;
            }
            if gain >= estimated_gain {
                self.vertex_pqs[from as usize].remove(u);
                self.sync_block(from);
                return Some(Move {
                    node: u,
                    from,
                    to,
                    gain,
                });
            }
            self.vertex_pqs[from as usize].adjust_key(u, gain);
            self.sync_block(from);
        }
        None
    }

    /// Keep the block key equal to its best vertex gain.
    fn sync_block(&mut self, block: PartitionId) {
        let pq = &self.vertex_pqs[block as usize];
        if pq.is_empty() {
            if self.block_pq.contains(block as u32) {
                self.block_pq.remove(block as u32);
            }
        } else {
            self.block_pq.insert_or_adjust(block as u32, pq.top_key());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::hypergraph::tests::small_hypergraph;

    #[test]
    fn search_moves_an_obviously_misplaced_vertex() {
        // Vertex 3 belongs with block 0 ({0,1,2}); start it in block 1.
        let mut phg = PartitionedHypergraph::new(2, small_hypergraph());
        for (u, &b) in [0, 0, 0, 1, 1, 1, 1, 1, 0, 1].iter().enumerate() {
            phg.set_only_node_part(u as u32, b);
        }
        phg.initialize_partition();
        phg.initialize_gain_cache();

        let context = Context::default();
        let shared = FmSharedData::new(10, 8, 2);
        let mut search = LocalizedKWayFm::new(10, 2);
        search.find_moves(&phg, &shared, 3, &context, &[7, 7]);

        let moves = shared.finish_round();
        assert!(!moves.is_empty());
        // The first move is the seed with its strictly positive gain.
        assert_eq!(moves[0].node, 3);
        assert_eq!(moves[0].to, 0);
        assert!(moves[0].gain > 0);
        phg.debug_check_partition();
    }

    #[test]
    fn search_respects_weight_caps() {
        let mut phg = PartitionedHypergraph::new(2, small_hypergraph());
        for (u, &b) in [0, 0, 0, 1, 1, 1, 1, 1, 0, 1].iter().enumerate() {
            phg.set_only_node_part(u as u32, b);
        }
        phg.initialize_partition();
        phg.initialize_gain_cache();

        let context = Context::default();
        let shared = FmSharedData::new(10, 8, 2);
        let mut search = LocalizedKWayFm::new(10, 2);
        // Block 0 already carries weight 4 and may not grow.
        search.find_moves(&phg, &shared, 3, &context, &[4, 10]);
        assert_eq!(phg.part_weight(0), 4);
        assert!(shared.finish_round().iter().all(|m| m.to != 0));
    }
}
