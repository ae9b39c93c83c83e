//! CAS-based concurrent matching.
//!
//! Clustering maintains the invariant that every cluster has a unique
//! representative `r` with `cluster_ids[r] == r`, and every member points
//! directly at `r`. Sequentially that is trivial; under concurrency two
//! cases need care: two neighbors matching each other at the same time,
//! and a vertex matching a partner that is itself matching a third vertex.
//! [`ClusteringState::match_vertices`] resolves both with a three-state
//! protocol (`UNMATCHED -> MATCHING -> MATCHED`) over atomic per-vertex
//! state, published matching partners, and a cycle tie-break in favor of
//! the smallest vertex id.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use rayon::prelude::*;

use crate::hypergraph::{Hypergraph, HypernodeId, NodeWeight};

pub const UNMATCHED: u8 = 0;
pub const MATCHING: u8 = 1;
pub const MATCHED: u8 = 2;

/// Shared state of one clustering pass.
pub struct ClusteringState {
    /// Matching protocol state per vertex.
    pub states: Vec<AtomicU8>,
    /// Cluster representative per vertex; fixed once the vertex is MATCHED.
    pub cluster_ids: Vec<AtomicU32>,
    /// Aggregated weight per representative.
    pub cluster_weights: Vec<AtomicI64>,
    /// Published matching partner, used for cycle detection.
    pub partners: Vec<AtomicU32>,
}

impl ClusteringState {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            states: (0..num_nodes).map(|_| AtomicU8::new(UNMATCHED)).collect(),
            cluster_ids: (0..num_nodes as u32).map(AtomicU32::new).collect(),
            cluster_weights: (0..num_nodes).map(|_| AtomicI64::new(0)).collect(),
            partners: (0..num_nodes as u32).map(AtomicU32::new).collect(),
        }
    }

    /// Reset every vertex to a singleton cluster of its own weight.
    pub fn reset(&self, hg: &Hypergraph) {
        (0..self.states.len()).into_par_iter().for_each(|i| {
            self.states[i].store(UNMATCHED, Ordering::Relaxed);
            self.cluster_ids[i].store(i as u32, Ordering::Relaxed);
            self.partners[i].store(i as u32, Ordering::Relaxed);
            let weight = if hg.node_is_enabled(i as HypernodeId) {
                hg.node_weight(i as HypernodeId)
            } else {
                0
            };
            self.cluster_weights[i].store(weight, Ordering::Relaxed);
        });
    }

    #[inline]
    pub fn cluster_of(&self, u: HypernodeId) -> HypernodeId {
        self.cluster_ids[u as usize].load(Ordering::Acquire)
    }

    /// Try to put `u` into the cluster of `v`. Returns whether `u` joined a
    /// cluster (of `v`, of `v`'s representative, or — during conflict
    /// resolution — as the breaker of a matching cycle).
    ///
    /// The thread that wins the `UNMATCHED -> MATCHING` CAS on `u` owns `u`:
    /// only an owner changes `cluster_ids[u]`. Weight caps are re-checked on
    /// every retry path; the last writer of a cluster weight linearizes.
    pub fn match_vertices(
        &self,
        hg: &Hypergraph,
        u: HypernodeId,
        v: HypernodeId,
        max_allowed_node_weight: NodeWeight,
    ) -> bool {
        let ui = u as usize;
        let vi = v as usize;
        let weight_u = hg.node_weight(u);
        let weight_v = self.cluster_weights[vi].load(Ordering::Acquire);
        if weight_u + weight_v > max_allowed_node_weight {
            return false;
        }

        let mut success = false;
        if self.states[ui]
            .compare_exchange(UNMATCHED, MATCHING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.partners[ui].store(v, Ordering::Release);

        let state_v = self.states[vi].load(Ordering::Acquire);
        if state_v == MATCHED {
            // v is stable; join its cluster, following to the representative
            // and re-checking the weight cap if v is not its own.
            success = self.join_cluster_of(u, v, weight_u, max_allowed_node_weight);
        } else if self.states[vi]
            .compare_exchange(UNMATCHED, MATCHING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // This thread owns both endpoints; v becomes the representative.
            self.cluster_ids[ui].store(v, Ordering::Release);
            self.cluster_weights[vi].fetch_add(weight_u, Ordering::AcqRel);
            self.states[vi].store(MATCHED, Ordering::Release);
            success = true;
        } else {
            // v is MATCHING elsewhere: wait for it to stabilize, resolving a
            // possible cyclic matching dependency. The cycle member with the
            // smallest id breaks the cycle.
            while self.states[vi].load(Ordering::Acquire) == MATCHING {
                let mut cur = u;
                let mut smallest = u;
                loop {
                    let next = self.partners[cur as usize].load(Ordering::Acquire);
                    if next == u || next == cur {
                        break;
                    }
                    cur = next;
                    smallest = smallest.min(cur);
                }
                let in_cycle = self.partners[cur as usize].load(Ordering::Acquire) == u;
                if in_cycle && u == smallest {
                    self.cluster_ids[ui].store(v, Ordering::Release);
                    self.cluster_weights[vi].fetch_add(weight_u, Ordering::AcqRel);
                    self.states[vi].store(MATCHED, Ordering::Release);
                    self.states[ui].store(MATCHED, Ordering::Release);
                    success = true;
                    break;
                }
                std::hint::spin_loop();
            }
            if self.states[ui].load(Ordering::Acquire) == MATCHING {
                // v got matched elsewhere in the meantime; retry against the
                // representative of its cluster.
                debug_assert_eq!(self.states[vi].load(Ordering::Acquire), MATCHED);
                success = self.join_cluster_of(u, v, weight_u, max_allowed_node_weight);
            }
        }

        self.partners[ui].store(u, Ordering::Release);
        self.states[ui].store(MATCHED, Ordering::Release);
        success
    }

    fn join_cluster_of(
        &self,
        u: HypernodeId,
        v: HypernodeId,
        weight_u: NodeWeight,
        max_allowed_node_weight: NodeWeight,
    ) -> bool {
        let representative = self.cluster_ids[v as usize].load(Ordering::Acquire);
        if representative == u {
            // After cycle resolution the chain can lead back to u itself;
            // u then stays the representative of its own cluster.
            return false;
        }
        let cluster_weight = self.cluster_weights[representative as usize].load(Ordering::Acquire);
        if weight_u + cluster_weight <= max_allowed_node_weight {
            debug_assert_eq!(
                self.states[representative as usize].load(Ordering::Acquire),
                MATCHED
            );
            self.cluster_ids[u as usize].store(representative, Ordering::Release);
            self.cluster_weights[representative as usize].fetch_add(weight_u, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    /// Settle the clustering after a concurrent matching phase: compress
    /// every vertex onto its final representative and recount the
    /// aggregated cluster weights exactly. Adversarial interleavings of
    /// the matching protocol can leave short representative chains; this
    /// pass runs once per level, after all matching tasks joined.
    pub fn normalize(&self, hg: &Hypergraph) {
        for u in hg.nodes() {
            let mut path = Vec::new();
            let mut cur = u;
            let root = loop {
                let next = self.cluster_ids[cur as usize].load(Ordering::Acquire);
                if next == cur {
                    break cur;
                }
                if next == u || path.contains(&next) {
                    // Stale mutual links form a loop; its smallest id wins.
                    let mut root = u.min(cur).min(next);
                    for &p in &path {
                        root = root.min(p);
                    }
                    self.cluster_ids[root as usize].store(root, Ordering::Release);
                    break root;
                }
                path.push(cur);
                cur = next;
            };
            self.cluster_ids[u as usize].store(root, Ordering::Release);
            for &p in &path {
                self.cluster_ids[p as usize].store(root, Ordering::Release);
            }
        }
        for u in hg.nodes() {
            self.cluster_weights[u as usize].store(0, Ordering::Release);
        }
        for u in hg.nodes() {
            let root = self.cluster_ids[u as usize].load(Ordering::Acquire);
            self.cluster_weights[root as usize].fetch_add(hg.node_weight(u), Ordering::AcqRel);
        }
    }

    /// Verify the cluster invariant and aggregated weights against ground
    /// truth. Debug-only surface; a no-op in release builds.
    pub fn debug_check_clustering(&self, hg: &Hypergraph) {
        if !cfg!(debug_assertions) {
            return;
        }
        let mut expected = vec![0 as NodeWeight; self.cluster_weights.len()];
        for u in hg.nodes() {
            let root = self.cluster_of(u);
            assert_eq!(
                self.cluster_of(root),
                root,
                "vertex {u} points at non-representative {root}"
            );
            expected[root as usize] += hg.node_weight(u);
        }
        for u in hg.nodes() {
            let root = self.cluster_of(u);
            if root == u {
                assert_eq!(
                    expected[u as usize],
                    self.cluster_weights[u as usize].load(Ordering::Acquire),
                    "wrong aggregated weight for representative {u}"
                );
            }
        }
    }
}
