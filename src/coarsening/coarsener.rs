//! Multilevel clustering coarsener.
//!
//! One pass: shuffle the vertices, rate and match them in parallel through
//! the CAS protocol, then drain the matched clusters into in-place
//! contractions and sparsify the shrunken hypergraph (single-pin and
//! parallel nets). Every pass records a [`Level`] so the uncoarsener can
//! walk the hierarchy in reverse.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use log::debug;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::coarsening::clustering::{ClusteringState, UNMATCHED};
use crate::coarsening::rating::VertexPairRater;
use crate::context::Context;
use crate::hypergraph::hypergraph::{Memento, RemovedNet};
use crate::hypergraph::{Hypergraph, HyperedgeId, HypernodeId, INVALID_NODE};
use crate::parallel::with_local_rng;

/// One level of the contraction hierarchy: the contractions of a pass and
/// the nets sparsified directly afterwards, in application order.
pub struct Level {
    pub mementos: Vec<Memento>,
    pub removed_nets: Vec<RemovedNet>,
}

/// Iterative parallel clustering coarsener.
pub struct MultilevelCoarsener {
    state: ClusteringState,
    rater: VertexPairRater,
    levels: Vec<Level>,
    current_vertices: Vec<HypernodeId>,
    pass_nr: usize,
}

impl MultilevelCoarsener {
    pub fn new(hg: &Hypergraph, context: &Context) -> Self {
        Self {
            state: ClusteringState::new(hg.initial_num_nodes()),
            rater: VertexPairRater::new(context),
            levels: Vec::new(),
            current_vertices: (0..hg.initial_num_nodes() as HypernodeId).collect(),
            pass_nr: 0,
        }
    }

    /// Coarsening continues while the contraction limit is not reached.
    pub fn should_not_terminate(&self, hg: &Hypergraph, context: &Context) -> bool {
        hg.current_num_nodes() > context.coarsening.contraction_limit as usize
    }

    /// Levels recorded so far (most recent last).
    pub fn into_levels(self) -> Vec<Level> {
        self.levels
    }

    /// One coarsening pass. Returns `false` when the pass would shrink the
    /// hypergraph by less than the minimum shrink factor (no contraction is
    /// applied in that case).
    pub fn pass(&mut self, hg: &mut Hypergraph, context: &Context) -> bool {
        let num_before = hg.current_num_nodes();
        if num_before <= 1 {
            return false;
        }
        self.state.reset(hg);
        with_local_rng(|rng| self.current_vertices.shuffle(rng));

        // A single pass may not shrink below nodes / maximum_shrink_factor.
        let hierarchy_limit = ((num_before as f64 / context.coarsening.maximum_shrink_factor)
            .ceil() as usize)
            .max(context.coarsening.contraction_limit as usize);
        let contracted = AtomicU64::new(0);

        let hg_ref: &Hypergraph = hg;
        self.current_vertices.par_iter().for_each(|&u| {
            if !hg_ref.node_is_enabled(u)
                || self.state.states[u as usize].load(Ordering::Acquire) != UNMATCHED
            {
                return;
            }
            if num_before - contracted.load(Ordering::Relaxed) as usize <= hierarchy_limit {
                return;
            }
            let rating = with_local_rng(|rng| {
                self.rater.rate(
                    hg_ref,
                    u,
                    &self.state,
                    context.coarsening.max_allowed_node_weight,
                    rng,
                )
            });
            if rating.target != INVALID_NODE
                && self.state.match_vertices(
                    hg_ref,
                    u,
                    rating.target,
                    context.coarsening.max_allowed_node_weight,
                )
            {
                contracted.fetch_add(1, Ordering::Relaxed);
            }
        });
        self.state.normalize(hg);
        self.state.debug_check_clustering(hg);

        let num_after = num_before - contracted.load(Ordering::Relaxed) as usize;
        let reduction = num_before as f64 / num_after.max(1) as f64;
        debug!(
            "coarsening pass {}: {} -> {} nodes (reduction {:.3})",
            self.pass_nr, num_before, num_after, reduction
        );
        if reduction <= context.coarsening.minimum_shrink_factor {
            return false;
        }

        // Drain matched clusters into contractions. Representatives are
        // fixed points of the cluster function, so iteration order among
        // members is irrelevant.
        let mut mementos = Vec::with_capacity(num_before - num_after);
        for u in 0..hg.initial_num_nodes() as HypernodeId {
            if !hg.node_is_enabled(u) {
                continue;
            }
            let representative = self.state.cluster_of(u);
            if representative != u {
                debug_assert_eq!(self.state.cluster_of(representative), representative);
                mementos.push(hg.contract(representative, u));
            }
        }

        let removed_nets = remove_single_pin_and_parallel_nets(hg);
        hg.debug_check_integrity();
        self.levels.push(Level {
            mementos,
            removed_nets,
        });
        self.pass_nr += 1;
        true
    }
}

/// Disable nets that carry no information at the current level: nets with
/// fewer than two pins, and duplicates of identical (parallel) nets, whose
/// weight is added onto the surviving representative.
pub fn remove_single_pin_and_parallel_nets(hg: &mut Hypergraph) -> Vec<RemovedNet> {
    let mut removed = Vec::new();
    let single: Vec<HyperedgeId> = hg.edges().filter(|&e| hg.edge_size(e) <= 1).collect();
    for e in single {
        removed.push(hg.remove_edge(e, None));
    }

    let mut buckets: HashMap<u64, Vec<HyperedgeId>> = HashMap::new();
    for e in hg.edges() {
        buckets.entry(hg.edge_hash(e)).or_default().push(e);
    }
    let mut duplicates: Vec<(HyperedgeId, HyperedgeId)> = Vec::new();
    for bucket in buckets.values() {
        if bucket.len() < 2 {
            continue;
        }
        let mut sorted_pins: Vec<(Vec<HypernodeId>, HyperedgeId)> = bucket
            .iter()
            .map(|&e| {
                let mut pins = hg.pins(e).to_vec();
                pins.sort_unstable();
                (pins, e)
            })
            .collect();
        sorted_pins.sort();
        for window in sorted_pins.windows(2) {
            if window[0].0 == window[1].0 {
                // Representative is the first net of an identical run.
                let rep = duplicates
                    .iter()
                    .rev()
                    .find(|&&(_, dup)| dup == window[0].1)
                    .map(|&(rep, _)| rep)
                    .unwrap_or(window[0].1);
                duplicates.push((rep, window[1].1));
            }
        }
    }
    for (rep, dup) in duplicates {
        let weight = hg.edge_weight(dup);
        hg.set_edge_weight(rep, hg.edge_weight(rep) + weight);
        removed.push(hg.remove_edge(dup, Some(rep)));
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::HypergraphBuilder;

    #[test]
    fn pass_contracts_a_clique() {
        let hg = HypergraphBuilder::new(6)
            .add_net(&[0, 1])
            .add_net(&[1, 2])
            .add_net(&[2, 0])
            .add_net(&[3, 4])
            .add_net(&[4, 5])
            .add_net(&[0, 3])
            .build()
            .unwrap();
        let mut hg = hg;
        let mut context = Context::default();
        context.coarsening.contraction_limit = 2;
        context.coarsening.max_allowed_node_weight = 100;
        context.coarsening.minimum_shrink_factor = 1.0;
        let mut coarsener = MultilevelCoarsener::new(&hg, &context);
        assert!(coarsener.pass(&mut hg, &context));
        assert!(hg.current_num_nodes() < 6);
        hg.debug_check_integrity();
    }

    #[test]
    fn single_pin_nets_are_removed() {
        let mut hg = HypergraphBuilder::new(3)
            .add_net(&[0])
            .add_net(&[0, 1, 2])
            .build()
            .unwrap();
        let removed = remove_single_pin_and_parallel_nets(&mut hg);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].he, 0);
        assert_eq!(hg.current_num_edges(), 1);
    }

    #[test]
    fn parallel_nets_merge_weights() {
        let mut hg = HypergraphBuilder::new(4)
            .add_net(&[0, 1, 2])
            .add_net(&[2, 1, 0])
            .add_net(&[0, 1, 3])
            .with_edge_weights(vec![3, 5, 1])
            .build()
            .unwrap();
        let removed = remove_single_pin_and_parallel_nets(&mut hg);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].representative, Some(0));
        assert_eq!(hg.edge_weight(0), 8);
        assert_eq!(hg.current_num_edges(), 2);
    }

    #[test]
    fn removed_nets_restore_in_reverse() {
        let mut hg = HypergraphBuilder::new(4)
            .add_net(&[0, 1])
            .add_net(&[1, 0])
            .add_net(&[2])
            .add_net(&[1, 2, 3])
            .build()
            .unwrap();
        let reference = hg.clone();
        let removed = remove_single_pin_and_parallel_nets(&mut hg);
        for net in removed.iter().rev() {
            if let Some(rep) = net.representative {
                let w = hg.edge_weight(net.he);
                hg.set_edge_weight(rep, hg.edge_weight(rep) - w);
            }
            hg.restore_edge(net);
        }
        hg.debug_check_integrity();
        for e in reference.edges() {
            assert_eq!(hg.pins(e), reference.pins(e));
            assert_eq!(hg.edge_weight(e), reference.edge_weight(e));
        }
        for u in reference.nodes() {
            assert_eq!(hg.incident_edges(u), reference.incident_edges(u));
        }
    }
}
