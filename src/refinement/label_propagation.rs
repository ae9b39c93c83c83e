//! Label-propagation refinement.
//!
//! Randomized parallel sweeps over the border vertices: each vertex moves
//! to the block with the highest positive gain that keeps the balance
//! constraint, using the linearizable balance-checked move as the only
//! synchronization. Converges in a bounded number of sweeps.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use log::debug;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::context::Context;
use crate::hypergraph::{
    Gain, HypernodeId, PartitionId, PartitionedHypergraph, INVALID_PARTITION,
};
use crate::parallel::with_local_rng;
use crate::refinement::Refiner;

pub struct LabelPropagationRefiner;

impl LabelPropagationRefiner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LabelPropagationRefiner {
    fn default() -> Self {
        Self::new()
    }
}

impl Refiner for LabelPropagationRefiner {
    fn refine(&mut self, phg: &mut PartitionedHypergraph, context: &Context) -> Gain {
        let max_weights = &context.partition.max_part_weights;
        let k = max_weights.len();
        let mut total_gain: Gain = 0;
        for round in 0..context.refinement.label_propagation.max_rounds {
            let mut active: Vec<HypernodeId> =
                phg.nodes().filter(|&u| phg.is_border_node(u)).collect();
            if active.is_empty() {
                break;
            }
            with_local_rng(|rng| active.shuffle(rng));

            let moved = AtomicUsize::new(0);
            let round_gain = AtomicI64::new(0);
            let phg_ref: &PartitionedHypergraph = phg;
            active
                .par_iter()
                .for_each_init(|| vec![0 as Gain; k], |in_block, &u| {
                    let from = phg_ref.part_id(u);
                    let (to, gain) = best_move(phg_ref, u, from, max_weights, in_block);
                    if to != INVALID_PARTITION
                        && gain > 0
                        && phg_ref.change_node_part_with_balance_check(
                            u,
                            from,
                            to,
                            max_weights[to as usize],
                        )
                    {
                        moved.fetch_add(1, Ordering::Relaxed);
                        round_gain.fetch_add(gain, Ordering::Relaxed);
                    }
                });

            let gain = round_gain.load(Ordering::Relaxed);
            debug!(
                "label propagation round {round}: {} moves, gain {gain}",
                moved.load(Ordering::Relaxed)
            );
            total_gain += gain;
            if moved.load(Ordering::Relaxed) == 0 {
                break;
            }
        }
        phg.debug_check_partition();
        total_gain.max(0)
    }
}

/// Best target block and its `km1` gain, computed in `O(deg(u))` via the
/// connectivity sets of the incident nets.
fn best_move(
    phg: &PartitionedHypergraph,
    u: HypernodeId,
    from: PartitionId,
    max_weights: &[i64],
    in_block: &mut [Gain],
) -> (PartitionId, Gain) {
    in_block.fill(0);
    let mut benefit: Gain = 0;
    let mut incident_weight: Gain = 0;
    for &e in phg.incident_edges(u) {
        let we = phg.edge_weight(e);
        incident_weight += we;
        if phg.pin_count_in_part(e, from) == 1 {
            benefit += we;
        }
        for block in phg.connectivity_set(e) {
            if (block as usize) < in_block.len() {
                in_block[block as usize] += we;
            }
        }
    }

    let weight_u = phg.node_weight(u);
    let mut best = (INVALID_PARTITION, Gain::MIN);
    for (block, &connected) in in_block.iter().enumerate() {
        let to = block as PartitionId;
        if to == from {
            continue;
        }
        if phg.part_weight(to) + weight_u > max_weights[block] {
            continue;
        }
        let gain = benefit - (incident_weight - connected);
        // Ties go to the lighter block to nudge towards balance.
        if gain > best.1
            || (gain == best.1
                && best.0 != INVALID_PARTITION
                && phg.part_weight(to) < phg.part_weight(best.0))
        {
            best = (to, gain);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::hypergraph::tests::small_hypergraph;
    use crate::metrics;

    #[test]
    fn improves_a_bad_bipartition() {
        // Put the two tightly-connected halves across the cut on purpose.
        let mut phg = PartitionedHypergraph::new(2, small_hypergraph());
        for (u, &b) in [0, 1, 0, 1, 0, 1, 0, 1, 0, 1].iter().enumerate() {
            phg.set_only_node_part(u as u32, b);
        }
        phg.initialize_partition();
        let before = metrics::km1(&phg);

        let mut context = Context::default();
        context.partition.k = 2;
        context.partition.epsilon = 0.3;
        context.setup_part_weights(10);
        let mut refiner = LabelPropagationRefiner::new();
        refiner.refine(&mut phg, &context);
        let after = metrics::km1(&phg);
        assert!(after <= before);
        assert!(metrics::is_balanced(&phg, &context.partition.max_part_weights));
    }

    #[test]
    fn leaves_an_optimal_partition_alone() {
        let mut phg = PartitionedHypergraph::new(2, small_hypergraph());
        for (u, &b) in [0, 0, 0, 0, 1, 1, 1, 1, 0, 1].iter().enumerate() {
            phg.set_only_node_part(u as u32, b);
        }
        phg.initialize_partition();
        let before = metrics::km1(&phg);
        let mut context = Context::default();
        context.partition.k = 2;
        context.partition.epsilon = 0.03;
        context.setup_part_weights(10);
        let mut refiner = LabelPropagationRefiner::new();
        refiner.refine(&mut phg, &context);
        assert!(metrics::km1(&phg) <= before);
    }
}
