//! Greedy rebalancing.
//!
//! Invoked once at the top level: while a block exceeds its maximum
//! weight, the vertex with the smallest objective loss that fits an
//! underloaded block is moved out. Termination is guaranteed because every
//! round strictly shrinks the overloaded weight or gives up.

use log::{debug, warn};

use crate::context::Context;
use crate::hypergraph::pq::IndexedMaxHeap;
use crate::hypergraph::{Gain, NodeWeight, PartitionId, PartitionedHypergraph, INVALID_PARTITION};

/// Move vertices out of overloaded blocks until the balance constraint
/// holds (or no admissible move remains). Returns the number of moves.
pub fn rebalance(phg: &mut PartitionedHypergraph, context: &Context) -> usize {
    let max_weights = &context.partition.max_part_weights;
    let k = max_weights.len() as PartitionId;
    let mut moves = 0usize;

    for block in 0..k {
        while phg.part_weight(block) > max_weights[block as usize] {
            // Order the block's vertices by gain of their best admissible
            // escape; keys are lazy and re-checked on pop.
            let mut pq = IndexedMaxHeap::new(phg.hypergraph().initial_num_nodes());
            let mut targets: Vec<PartitionId> = vec![INVALID_PARTITION; 0];
            targets.resize(phg.hypergraph().initial_num_nodes(), INVALID_PARTITION);
            for u in phg.nodes() {
                if phg.part_id(u) != block {
                    continue;
                }
                if let Some((to, gain)) = best_escape(phg, u, block, max_weights, k) {
                    pq.insert(u, gain);
                    targets[u as usize] = to;
                }
            }

            let mut moved_some = false;
            while phg.part_weight(block) > max_weights[block as usize] {
                let Some((u, _)) = pq.pop() else {
                    break;
                };
                let to = targets[u as usize];
                if phg.part_weight(to) + phg.node_weight(u) > max_weights[to as usize] {
                    // Target filled up meanwhile; re-rate once.
                    if let Some((to, gain)) = best_escape(phg, u, block, max_weights, k) {
                        pq.insert(u, gain);
                        targets[u as usize] = to;
                    }
                    continue;
                }
                phg.change_node_part(u, block, to);
                moves += 1;
                moved_some = true;
            }
            if !moved_some {
                warn!("block {block} cannot be rebalanced below its maximum weight");
                break;
            }
        }
    }
    if moves > 0 {
        debug!("rebalancer applied {moves} moves");
        phg.debug_check_partition();
    }
    moves
}

fn best_escape(
    phg: &PartitionedHypergraph,
    u: u32,
    from: PartitionId,
    max_weights: &[NodeWeight],
    k: PartitionId,
) -> Option<(PartitionId, Gain)> {
    let weight = phg.node_weight(u);
    let mut best: Option<(PartitionId, Gain)> = None;
    for to in 0..k {
        if to == from || phg.part_weight(to) + weight > max_weights[to as usize] {
            continue;
        }
        let gain = phg.compute_km1_gain(u, from, to);
        let better = match best {
            Some((best_to, best_gain)) => {
                gain > best_gain
                    || (gain == best_gain && phg.part_weight(to) < phg.part_weight(best_to))
            }
            None => true,
        };
        if better {
            best = Some((to, gain));
        }
    }
    best
}
