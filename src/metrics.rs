//! Partition quality metrics.
//!
//! All metrics recompute from the overlay's pin counts in `O(|E|)`;
//! they are the ground truth the driver and the tests compare against.

use crate::context::Objective;
use crate::hypergraph::{EdgeWeight, NodeWeight, PartitionedHypergraph};

/// Weight of hyperedges spanning more than one block.
pub fn cut(phg: &PartitionedHypergraph) -> EdgeWeight {
    phg.edges()
        .filter(|&e| phg.connectivity(e) > 1)
        .map(|e| phg.edge_weight(e))
        .sum()
}

/// Connectivity metric: `sum_e w(e) * (lambda(e) - 1)`.
pub fn km1(phg: &PartitionedHypergraph) -> EdgeWeight {
    phg.edges()
        .map(|e| phg.edge_weight(e) * (phg.connectivity(e) as EdgeWeight - 1))
        .sum()
}

/// The configured objective.
pub fn objective(phg: &PartitionedHypergraph, objective: Objective) -> EdgeWeight {
    match objective {
        Objective::Cut => cut(phg),
        Objective::Km1 => km1(phg),
    }
}

/// Maximum relative overload over the perfectly balanced part weights:
/// `max_i w(V_i) / perfect_i - 1`. Blocks beyond `perfect_weights.len()`
/// must be empty.
pub fn imbalance(phg: &PartitionedHypergraph, perfect_weights: &[NodeWeight]) -> f64 {
    let mut worst = f64::MIN;
    for (block, &perfect) in perfect_weights.iter().enumerate() {
        let weight = phg.part_weight(block as i32) as f64;
        if perfect > 0 {
            worst = worst.max(weight / perfect as f64 - 1.0);
        }
    }
    worst
}

/// All blocks within their maximum allowed weight.
pub fn is_balanced(phg: &PartitionedHypergraph, max_part_weights: &[NodeWeight]) -> bool {
    max_part_weights
        .iter()
        .enumerate()
        .all(|(block, &max)| phg.part_weight(block as i32) <= max)
}
