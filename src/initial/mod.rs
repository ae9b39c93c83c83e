//! Portfolio initial bipartitioning.
//!
//! Four bipartitioning heuristics run `runs` times each with derived seeds,
//! in parallel, on flat assignment buffers; the best feasible result is
//! applied to the partitioned hypergraph. Selection prefers balanced
//! results with minimum objective; if no run is balanced, the one with the
//! smallest imbalance wins (ties by objective).

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::context::Context;
use crate::hypergraph::pq::IndexedMaxHeap;
use crate::hypergraph::{
    EdgeWeight, Gain, Hypergraph, HypernodeId, NodeWeight, PartitionId, PartitionedHypergraph,
    INVALID_PARTITION,
};
use crate::parallel::derive_seed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Random,
    BfsGrowing,
    GreedyGrowing,
    LabelPropagation,
}

const PORTFOLIO: [Algorithm; 4] = [
    Algorithm::Random,
    Algorithm::BfsGrowing,
    Algorithm::GreedyGrowing,
    Algorithm::LabelPropagation,
];

struct BipartitionResult {
    assignment: Vec<PartitionId>,
    objective: EdgeWeight,
    imbalance: f64,
    balanced: bool,
}

/// Bipartition the (coarsest) hypergraph with the portfolio and apply the
/// winner to blocks 0 and 1 of `phg`. Balance targets are taken from the
/// first two entries of the context's part-weight vectors.
pub fn bipartition(phg: &mut PartitionedHypergraph, context: &Context) {
    let perfect = [
        context.partition.perfect_balance_part_weights[0],
        context.partition.perfect_balance_part_weights[1],
    ];
    let max = [
        context.partition.max_part_weights[0],
        context.partition.max_part_weights[1],
    ];
    let hg = phg.hypergraph();
    let nodes: Vec<HypernodeId> = hg.nodes().collect();
    if nodes.is_empty() {
        return;
    }

    let runs: Vec<(Algorithm, u64)> = PORTFOLIO
        .iter()
        .flat_map(|&algo| {
            (0..context.initial_partitioning.runs).map(move |r| {
                let seed = derive_seed(
                    context.partition.seed,
                    "initial_partitioning",
                    (algo as u64) << 32 | r as u64,
                );
                (algo, seed)
            })
        })
        .collect();

    let results: Vec<BipartitionResult> = runs
        .par_iter()
        .map(|&(algo, seed)| run_algorithm(algo, hg, &nodes, perfect, max, seed))
        .collect();

    let best = results
        .into_iter()
        .reduce(|best, candidate| {
            let better = (candidate.balanced && !best.balanced)
                || (candidate.balanced == best.balanced
                    && if candidate.balanced {
                        candidate.objective < best.objective
                    } else {
                        candidate.imbalance < best.imbalance
                            || (candidate.imbalance == best.imbalance
                                && candidate.objective < best.objective)
                    });
            if better {
                candidate
            } else {
                best
            }
        })
        .expect("portfolio produced no result");

    phg.reset_partition();
    for &u in &nodes {
        phg.set_node_part(u, best.assignment[u as usize]);
    }
    phg.debug_check_partition();
}

fn run_algorithm(
    algorithm: Algorithm,
    hg: &Hypergraph,
    nodes: &[HypernodeId],
    perfect: [NodeWeight; 2],
    max: [NodeWeight; 2],
    seed: u64,
) -> BipartitionResult {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut assignment = vec![INVALID_PARTITION; hg.initial_num_nodes()];
    match algorithm {
        Algorithm::Random => random_fill(hg, nodes, perfect, &mut assignment, &mut rng),
        Algorithm::BfsGrowing => bfs_growing(hg, nodes, perfect, &mut assignment, &mut rng),
        Algorithm::GreedyGrowing => greedy_growing(hg, nodes, perfect, &mut assignment, &mut rng),
        Algorithm::LabelPropagation => {
            random_fill(hg, nodes, perfect, &mut assignment, &mut rng);
            label_propagation_sweeps(hg, nodes, max, &mut assignment, &mut rng);
        }
    }
    evaluate(hg, nodes, perfect, max, assignment)
}

/// Shuffled round-robin fill towards the perfect weights.
fn random_fill(
    hg: &Hypergraph,
    nodes: &[HypernodeId],
    perfect: [NodeWeight; 2],
    assignment: &mut [PartitionId],
    rng: &mut SmallRng,
) {
    let mut order = nodes.to_vec();
    order.shuffle(rng);
    let mut weights = [0 as NodeWeight; 2];
    for &u in &order {
        // Fill whichever side is relatively lighter.
        let block = if (weights[0] as f64 / perfect[0].max(1) as f64)
            <= (weights[1] as f64 / perfect[1].max(1) as f64)
        {
            0
        } else {
            1
        };
        assignment[u as usize] = block as PartitionId;
        weights[block] += hg.node_weight(u);
    }
}

/// Grow block 0 in breadth-first order from random seeds until it reaches
/// its perfect weight; the remainder becomes block 1.
fn bfs_growing(
    hg: &Hypergraph,
    nodes: &[HypernodeId],
    perfect: [NodeWeight; 2],
    assignment: &mut [PartitionId],
    rng: &mut SmallRng,
) {
    for &u in nodes {
        assignment[u as usize] = 1;
    }
    let mut visited = vec![false; hg.initial_num_nodes()];
    let mut queue = std::collections::VecDeque::new();
    let mut weight_0: NodeWeight = 0;
    let mut order = nodes.to_vec();
    order.shuffle(rng);
    let mut seed_cursor = 0usize;

    while weight_0 < perfect[0] {
        let u = match queue.pop_front() {
            Some(u) => u,
            None => {
                // Next unvisited seed (covers disconnected hypergraphs).
                while seed_cursor < order.len() && visited[order[seed_cursor] as usize] {
                    seed_cursor += 1;
                }
                match order.get(seed_cursor) {
                    Some(&u) => u,
                    None => break,
                }
            }
        };
        if visited[u as usize] {
            continue;
        }
        visited[u as usize] = true;
        if weight_0 + hg.node_weight(u) > perfect[0] && weight_0 > 0 {
            continue;
        }
        assignment[u as usize] = 0;
        weight_0 += hg.node_weight(u);
        for &e in hg.incident_edges(u) {
            for &p in hg.pins(e) {
                if !visited[p as usize] {
                    queue.push_back(p);
                }
            }
        }
    }
}

/// Grow block 1 by repeatedly moving the highest-gain frontier vertex,
/// with lazy key updates against the evolving pin distribution.
fn greedy_growing(
    hg: &Hypergraph,
    nodes: &[HypernodeId],
    perfect: [NodeWeight; 2],
    assignment: &mut [PartitionId],
    rng: &mut SmallRng,
) {
    for &u in nodes {
        assignment[u as usize] = 0;
    }
    let mut pins_in_1 = vec![0u32; hg.initial_num_edges()];
    let gain_of = |u: HypernodeId, pins_in_1: &[u32]| -> Gain {
        let mut gain: Gain = 0;
        for &e in hg.incident_edges(u) {
            let others = hg.edge_size(e) as u32 - 1;
            if pins_in_1[e as usize] == others {
                gain += hg.edge_weight(e);
            } else if pins_in_1[e as usize] == 0 {
                gain -= hg.edge_weight(e);
            }
        }
        gain
    };

    let mut pq = IndexedMaxHeap::new(hg.initial_num_nodes());
    let seed = nodes[rng.gen_range(0..nodes.len())];
    pq.insert(seed, 0);
    let mut weight_1: NodeWeight = 0;
    let mut order = nodes.to_vec();
    order.shuffle(rng);
    let mut seed_cursor = 0usize;

    while weight_1 < perfect[1] {
        let u = if let Some((u, key)) = pq.pop() {
            let fresh = gain_of(u, &pins_in_1);
            if fresh < key {
                pq.insert(u, fresh);
                continue;
            }
            u
        } else {
            while seed_cursor < order.len() && assignment[order[seed_cursor] as usize] == 1 {
                seed_cursor += 1;
            }
            match order.get(seed_cursor) {
                Some(&u) => u,
                None => break,
            }
        };
        if assignment[u as usize] == 1 {
            continue;
        }
        assignment[u as usize] = 1;
        weight_1 += hg.node_weight(u);
        for &e in hg.incident_edges(u) {
            pins_in_1[e as usize] += 1;
            for &p in hg.pins(e) {
                if assignment[p as usize] == 0 && !pq.contains(p) {
                    pq.insert(p, gain_of(p, &pins_in_1));
                }
            }
        }
    }
}

/// A few best-move sweeps over a random start, bounded by the weight caps.
fn label_propagation_sweeps(
    hg: &Hypergraph,
    nodes: &[HypernodeId],
    max: [NodeWeight; 2],
    assignment: &mut [PartitionId],
    rng: &mut SmallRng,
) {
    let mut weights = [0 as NodeWeight; 2];
    for &u in nodes {
        weights[assignment[u as usize] as usize] += hg.node_weight(u);
    }
    let mut order = nodes.to_vec();
    for _ in 0..3 {
        order.shuffle(rng);
        let mut moved = 0usize;
        for &u in &order {
            let from = assignment[u as usize];
            let to = 1 - from;
            if weights[to as usize] + hg.node_weight(u) > max[to as usize] {
                continue;
            }
            let mut gain: Gain = 0;
            for &e in hg.incident_edges(u) {
                let mut in_from = 0usize;
                let mut in_to = 0usize;
                for &p in hg.pins(e) {
                    if p == u {
                        continue;
                    }
                    if assignment[p as usize] == from {
                        in_from += 1;
                    } else {
                        in_to += 1;
                    }
                }
                if in_from == 0 {
                    gain += hg.edge_weight(e);
                }
                if in_to == 0 {
                    gain -= hg.edge_weight(e);
                }
            }
            if gain > 0 {
                assignment[u as usize] = to;
                weights[from as usize] -= hg.node_weight(u);
                weights[to as usize] += hg.node_weight(u);
                moved += 1;
            }
        }
        if moved == 0 {
            break;
        }
    }
}

fn evaluate(
    hg: &Hypergraph,
    nodes: &[HypernodeId],
    perfect: [NodeWeight; 2],
    max: [NodeWeight; 2],
    assignment: Vec<PartitionId>,
) -> BipartitionResult {
    let mut weights = [0 as NodeWeight; 2];
    for &u in nodes {
        debug_assert!(assignment[u as usize] == 0 || assignment[u as usize] == 1);
        weights[assignment[u as usize] as usize] += hg.node_weight(u);
    }
    let mut objective: EdgeWeight = 0;
    for e in hg.edges() {
        let pins = hg.pins(e);
        let first = assignment[pins[0] as usize];
        if pins.iter().any(|&p| assignment[p as usize] != first) {
            objective += hg.edge_weight(e);
        }
    }
    let imbalance = (weights[0] as f64 / perfect[0].max(1) as f64)
        .max(weights[1] as f64 / perfect[1].max(1) as f64)
        - 1.0;
    BipartitionResult {
        balanced: weights[0] <= max[0] && weights[1] <= max[1],
        objective,
        imbalance,
        assignment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::hypergraph::tests::small_hypergraph;
    use crate::metrics;

    fn bipartition_context() -> Context {
        let mut context = Context::default();
        context.partition.k = 2;
        context.partition.epsilon = 0.2;
        context.setup_part_weights(10);
        context
    }

    #[test]
    fn portfolio_produces_a_complete_bipartition() {
        let context = bipartition_context();
        let mut phg = PartitionedHypergraph::new(2, small_hypergraph());
        bipartition(&mut phg, &context);
        for u in 0..10u32 {
            let block = phg.part_id(u);
            assert!(block == 0 || block == 1);
        }
        assert_eq!(phg.part_weight(0) + phg.part_weight(1), 10);
        phg.debug_check_partition();
    }

    #[test]
    fn portfolio_respects_balance_on_easy_instances() {
        let context = bipartition_context();
        let mut phg = PartitionedHypergraph::new(2, small_hypergraph());
        bipartition(&mut phg, &context);
        assert!(metrics::is_balanced(&phg, &context.partition.max_part_weights));
    }

    #[test]
    fn portfolio_beats_worst_case_cut() {
        let context = bipartition_context();
        let mut phg = PartitionedHypergraph::new(2, small_hypergraph());
        bipartition(&mut phg, &context);
        // Total net weight is 8; a sensible bipartition cuts well below that.
        assert!(metrics::cut(&phg) < 8);
    }
}
