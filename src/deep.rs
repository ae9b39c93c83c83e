//! Deep multilevel partitioning.
//!
//! Coarsening runs down to `2C` nodes so the coarsest hypergraph can be
//! bipartitioned with high quality; the k-way partition is then assembled
//! by recursively bipartitioning each block during uncoarsening. The
//! precomputed [`RbTree`] encodes, for every intermediate block count k',
//! how each block splits further, which final block range it owns, and its
//! aggregated balance targets. While coarsening, the driver maintains the
//! invariant that `t` threads work on at least `t * 2C` nodes; when it
//! breaks, the scheme recurses in parallel on private copies and keeps the
//! best result.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use log::debug;
use rayon::prelude::*;

use crate::coarsening::{MultilevelCoarsener, Uncoarsener};
use crate::context::{Context, Objective};
use crate::error::PartitionError;
use crate::hypergraph::{
    Hypergraph, HypernodeId, NodeWeight, PartitionId, PartitionedHypergraph, INVALID_NODE,
};
use crate::initial;
use crate::metrics;
use crate::parallel::run_seeded;
use crate::refinement::flow::MaxFlowSolver;
use crate::refinement::rebalance::rebalance;
use crate::refinement::RefinementChain;

/// Balance parameters of the original call, used to derive the adaptive
/// imbalance of every sub-bipartition.
#[derive(Debug, Clone, Copy)]
pub struct OriginalHypergraphInfo {
    pub original_weight: NodeWeight,
    pub original_k: PartitionId,
    pub original_epsilon: f64,
}

impl OriginalHypergraphInfo {
    /// The imbalance allowed for splitting `current_weight` into
    /// `current_k` blocks such that the composed k-way partition can still
    /// meet the original constraint. An empty block yields 0 and is fixed
    /// by the final rebalancing step.
    pub fn compute_adaptive_epsilon(
        &self,
        current_weight: NodeWeight,
        current_k: PartitionId,
    ) -> f64 {
        if current_weight == 0 {
            0.0
        } else {
            let base = (self.original_weight as f64 / self.original_k as f64).ceil()
                / (current_weight as f64 / current_k as f64).ceil()
                * (1.0 + self.original_epsilon);
            let exponent = 1.0 / (current_k as f64).log2().ceil();
            (base.powf(exponent) - 1.0).max(0.0).min(0.99)
        }
    }
}

/// Recursive-bipartitioning tree. Level `l` holds the block counts after
/// `l` rounds of halving; per (k', block) it answers how many final blocks
/// the block still owes, its final block range, and its balance targets.
pub struct RbTree {
    contraction_limit_multiplier: u32,
    desired_blocks: Vec<Vec<PartitionId>>,
    target_blocks: Vec<Vec<PartitionId>>,
    perfectly_balanced_weights: Vec<Vec<NodeWeight>>,
    max_part_weights: Vec<Vec<NodeWeight>>,
    partition_to_level: HashMap<PartitionId, usize>,
}

impl RbTree {
    /// Precompute the tree for the final `k` of `context` (part-weight
    /// vectors must be set up).
    pub fn new(context: &Context) -> Self {
        let k = context.partition.k;
        let perfect = &context.partition.perfect_balance_part_weights;
        let max = &context.partition.max_part_weights;
        let mut tree = Self {
            contraction_limit_multiplier: context.coarsening.contraction_limit_multiplier,
            desired_blocks: vec![vec![k]],
            target_blocks: vec![vec![0, k]],
            perfectly_balanced_weights: vec![vec![perfect.iter().sum()]],
            max_part_weights: vec![vec![max.iter().sum()]],
            partition_to_level: HashMap::new(),
        };

        // Simulate recursive bipartitioning level by level.
        let mut should_continue = true;
        while should_continue {
            should_continue = false;
            let previous = tree.desired_blocks.len() - 1;
            tree.desired_blocks.push(Vec::new());
            tree.target_blocks.push(vec![0]);
            tree.perfectly_balanced_weights.push(Vec::new());
            tree.max_part_weights.push(Vec::new());
            for i in 0..tree.desired_blocks[previous].len() {
                let blocks = tree.desired_blocks[previous][i];
                if blocks > 1 {
                    let k0 = blocks / 2 + blocks % 2;
                    let k1 = blocks / 2;
                    tree.add_block(k0, perfect, max);
                    tree.add_block(k1, perfect, max);
                    should_continue |= k0 > 1 || k1 > 1;
                } else {
                    tree.add_block(1, perfect, max);
                }
            }
        }
        for (level, blocks) in tree.desired_blocks.iter().enumerate() {
            tree.partition_to_level
                .insert(blocks.len() as PartitionId, level);
        }
        tree
    }

    fn add_block(&mut self, k: PartitionId, perfect: &[NodeWeight], max: &[NodeWeight]) {
        let start = *self.target_blocks.last().unwrap().last().unwrap();
        let range = start as usize..(start + k) as usize;
        self.desired_blocks.last_mut().unwrap().push(k);
        self.target_blocks.last_mut().unwrap().push(start + k);
        self.perfectly_balanced_weights
            .last_mut()
            .unwrap()
            .push(perfect[range.clone()].iter().sum());
        self.max_part_weights
            .last_mut()
            .unwrap()
            .push(max[range].iter().sum());
    }

    fn level_of(&self, current_k: PartitionId) -> usize {
        *self
            .partition_to_level
            .get(&current_k)
            .expect("block count not on any root-to-leaf path")
    }

    /// Next larger block count on the root-to-leaf paths, if any.
    pub fn next_k(&self, current_k: PartitionId) -> Option<PartitionId> {
        let original_k = self.desired_blocks[0][0];
        if current_k >= original_k {
            return None;
        }
        let level = self.level_of(current_k);
        if level + 1 < self.desired_blocks.len() {
            Some(self.desired_blocks[level + 1].len() as PartitionId)
        } else {
            Some(original_k)
        }
    }

    /// Number of final blocks `block` still has to split into.
    pub fn desired_blocks(&self, current_k: PartitionId, block: PartitionId) -> PartitionId {
        self.desired_blocks[self.level_of(current_k)][block as usize]
    }

    /// Final block range `[lo, hi)` owned by `block` at `current_k`.
    pub fn target_blocks_in_final_partition(
        &self,
        current_k: PartitionId,
        block: PartitionId,
    ) -> (PartitionId, PartitionId) {
        let targets = &self.target_blocks[self.level_of(current_k)];
        (targets[block as usize], targets[block as usize + 1])
    }

    pub fn perfectly_balanced_weight(&self, current_k: PartitionId, block: PartitionId) -> NodeWeight {
        self.perfectly_balanced_weights[self.level_of(current_k)][block as usize]
    }

    pub fn max_part_weight(&self, current_k: PartitionId, block: PartitionId) -> NodeWeight {
        self.max_part_weights[self.level_of(current_k)][block as usize]
    }

    pub fn perfectly_balanced_weight_vector(&self, current_k: PartitionId) -> &[NodeWeight] {
        &self.perfectly_balanced_weights[self.level_of(current_k)]
    }

    pub fn max_part_weight_vector(&self, current_k: PartitionId) -> &[NodeWeight] {
        &self.max_part_weights[self.level_of(current_k)]
    }

    /// Smallest precomputed block count covering every block id below
    /// `highest_used_block`. Blocks can end up empty (adaptive epsilon
    /// permits it); snapping up keeps every used block id addressable.
    pub fn covering_k(&self, highest_used_block: PartitionId) -> PartitionId {
        for blocks in &self.desired_blocks {
            let k = blocks.len() as PartitionId;
            if k >= highest_used_block {
                return k;
            }
        }
        self.desired_blocks[0][0]
    }

    /// Largest block count whose contraction limit fits the node count.
    pub fn max_usable_blocks(&self, current_num_nodes: usize) -> PartitionId {
        for level in (0..self.desired_blocks.len()).rev() {
            let k = self.desired_blocks[level].len();
            if current_num_nodes >= k * self.contraction_limit_multiplier as usize {
                return k as PartitionId;
            }
        }
        self.desired_blocks.last().unwrap().len() as PartitionId
    }
}

/// The first k' blocks with non-zero weight form the current partition.
pub fn get_current_k(phg: &PartitionedHypergraph) -> PartitionId {
    let mut k = 0;
    for block in 0..phg.k() {
        if phg.part_weight(block) > 0 {
            k += 1;
        } else {
            break;
        }
    }
    k.max(1)
}

/// Current block count snapped to a precomputed RB-tree level that covers
/// every non-empty block.
fn current_k_on_tree(phg: &PartitionedHypergraph, rb_tree: &RbTree) -> PartitionId {
    let highest_used = (0..phg.k())
        .filter(|&block| phg.part_weight(block) > 0)
        .map(|block| block + 1)
        .max()
        .unwrap_or(1);
    rb_tree.covering_k(highest_used)
}

fn is_balanced_at(phg: &PartitionedHypergraph, rb_tree: &RbTree, current_k: PartitionId) -> bool {
    (0..current_k).all(|block| phg.part_weight(block) <= rb_tree.max_part_weight(current_k, block))
}

/// Partition `hg` into `context.partition.k` blocks with the deep
/// multilevel scheme. The returned overlay holds a complete partition;
/// feasibility of the balance constraint is the caller's check.
pub fn partition(hg: Hypergraph, context: &Context) -> Result<PartitionedHypergraph, PartitionError> {
    partition_with_solver(hg, context, None)
}

/// As [`partition`], with an external max-flow solver enabling flow-based
/// refinement.
pub fn partition_with_solver(
    hg: Hypergraph,
    context: &Context,
    solver: Option<Arc<dyn MaxFlowSolver>>,
) -> Result<PartitionedHypergraph, PartitionError> {
    context.validate()?;
    let mut context = context.clone();
    context.shared_memory.num_threads = context.shared_memory.num_threads.max(1);
    context.setup_part_weights(hg.total_weight());
    let info = OriginalHypergraphInfo {
        original_weight: hg.total_weight(),
        original_k: context.partition.k,
        original_epsilon: context.partition.epsilon,
    };
    let rb_tree = RbTree::new(&context);
    let num_threads = context.shared_memory.num_threads;
    let phg = run_seeded(context.partition.seed, num_threads, || {
        deep_multilevel_partitioning(hg, &context, &info, &rb_tree, solver, true, num_threads)
    });
    Ok(phg)
}

fn deep_multilevel_partitioning(
    mut hg: Hypergraph,
    context: &Context,
    info: &OriginalHypergraphInfo,
    rb_tree: &RbTree,
    solver: Option<Arc<dyn MaxFlowSolver>>,
    is_main: bool,
    num_threads: usize,
) -> PartitionedHypergraph {
    let mut ctx = context.clone();
    let total_weight = hg.total_weight();
    // Coarsen down to the 2C nodes at which traditional multilevel
    // partitioning would bipartition the coarsest hypergraph.
    let contraction_limit_for_bipartitioning = 2 * ctx.coarsening.contraction_limit_multiplier;
    ctx.coarsening.contraction_limit = contraction_limit_for_bipartitioning;
    let mut actual_k = (ctx.partition.k as usize)
        .min(hg.current_num_nodes() / ctx.coarsening.contraction_limit_multiplier.max(1) as usize)
        .max(2) as PartitionId;

    // While few nodes remain relative to actual_k, loosen the cluster
    // weight cap so coarsening can continue.
    let adapt_max_allowed_node_weight =
        |ctx: &mut Context, actual_k: &mut PartitionId, nodes: usize, go_on: &mut bool| {
            while (nodes <= *actual_k as usize * ctx.coarsening.contraction_limit as usize
                || !*go_on)
                && *actual_k > 2
            {
                *actual_k = (*actual_k / 2).max(2);
                ctx.setup_max_allowed_node_weight(total_weight, *actual_k);
                *go_on = true;
            }
        };

    // ---------------- Coarsening ----------------
    let mut should_continue = true;
    ctx.setup_max_allowed_node_weight(total_weight, actual_k);
    adapt_max_allowed_node_weight(&mut ctx, &mut actual_k, hg.current_num_nodes(), &mut should_continue);
    let mut coarsener = MultilevelCoarsener::new(&hg, &ctx);
    let mut no_further_contractions_possible = true;
    while coarsener.should_not_terminate(&hg, &ctx) && should_continue {
        // t threads must keep at least t * 2C nodes to work on; otherwise
        // restore the invariant by recursing in parallel.
        if ctx.shared_memory.perform_parallel_recursion
            && hg.current_num_nodes()
                < num_threads * contraction_limit_for_bipartitioning as usize
        {
            no_further_contractions_possible = false;
            break;
        }
        should_continue = coarsener.pass(&mut hg, &ctx);
        adapt_max_allowed_node_weight(
            &mut ctx,
            &mut actual_k,
            hg.current_num_nodes(),
            &mut should_continue,
        );
    }
    debug!(
        "coarsest hypergraph: {} nodes, {} edges",
        hg.current_num_nodes(),
        hg.current_num_edges()
    );
    let levels = coarsener.into_levels();

    // ---------------- Initial partitioning ----------------
    let mut phg = PartitionedHypergraph::new(ctx.partition.k.max(2), hg);
    if no_further_contractions_possible {
        let (start_k, end_k) = rb_tree.target_blocks_in_final_partition(1, 0);
        let b_ctx = setup_bipartitioning_context(&ctx, info, phg.total_weight(), start_k, end_k);
        initial::bipartition(&mut phg, &b_ctx);
    } else {
        let current_num_nodes = phg.current_num_nodes();
        let mut threads_per_recursion = current_num_nodes
            .max(contraction_limit_for_bipartitioning as usize)
            / contraction_limit_for_bipartitioning as usize;
        let num_parallel_calls = num_threads / threads_per_recursion
            + usize::from(num_threads % threads_per_recursion != 0);
        threads_per_recursion =
            num_threads / num_parallel_calls + usize::from(num_threads % num_parallel_calls != 0);
        debug!(
            "parallel deep multilevel recursion: {num_parallel_calls} calls, \
             {threads_per_recursion} threads each"
        );

        let results: Vec<PartitionedHypergraph> = (0..num_parallel_calls)
            .into_par_iter()
            .map(|i| {
                let threads =
                    threads_per_recursion.min(num_threads - i * threads_per_recursion).max(1);
                let r_ctx = setup_recursion_context(&ctx, rb_tree, current_num_nodes, threads, num_threads);
                deep_multilevel_partitioning(
                    phg.hypergraph().clone(),
                    &r_ctx,
                    info,
                    rb_tree,
                    solver.clone(),
                    false,
                    threads,
                )
            })
            .collect();

        let best = select_best_partition(&results, &ctx, rb_tree);
        let nodes: Vec<HypernodeId> = phg.nodes().collect();
        for &u in &nodes {
            phg.set_only_node_part(u, best.part_id(u));
        }
        phg.initialize_partition();
    }

    // ---------------- Uncoarsening ----------------
    let mut uncoarsener = Uncoarsener::new(levels);
    let mut chain = RefinementChain::from_context(&ctx, solver);
    let final_k = ctx.partition.k;
    let mut refine_ctx = ctx.clone();
    let mut current_k = current_k_on_tree(&phg, rb_tree);
    let mut next_k = rb_tree.next_k(current_k);
    let update_balance_targets = |refine_ctx: &mut Context, current_k: PartitionId| {
        refine_ctx.partition.k = current_k;
        refine_ctx.partition.perfect_balance_part_weights =
            rb_tree.perfectly_balanced_weight_vector(current_k).to_vec();
        refine_ctx.partition.max_part_weights =
            rb_tree.max_part_weight_vector(current_k).to_vec();
    };
    update_balance_targets(&mut refine_ctx, current_k);
    let contraction_limit_for_rb = |next_k: Option<PartitionId>| {
        next_k
            .map(|k| k as usize * ctx.coarsening.contraction_limit_multiplier as usize)
            .unwrap_or(usize::MAX)
    };

    while !uncoarsener.is_top_level() {
        while phg.current_num_nodes() >= contraction_limit_for_rb(next_k) {
            bipartition_each_block(&mut phg, &refine_ctx, info, rb_tree, current_k);
            current_k = next_k.expect("bipartitioning beyond the final k");
            update_balance_targets(&mut refine_ctx, current_k);
            next_k = rb_tree.next_k(current_k);
            chain.refine(&mut phg, &refine_ctx);
        }
        uncoarsener.project_next_level(&mut phg);
        chain.refine(&mut phg, &refine_ctx);
    }

    // At the top level, keep bipartitioning until the final k is reached.
    while phg.current_num_nodes() >= contraction_limit_for_rb(next_k)
        || (is_main && current_k != final_k)
    {
        bipartition_each_block(&mut phg, &refine_ctx, info, rb_tree, current_k);
        current_k = next_k.expect("bipartitioning beyond the final k");
        update_balance_targets(&mut refine_ctx, current_k);
        next_k = rb_tree.next_k(current_k);
        chain.refine(&mut phg, &refine_ctx);
    }

    if is_main {
        rebalance(&mut phg, &refine_ctx);
    }
    phg
}

/// Context for bipartitioning a (sub-)hypergraph owning the final block
/// range `[start_k, end_k)`.
fn setup_bipartitioning_context(
    context: &Context,
    info: &OriginalHypergraphInfo,
    total_weight: NodeWeight,
    start_k: PartitionId,
    end_k: PartitionId,
) -> Context {
    debug_assert!(end_k - start_k >= 2);
    let mut b_ctx = context.clone();
    b_ctx.partition.k = 2;
    let k = end_k - start_k;
    let k0 = k / 2 + k % 2;
    let k1 = k / 2;
    b_ctx.partition.epsilon = info.compute_adaptive_epsilon(total_weight, k);
    let perfect_0 = (k0 as f64 / k as f64 * total_weight as f64).ceil() as NodeWeight;
    let perfect_1 = (k1 as f64 / k as f64 * total_weight as f64).ceil() as NodeWeight;
    b_ctx.partition.perfect_balance_part_weights = vec![perfect_0, perfect_1];
    b_ctx.partition.max_part_weights = vec![
        ((1.0 + b_ctx.partition.epsilon) * perfect_0 as f64) as NodeWeight,
        ((1.0 + b_ctx.partition.epsilon) * perfect_1 as f64) as NodeWeight,
    ];
    b_ctx.coarsening.contraction_limit = 2 * b_ctx.coarsening.contraction_limit_multiplier;
    b_ctx
}

fn setup_recursion_context(
    context: &Context,
    rb_tree: &RbTree,
    current_num_nodes: usize,
    threads: usize,
    original_threads: usize,
) -> Context {
    let mut r_ctx = context.clone();
    r_ctx.partition.verbose = false;
    r_ctx.shared_memory.num_threads = threads;
    let reduction = threads as f64 / original_threads.max(1) as f64;
    r_ctx.initial_partitioning.runs =
        ((r_ctx.initial_partitioning.runs as f64 * reduction).ceil() as usize).max(1);
    r_ctx.partition.k = rb_tree.max_usable_blocks(current_num_nodes).max(2);
    r_ctx.partition.perfect_balance_part_weights = rb_tree
        .perfectly_balanced_weight_vector(r_ctx.partition.k)
        .to_vec();
    r_ctx.partition.max_part_weights = rb_tree.max_part_weight_vector(r_ctx.partition.k).to_vec();
    r_ctx
}

fn select_best_partition<'a>(
    results: &'a [PartitionedHypergraph],
    context: &Context,
    rb_tree: &RbTree,
) -> &'a PartitionedHypergraph {
    let scored: Vec<(bool, i64)> = results
        .par_iter()
        .map(|phg| {
            let k = current_k_on_tree(phg, rb_tree);
            (
                is_balanced_at(phg, rb_tree, k),
                metrics::objective(phg, context.partition.objective),
            )
        })
        .collect();
    let mut best = 0usize;
    for i in 1..results.len() {
        let (balanced, objective) = scored[i];
        let (best_balanced, best_objective) = scored[best];
        if (balanced && !best_balanced)
            || (balanced == best_balanced && objective < best_objective)
        {
            best = i;
        }
    }
    &results[best]
}

/// Split every block of the current k'-way partition into the two blocks
/// the RB tree prescribes, in parallel, and renumber the partition to the
/// next k''.
fn bipartition_each_block(
    phg: &mut PartitionedHypergraph,
    context: &Context,
    info: &OriginalHypergraphInfo,
    rb_tree: &RbTree,
    current_k: PartitionId,
) {
    let cut_net_splitting = context.partition.objective == Objective::Km1;
    phg.invalidate_gain_cache();

    // New block id ranges: a block splitting in two occupies two slots.
    let mut block_ranges: Vec<PartitionId> = vec![0];
    for block in 0..current_k {
        let desired = rb_tree.desired_blocks(current_k, block);
        let slots = if desired > 1 { 2 } else { 1 };
        block_ranges.push(block_ranges[block as usize] + slots);
    }

    let mapping: Vec<AtomicU32> = (0..phg.hypergraph().initial_num_nodes())
        .map(|_| AtomicU32::new(INVALID_NODE))
        .collect();
    let phg_ref: &PartitionedHypergraph = phg;
    let bipartitions: Vec<Option<PartitionedHypergraph>> = (0..current_k)
        .into_par_iter()
        .map(|block| {
            if rb_tree.desired_blocks(current_k, block) <= 1 {
                return None;
            }
            let (sub_hg, sub_mapping) = phg_ref.extract(block, cut_net_splitting);
            for (u, &mapped) in sub_mapping.iter().enumerate() {
                if mapped != INVALID_NODE {
                    mapping[u].store(mapped, Ordering::Relaxed);
                }
            }
            let (start_k, end_k) = rb_tree.target_blocks_in_final_partition(current_k, block);
            let mut sub_phg = PartitionedHypergraph::new(2, sub_hg);
            if sub_phg.hypergraph().initial_num_nodes() > 0 {
                let b_ctx = setup_bipartitioning_context(
                    context,
                    info,
                    sub_phg.total_weight(),
                    start_k,
                    end_k,
                );
                initial::bipartition(&mut sub_phg, &b_ctx);
            }
            Some(sub_phg)
        })
        .collect();

    // Rewrite part ids; every vertex moves at most once, so the overlay
    // stays consistent throughout.
    let nodes: Vec<HypernodeId> = phg.nodes().collect();
    nodes.par_iter().for_each(|&u| {
        let from = phg_ref.part_id(u);
        let to = match &bipartitions[from as usize] {
            Some(sub_phg) => {
                let mapped = mapping[u as usize].load(Ordering::Relaxed);
                debug_assert_ne!(mapped, INVALID_NODE);
                block_ranges[from as usize] + (sub_phg.part_id(mapped) == 1) as PartitionId
            }
            None => block_ranges[from as usize],
        };
        if from != to {
            phg_ref.change_node_part(u, from, to);
        }
    });
    phg.debug_check_partition();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rb_tree_for(k: PartitionId, epsilon: f64, total_weight: NodeWeight) -> RbTree {
        let mut context = Context::default();
        context.partition.k = k;
        context.partition.epsilon = epsilon;
        context.setup_part_weights(total_weight);
        RbTree::new(&context)
    }

    #[test]
    fn rb_tree_shape_for_k7() {
        let tree = rb_tree_for(7, 0.03, 100);
        // Root 7 splits 4|3, then (2,2)|(2,1), then all ones.
        assert_eq!(tree.desired_blocks[0], vec![7]);
        assert_eq!(tree.desired_blocks[1], vec![4, 3]);
        assert_eq!(tree.desired_blocks[2], vec![2, 2, 2, 1]);
        assert_eq!(tree.desired_blocks[3], vec![1, 1, 1, 1, 1, 1, 1]);
        // Block 2 of the 4-way partition owns final blocks [4, 6).
        assert_eq!(tree.target_blocks_in_final_partition(4, 2), (4, 6));
        assert_eq!(tree.target_blocks_in_final_partition(2, 0), (0, 4));
        assert_eq!(tree.next_k(1), Some(2));
        assert_eq!(tree.next_k(2), Some(4));
        assert_eq!(tree.next_k(4), Some(7));
        assert_eq!(tree.next_k(7), None);
    }

    #[test]
    fn rb_tree_aggregates_part_weights() {
        let tree = rb_tree_for(7, 0.03, 100);
        // ceil(100/7) = 15 per final block.
        assert_eq!(tree.perfectly_balanced_weight(1, 0), 7 * 15);
        assert_eq!(tree.perfectly_balanced_weight(2, 0), 4 * 15);
        assert_eq!(tree.perfectly_balanced_weight(4, 2), 2 * 15);
        assert_eq!(tree.max_part_weight(4, 3), (1.03f64 * 15.0) as NodeWeight);
    }

    #[test]
    fn rb_tree_max_usable_blocks() {
        let mut context = Context::default();
        context.partition.k = 8;
        context.partition.epsilon = 0.03;
        context.coarsening.contraction_limit_multiplier = 10;
        context.setup_part_weights(1000);
        let tree = RbTree::new(&context);
        assert_eq!(tree.max_usable_blocks(1000), 8);
        assert_eq!(tree.max_usable_blocks(45), 4);
        assert_eq!(tree.max_usable_blocks(25), 2);
    }

    #[test]
    fn adaptive_epsilon_matches_definition() {
        let info = OriginalHypergraphInfo {
            original_weight: 1000,
            original_k: 8,
            original_epsilon: 0.03,
        };
        // Splitting the full weight into 8 blocks keeps a loosened epsilon.
        let eps = info.compute_adaptive_epsilon(1000, 8);
        let base = (1000f64 / 8.0).ceil() / (1000f64 / 8.0).ceil() * 1.03;
        let expected = (base.powf(1.0 / 3.0) - 1.0).max(0.0).min(0.99);
        assert!((eps - expected).abs() < 1e-12);
        // An empty block is allowed and rebalanced later.
        assert_eq!(info.compute_adaptive_epsilon(0, 2), 0.0);
    }

    #[test]
    fn adaptive_epsilon_tightens_for_heavy_blocks() {
        let info = OriginalHypergraphInfo {
            original_weight: 1000,
            original_k: 4,
            original_epsilon: 0.05,
        };
        let light = info.compute_adaptive_epsilon(400, 2);
        let heavy = info.compute_adaptive_epsilon(600, 2);
        assert!(heavy < light);
    }
}
