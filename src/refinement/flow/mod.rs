//! Flow-based refinement.
//!
//! The core builds a flow hypergraph around the cut between a block pair
//! ([`builder`]); the max-flow min-cut solver itself is an external
//! collaborator behind the [`MaxFlowSolver`] trait. [`FlowRefiner`] wires
//! the two together: extract a region, construct the flow problem, let the
//! solver propose a better bipartition of the region, and apply it if it
//! improves the objective without breaking balance.

pub mod builder;

use std::sync::Arc;

use log::debug;

use crate::context::Context;
use crate::hypergraph::flow::{FlowHypergraph, FlowNodeId};
use crate::hypergraph::{
    EdgeWeight, Gain, HyperedgeId, HypernodeId, NodeWeight, PartitionId, PartitionedHypergraph,
    INVALID_NODE,
};
use crate::metrics;
use crate::refinement::Refiner;

/// The block-pair region a flow problem is built from.
#[derive(Debug, Default, Clone)]
pub struct Subhypergraph {
    pub block_0: PartitionId,
    pub block_1: PartitionId,
    pub nodes_of_block_0: Vec<HypernodeId>,
    pub nodes_of_block_1: Vec<HypernodeId>,
    pub weight_of_block_0: NodeWeight,
    pub weight_of_block_1: NodeWeight,
    /// Union of the nets incident to the region, each once.
    pub hes: Vec<HyperedgeId>,
    pub num_pins: usize,
}

impl Subhypergraph {
    /// Region containing every vertex of both blocks.
    pub fn from_blocks(
        phg: &PartitionedHypergraph,
        block_0: PartitionId,
        block_1: PartitionId,
    ) -> Self {
        let nodes_of_block_0 = phg.nodes().filter(|&u| phg.part_id(u) == block_0).collect();
        let nodes_of_block_1 = phg.nodes().filter(|&u| phg.part_id(u) == block_1).collect();
        Self::from_nodes(phg, block_0, block_1, nodes_of_block_0, nodes_of_block_1)
    }

    /// Region grown breadth-first from the border between the two blocks,
    /// bounded by a weight cap per side.
    pub fn around_cut(
        phg: &PartitionedHypergraph,
        block_0: PartitionId,
        block_1: PartitionId,
        max_region_weight: [NodeWeight; 2],
    ) -> Self {
        let mut in_region = vec![false; phg.hypergraph().initial_num_nodes()];
        let mut nodes = [Vec::new(), Vec::new()];
        let mut weights = [0 as NodeWeight; 2];
        let mut queue = std::collections::VecDeque::new();

        for u in phg.nodes() {
            let block = phg.part_id(u);
            if block != block_0 && block != block_1 {
                continue;
            }
            let other = if block == block_0 { block_1 } else { block_0 };
            let at_border = phg
                .incident_edges(u)
                .iter()
                .any(|&e| phg.pin_count_in_part(e, other) > 0);
            if at_border {
                queue.push_back(u);
                in_region[u as usize] = true;
            }
        }
        while let Some(u) = queue.pop_front() {
            let block = phg.part_id(u);
            let side = (block == block_1) as usize;
            if weights[side] + phg.node_weight(u) > max_region_weight[side] {
                continue;
            }
            weights[side] += phg.node_weight(u);
            nodes[side].push(u);
            for &e in phg.incident_edges(u) {
                for &p in phg.pins(e) {
                    let pb = phg.part_id(p);
                    if !in_region[p as usize] && (pb == block_0 || pb == block_1) {
                        in_region[p as usize] = true;
                        queue.push_back(p);
                    }
                }
            }
        }
        let [n0, n1] = nodes;
        Self::from_nodes(phg, block_0, block_1, n0, n1)
    }

    fn from_nodes(
        phg: &PartitionedHypergraph,
        block_0: PartitionId,
        block_1: PartitionId,
        nodes_of_block_0: Vec<HypernodeId>,
        nodes_of_block_1: Vec<HypernodeId>,
    ) -> Self {
        let mut sub = Self {
            block_0,
            block_1,
            nodes_of_block_0,
            nodes_of_block_1,
            ..Default::default()
        };
        let mut visited = vec![false; phg.hypergraph().initial_num_edges()];
        for &u in sub.nodes_of_block_0.iter().chain(&sub.nodes_of_block_1) {
            sub.num_pins += phg.incident_edges(u).len();
            for &e in phg.incident_edges(u) {
                if !visited[e as usize] {
                    visited[e as usize] = true;
                    sub.hes.push(e);
                }
            }
        }
        for &u in &sub.nodes_of_block_0 {
            sub.weight_of_block_0 += phg.node_weight(u);
        }
        for &u in &sub.nodes_of_block_1 {
            sub.weight_of_block_1 += phg.node_weight(u);
        }
        sub
    }
}

/// Statistics of a built flow problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowProblem {
    pub source: FlowNodeId,
    pub sink: FlowNodeId,
    /// Weight of nets of the region currently cut between the block pair.
    pub total_cut: EdgeWeight,
    /// Cut weight no flow solution can recover (nets touching both sides
    /// outside the region).
    pub non_removable_cut: EdgeWeight,
    pub weight_of_block_0: NodeWeight,
    pub weight_of_block_1: NodeWeight,
}

/// A solver-proposed bipartition of the flow hypergraph.
#[derive(Debug, Clone)]
pub struct FlowBipartition {
    /// Side of every flow node; `true` = source side.
    pub on_source_side: Vec<bool>,
    /// Value of the minimum cut found.
    pub cut: EdgeWeight,
}

/// Published interface of the external max-flow min-cut solver.
pub trait MaxFlowSolver: Send + Sync {
    /// Compute a minimum S-T cut of `flow_hg` respecting the node weights
    /// as side capacities. `distance_from_cut` (if present) seeds the
    /// piercing heuristic: negative = source side, positive = sink side.
    fn minimum_cut(
        &self,
        flow_hg: &FlowHypergraph,
        problem: &FlowProblem,
        distance_from_cut: Option<&[i64]>,
    ) -> Option<FlowBipartition>;
}

/// Refiner shell around the builder and a registered solver.
pub struct FlowRefiner {
    solver: Arc<dyn MaxFlowSolver>,
}

impl FlowRefiner {
    pub fn new(solver: Arc<dyn MaxFlowSolver>) -> Self {
        Self { solver }
    }
}

impl Refiner for FlowRefiner {
    fn refine(&mut self, phg: &mut PartitionedHypergraph, context: &Context) -> Gain {
        let max_weights = &context.partition.max_part_weights;
        let perfect = &context.partition.perfect_balance_part_weights;
        let k = max_weights.len() as PartitionId;
        let mut total_improvement: Gain = 0;

        for block_0 in 0..k {
            for block_1 in block_0 + 1..k {
                let cap = |b: PartitionId| {
                    (context.refinement.flow.region_growth_factor
                        * perfect[b as usize] as f64)
                        .ceil() as NodeWeight
                };
                let sub =
                    Subhypergraph::around_cut(phg, block_0, block_1, [cap(block_0), cap(block_1)]);
                if sub.nodes_of_block_0.is_empty() && sub.nodes_of_block_1.is_empty() {
                    continue;
                }
                let build = builder::construct_flow_hypergraph(
                    phg,
                    &sub,
                    context.partition.objective,
                    context.refinement.flow.determine_distance_from_cut,
                );
                if build.problem.total_cut - build.problem.non_removable_cut <= 0 {
                    continue;
                }
                let Some(result) = self.solver.minimum_cut(
                    &build.flow_hg,
                    &build.problem,
                    build.distance_from_cut.as_deref(),
                ) else {
                    continue;
                };
                if result.cut >= build.problem.total_cut - build.problem.non_removable_cut {
                    continue;
                }
                total_improvement += apply_flow_bipartition(
                    phg,
                    &build,
                    &result,
                    block_0,
                    block_1,
                    max_weights,
                    context.partition.objective,
                );
            }
        }
        total_improvement
    }
}

/// Move region vertices to the side the solver assigned them, rolling the
/// whole pair refinement back if it breaks balance or the objective.
fn apply_flow_bipartition(
    phg: &PartitionedHypergraph,
    build: &builder::FlowProblemBuild,
    result: &FlowBipartition,
    block_0: PartitionId,
    block_1: PartitionId,
    max_weights: &[NodeWeight],
    objective: crate::context::Objective,
) -> Gain {
    let before = metrics::objective(phg, objective);
    let mut applied: Vec<(HypernodeId, PartitionId, PartitionId)> = Vec::new();
    let mut feasible = true;
    for (flow_node, &orig) in build.flow_to_node.iter().enumerate() {
        if orig == INVALID_NODE {
            continue;
        }
        let desired = if result.on_source_side[flow_node] {
            block_0
        } else {
            block_1
        };
        let current = phg.part_id(orig);
        if current == desired {
            continue;
        }
        if phg.change_node_part_with_balance_check(
            orig,
            current,
            desired,
            max_weights[desired as usize],
        ) {
            applied.push((orig, current, desired));
        } else {
            feasible = false;
            break;
        }
    }
    let improvement = before - metrics::objective(phg, objective);
    if !feasible || improvement < 0 {
        for &(u, from, to) in applied.iter().rev() {
            phg.change_node_part(u, to, from);
        }
        debug!(
            "flow refinement on ({block_0}, {block_1}) rolled back (feasible = {feasible})"
        );
        return 0;
    }
    improvement
}
