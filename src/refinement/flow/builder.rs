//! Flow-hypergraph construction.
//!
//! Builds the flow problem for a block-pair region: one flow node per
//! region vertex plus a source and a sink whose weights absorb the rest of
//! each block, one flow hyperedge per non-droppable net with identical
//! nets merged into a single capacity, and (optionally) a BFS labeling of
//! every flow node with its hop distance from the cut, which seeds the
//! piercing heuristic of the max-flow solver.

use hashbrown::HashMap;

use crate::context::Objective;
use crate::hypergraph::flow::{FlowEdgeId, FlowHypergraph, FlowNodeId};
use crate::hypergraph::{
    HyperedgeId, HypernodeId, PartitionId, PartitionedHypergraph, INVALID_NODE,
};
use crate::hypergraph::hypergraph::pin_hash;
use crate::refinement::flow::{FlowProblem, Subhypergraph};

/// Everything the refiner needs from one construction.
pub struct FlowProblemBuild {
    pub flow_hg: FlowHypergraph,
    pub problem: FlowProblem,
    /// Flow node id -> original vertex id (`INVALID_NODE` for terminals).
    pub flow_to_node: Vec<HypernodeId>,
    /// Hop distance from the cut per flow node (negative on the source
    /// side), present iff requested.
    pub distance_from_cut: Option<Vec<i64>>,
}

/// A net is droppable iff no cut through the region can change its
/// contribution: under the cut objective, nets with pins in third blocks
/// stay cut no matter what.
fn can_hyperedge_be_dropped(
    phg: &PartitionedHypergraph,
    he: HyperedgeId,
    block_0: PartitionId,
    block_1: PartitionId,
    objective: Objective,
) -> bool {
    objective == Objective::Cut
        && phg.pin_count_in_part(he, block_0) + phg.pin_count_in_part(he, block_1)
            < phg.edge_size(he)
}

/// Build the flow hypergraph for `sub`'s block pair.
pub fn construct_flow_hypergraph(
    phg: &PartitionedHypergraph,
    sub: &Subhypergraph,
    objective: Objective,
    determine_distance_from_cut: bool,
) -> FlowProblemBuild {
    let (block_0, block_1) = (sub.block_0, sub.block_1);
    let mut flow_hg = FlowHypergraph::new();
    let mut node_to_flow: HashMap<HypernodeId, FlowNodeId> =
        HashMap::with_capacity(sub.nodes_of_block_0.len() + sub.nodes_of_block_1.len());
    let mut flow_to_node: Vec<HypernodeId> = Vec::new();

    // Terminal first, then the region nodes of its side; the source and
    // sink weights stand in for the rest of each block.
    let source = flow_hg.add_node(0);
    flow_to_node.push(INVALID_NODE);
    let mut weight_block_0 = 0;
    for &hn in &sub.nodes_of_block_0 {
        debug_assert_eq!(phg.part_id(hn), block_0);
        let id = flow_hg.add_node(phg.node_weight(hn));
        node_to_flow.insert(hn, id);
        flow_to_node.push(hn);
        weight_block_0 += phg.node_weight(hn);
    }
    let sink = flow_hg.add_node(0);
    flow_to_node.push(INVALID_NODE);
    let mut weight_block_1 = 0;
    for &hn in &sub.nodes_of_block_1 {
        debug_assert_eq!(phg.part_id(hn), block_1);
        let id = flow_hg.add_node(phg.node_weight(hn));
        node_to_flow.insert(hn, id);
        flow_to_node.push(hn);
        weight_block_1 += phg.node_weight(hn);
    }
    flow_hg.set_node_weight(source, (phg.part_weight(block_0) - weight_block_0).max(0));
    flow_hg.set_node_weight(sink, (phg.part_weight(block_1) - weight_block_1).max(0));

    let mut problem = FlowProblem {
        source,
        sink,
        total_cut: 0,
        non_removable_cut: 0,
        weight_of_block_0: flow_hg.node_weight(source) + weight_block_0,
        weight_of_block_1: flow_hg.node_weight(sink) + weight_block_1,
    };

    let mut identical_nets: HashMap<u64, Vec<FlowEdgeId>> = HashMap::new();
    let mut cut_flow_edges: Vec<FlowEdgeId> = Vec::new();
    let mut tmp_pins: Vec<FlowNodeId> = Vec::new();

    for &he in &sub.hes {
        if can_hyperedge_be_dropped(phg, he, block_0, block_1, objective) {
            continue;
        }
        let he_weight = phg.edge_weight(he);
        let is_cut =
            phg.pin_count_in_part(he, block_0) > 0 && phg.pin_count_in_part(he, block_1) > 0;
        if is_cut {
            problem.total_cut += he_weight;
        }

        tmp_pins.clear();
        let mut he_hash = 0u64;
        let mut connect_to_source = false;
        let mut connect_to_sink = false;
        for &pin in phg.pins(he) {
            if let Some(&flow_pin) = node_to_flow.get(&pin) {
                tmp_pins.push(flow_pin);
                he_hash = he_hash.wrapping_add(pin_hash(flow_pin as u64));
            } else {
                let pin_block = phg.part_id(pin);
                connect_to_source |= pin_block == block_0;
                connect_to_sink |= pin_block == block_1;
            }
        }

        if (connect_to_source && connect_to_sink) || tmp_pins.is_empty() {
            // Connected to both terminals: no cut through this flow problem
            // can uncut the net, so it is left out and accounted as
            // non-removable.
            if connect_to_source && connect_to_sink {
                problem.non_removable_cut += he_weight;
            }
            continue;
        }

        let has_terminal = connect_to_source || connect_to_sink;
        if connect_to_source {
            push_terminal_front(&mut tmp_pins, source, &mut he_hash);
        } else if connect_to_sink {
            push_terminal_front(&mut tmp_pins, sink, &mut he_hash);
        }
        // Canonical order for identical-net detection: terminal first,
        // remaining pins sorted.
        tmp_pins[has_terminal as usize..].sort_unstable();

        if tmp_pins.len() > 1 {
            let bucket = identical_nets.entry(he_hash).or_default();
            if let Some(&identical) = bucket
                .iter()
                .find(|&&e| flow_hg.pins_of(e) == tmp_pins.as_slice())
            {
                flow_hg.add_capacity(identical, he_weight);
            } else {
                flow_hg.start_hyperedge(he_weight);
                for &pin in &tmp_pins {
                    flow_hg.add_pin(pin);
                }
                let flow_edge = flow_hg.close_hyperedge();
                bucket.push(flow_edge);
                if determine_distance_from_cut && is_cut {
                    cut_flow_edges.push(flow_edge);
                }
            }
        }
    }

    let mut distance_from_cut = None;
    if flow_hg.node_weight(source) == 0 || flow_hg.node_weight(sink) == 0 {
        // A terminal without represented weight means the whole block lies
        // inside the region; the flow problem degenerates.
        problem.total_cut = 0;
        problem.non_removable_cut = 0;
        flow_hg.finalize();
    } else {
        flow_hg.finalize();
        if determine_distance_from_cut {
            distance_from_cut = Some(bfs_distance_from_cut(
                phg,
                &flow_hg,
                &problem,
                block_0,
                block_1,
                &flow_to_node,
                &cut_flow_edges,
            ));
        }
    }

    FlowProblemBuild {
        flow_hg,
        problem,
        flow_to_node,
        distance_from_cut,
    }
}

fn push_terminal_front(pins: &mut Vec<FlowNodeId>, terminal: FlowNodeId, hash: &mut u64) {
    pins.push(terminal);
    *hash = hash.wrapping_add(pin_hash(terminal as u64));
    let last = pins.len() - 1;
    pins.swap(0, last);
}

/// Label every flow node with its BFS hop distance from the cut: negative
/// levels on the block-0 side, positive on the block-1 side, terminals one
/// hop beyond the farthest node of their side.
fn bfs_distance_from_cut(
    phg: &PartitionedHypergraph,
    flow_hg: &FlowHypergraph,
    problem: &FlowProblem,
    block_0: PartitionId,
    block_1: PartitionId,
    flow_to_node: &[HypernodeId],
    cut_flow_edges: &[FlowEdgeId],
) -> Vec<i64> {
    let num_nodes = flow_hg.num_nodes();
    let mut distance = vec![0i64; num_nodes];
    let mut visited = vec![false; num_nodes + flow_hg.num_hyperedges()];
    let mut queue = std::collections::VecDeque::new();
    let mut next_queue = std::collections::VecDeque::new();

    for &he in cut_flow_edges {
        for &pin in flow_hg.pins_of(he) {
            if pin != problem.source && pin != problem.sink && !visited[pin as usize] {
                visited[pin as usize] = true;
                queue.push_back(pin);
            }
        }
        visited[num_nodes + he as usize] = true;
    }

    let mut dist = 1i64;
    let mut max_dist_source = 0i64;
    let mut max_dist_sink = 0i64;
    while let Some(u) = queue.pop_front() {
        let block = phg.part_id(flow_to_node[u as usize]);
        if block == block_0 {
            distance[u as usize] = -dist;
            max_dist_source = max_dist_source.max(dist);
        } else if block == block_1 {
            distance[u as usize] = dist;
            max_dist_sink = max_dist_sink.max(dist);
        }

        for &he in flow_hg.hyperedges_of(u) {
            if !visited[num_nodes + he as usize] {
                visited[num_nodes + he as usize] = true;
                for &pin in flow_hg.pins_of(he) {
                    if pin != problem.source && pin != problem.sink && !visited[pin as usize] {
                        visited[pin as usize] = true;
                        next_queue.push_back(pin);
                    }
                }
            }
        }
        if queue.is_empty() {
            std::mem::swap(&mut queue, &mut next_queue);
            dist += 1;
        }
    }
    distance[problem.source as usize] = -(max_dist_source + 1);
    distance[problem.sink as usize] = max_dist_sink + 1;
    distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::hypergraph::tests::small_hypergraph;
    use crate::hypergraph::PartitionedHypergraph;

    fn three_way_phg() -> PartitionedHypergraph {
        let mut phg = PartitionedHypergraph::new(3, small_hypergraph());
        for (u, &b) in [0, 0, 0, 0, 1, 1, 1, 1, 2, 2].iter().enumerate() {
            phg.set_only_node_part(u as u32, b);
        }
        phg.initialize_partition();
        phg
    }

    fn region(phg: &PartitionedHypergraph, n0: &[u32], n1: &[u32]) -> Subhypergraph {
        let mut sub = Subhypergraph {
            block_0: 0,
            block_1: 1,
            nodes_of_block_0: n0.to_vec(),
            nodes_of_block_1: n1.to_vec(),
            ..Default::default()
        };
        let mut visited = vec![false; phg.hypergraph().initial_num_edges()];
        for &u in n0.iter().chain(n1) {
            for &e in phg.incident_edges(u) {
                if !visited[e as usize] {
                    visited[e as usize] = true;
                    sub.hes.push(e);
                }
            }
        }
        sub
    }

    #[test]
    fn constructs_flow_problem_for_four_region_nodes() {
        let phg = three_way_phg();
        let sub = region(&phg, &[1, 3], &[4, 6]);
        let build = construct_flow_hypergraph(&phg, &sub, Objective::Km1, false);

        // Nodes: source, 1, 3, sink, 4, 6.
        assert_eq!(build.flow_hg.num_nodes(), 6);
        assert_eq!(build.problem.source, 0);
        assert_eq!(build.problem.sink, 3);
        assert_eq!(build.flow_to_node[1], 1);
        assert_eq!(build.flow_to_node[2], 3);
        assert_eq!(build.flow_to_node[4], 4);
        assert_eq!(build.flow_to_node[5], 6);

        assert_eq!(build.problem.total_cut, 2);
        assert_eq!(build.problem.non_removable_cut, 1);
        assert_eq!(build.problem.weight_of_block_0, 4);
        assert_eq!(build.problem.weight_of_block_1, 4);
        assert_eq!(build.flow_hg.node_weight(0), 2);
        assert_eq!(build.flow_hg.node_weight(3), 2);

        // Three flow hyperedges: {S,1,3} cap 2, {1,3,4,6} cap 1, {T,4,6} cap 2.
        assert_eq!(build.flow_hg.num_hyperedges(), 3);
        let find = |pins: &[u32]| {
            (0..build.flow_hg.num_hyperedges() as u32)
                .find(|&e| build.flow_hg.pins_of(e) == pins)
                .expect("expected flow hyperedge")
        };
        assert_eq!(build.flow_hg.capacity(find(&[0, 1, 2])), 2);
        assert_eq!(build.flow_hg.capacity(find(&[1, 2, 4, 5])), 1);
        assert_eq!(build.flow_hg.capacity(find(&[3, 4, 5])), 2);
    }

    #[test]
    fn identical_nets_collapse_with_summed_capacity() {
        use crate::hypergraph::HypergraphBuilder;
        // Two identical nets of weights 3 and 5; vertices 4 and 5 keep the
        // terminals weighted without pinning into the region nets.
        let hg = HypergraphBuilder::new(6)
            .add_net(&[0, 1, 2, 3])
            .add_net(&[0, 1, 2, 3])
            .add_net(&[0, 4])
            .add_net(&[2, 5])
            .with_edge_weights(vec![3, 5, 1, 1])
            .build()
            .unwrap();
        let mut phg = PartitionedHypergraph::new(2, hg);
        for (u, &b) in [0, 0, 1, 1, 0, 1].iter().enumerate() {
            phg.set_only_node_part(u as u32, b);
        }
        phg.initialize_partition();
        let sub = region(&phg, &[0, 1], &[2, 3]);
        let build = construct_flow_hypergraph(&phg, &sub, Objective::Km1, false);
        // Both identical nets collapse into one flow hyperedge of summed
        // capacity; the two anchor nets become terminal edges.
        let merged = (0..build.flow_hg.num_hyperedges() as u32)
            .find(|&e| build.flow_hg.capacity(e) == 8)
            .expect("merged flow hyperedge");
        assert_eq!(build.flow_hg.pin_count(merged), 4);
        assert_eq!(build.problem.total_cut, 8);
    }

    #[test]
    fn distance_labels_are_signed_by_side() {
        let phg = three_way_phg();
        let sub = region(&phg, &[1, 3], &[4, 6]);
        let build = construct_flow_hypergraph(&phg, &sub, Objective::Km1, true);
        let dist = build.distance_from_cut.expect("distances requested");
        // All four region nodes touch the cut net {1,3,4,6}.
        assert_eq!(dist[1], -1);
        assert_eq!(dist[2], -1);
        assert_eq!(dist[4], 1);
        assert_eq!(dist[5], 1);
        // Terminals lie one hop beyond their side.
        assert_eq!(dist[build.problem.source as usize], -2);
        assert_eq!(dist[build.problem.sink as usize], 2);
    }

    #[test]
    fn degenerate_terminal_zeroes_the_cut() {
        // Region covers all of both blocks: source weight becomes 0.
        let phg = three_way_phg();
        let sub = region(&phg, &[0, 1, 2, 3], &[4, 5, 6, 7]);
        let build = construct_flow_hypergraph(&phg, &sub, Objective::Km1, false);
        assert_eq!(build.problem.total_cut, 0);
        assert_eq!(build.problem.non_removable_cut, 0);
    }
}
