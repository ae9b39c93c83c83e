//! Flow-hypergraph construction on the reference 10-vertex instance
//! partitioned as {0,1,2,3 | 4,5,6,7 | 8,9}, for growing regions around
//! the cut between blocks 0 and 1.

mod common;

use hyperpart::context::Objective;
use hyperpart::hypergraph::flow::FlowHypergraph;
use hyperpart::hypergraph::PartitionedHypergraph;
use hyperpart::refinement::flow::builder::{construct_flow_hypergraph, FlowProblemBuild};
use hyperpart::refinement::flow::{FlowProblem, Subhypergraph};

fn three_way_phg() -> PartitionedHypergraph {
    let mut phg = PartitionedHypergraph::new(3, common::small_hypergraph());
    for (u, &b) in [0, 0, 0, 0, 1, 1, 1, 1, 2, 2].iter().enumerate() {
        phg.set_only_node_part(u as u32, b);
    }
    phg.initialize_partition();
    phg
}

/// Region with explicit node sets; nets are collected in region order as
/// the refiner does.
fn subhypergraph(phg: &PartitionedHypergraph, n0: &[u32], n1: &[u32]) -> Subhypergraph {
    let mut sub = Subhypergraph {
        block_0: 0,
        block_1: 1,
        nodes_of_block_0: n0.to_vec(),
        nodes_of_block_1: n1.to_vec(),
        ..Default::default()
    };
    let mut visited = vec![false; phg.hypergraph().initial_num_edges()];
    for &u in n0.iter().chain(n1) {
        sub.num_pins += phg.incident_edges(u).len();
        for &e in phg.incident_edges(u) {
            if !visited[e as usize] {
                visited[e as usize] = true;
                sub.hes.push(e);
            }
        }
    }
    sub
}

fn build(phg: &PartitionedHypergraph, n0: &[u32], n1: &[u32]) -> FlowProblemBuild {
    let sub = subhypergraph(phg, n0, n1);
    construct_flow_hypergraph(phg, &sub, Objective::Km1, false)
}

fn assert_problem(actual: &FlowProblem, expected: &FlowProblem) {
    assert_eq!(actual.source, expected.source);
    assert_eq!(actual.sink, expected.sink);
    assert_eq!(actual.total_cut, expected.total_cut, "total cut");
    assert_eq!(
        actual.non_removable_cut, expected.non_removable_cut,
        "non-removable cut"
    );
    assert_eq!(actual.weight_of_block_0, expected.weight_of_block_0);
    assert_eq!(actual.weight_of_block_1, expected.weight_of_block_1);
}

/// Every expected hyperedge (canonical pins, capacity) must exist exactly.
fn assert_hyperedges(flow_hg: &FlowHypergraph, expected: &[(&[u32], i64)]) {
    assert_eq!(flow_hg.num_hyperedges(), expected.len());
    let mut matched = vec![false; expected.len()];
    for e in 0..flow_hg.num_hyperedges() as u32 {
        let idx = expected
            .iter()
            .enumerate()
            .position(|(i, &(pins, capacity))| {
                !matched[i] && flow_hg.pins_of(e) == pins && flow_hg.capacity(e) == capacity
            });
        let idx = idx.unwrap_or_else(|| {
            panic!("unexpected flow hyperedge {:?}", flow_hg.pins_of(e))
        });
        matched[idx] = true;
    }
}

#[test]
fn region_with_one_node_per_side() {
    let phg = three_way_phg();
    let result = build(&phg, &[1], &[4]);
    assert_problem(
        &result.problem,
        &FlowProblem {
            source: 0,
            sink: 2,
            total_cut: 2,
            non_removable_cut: 2,
            weight_of_block_0: 4,
            weight_of_block_1: 4,
        },
    );
    assert_eq!(result.flow_hg.num_nodes(), 4);
    assert_eq!(result.flow_hg.num_pins(), 4);
    assert_eq!(result.flow_to_node[1], 1);
    assert_eq!(result.flow_to_node[3], 4);
    assert_hyperedges(&result.flow_hg, &[(&[0, 1], 2), (&[2, 3], 2)]);
}

#[test]
fn region_with_two_source_side_nodes() {
    let phg = three_way_phg();
    let result = build(&phg, &[1, 3], &[4]);
    assert_problem(
        &result.problem,
        &FlowProblem {
            source: 0,
            sink: 3,
            total_cut: 2,
            non_removable_cut: 1,
            weight_of_block_0: 4,
            weight_of_block_1: 4,
        },
    );
    assert_eq!(result.flow_hg.num_nodes(), 5);
    assert_eq!(result.flow_hg.num_pins(), 9);
    assert_hyperedges(
        &result.flow_hg,
        &[(&[0, 1, 2], 2), (&[3, 1, 2, 4], 1), (&[3, 4], 2)],
    );
}

#[test]
fn region_with_two_nodes_per_side() {
    let phg = three_way_phg();
    let result = build(&phg, &[1, 3], &[4, 6]);
    assert_problem(
        &result.problem,
        &FlowProblem {
            source: 0,
            sink: 3,
            total_cut: 2,
            non_removable_cut: 1,
            weight_of_block_0: 4,
            weight_of_block_1: 4,
        },
    );
    assert_eq!(result.flow_hg.num_nodes(), 6);
    assert_eq!(result.flow_hg.num_pins(), 10);
    assert_hyperedges(
        &result.flow_hg,
        &[(&[0, 1, 2], 2), (&[1, 2, 4, 5], 1), (&[3, 4, 5], 2)],
    );
}

#[test]
fn region_with_five_nodes() {
    let phg = three_way_phg();
    let result = build(&phg, &[1, 3], &[4, 5, 6]);
    assert_problem(
        &result.problem,
        &FlowProblem {
            source: 0,
            sink: 3,
            total_cut: 2,
            non_removable_cut: 0,
            weight_of_block_0: 4,
            weight_of_block_1: 4,
        },
    );
    assert_eq!(result.flow_hg.num_nodes(), 7);
    assert_eq!(result.flow_hg.num_pins(), 17);
    assert_hyperedges(
        &result.flow_hg,
        &[
            (&[0, 1, 2], 2),
            (&[1, 2, 4, 6], 1),
            (&[0, 1, 4, 5], 1),
            (&[4, 5, 6], 1),
            (&[3, 4, 6], 1),
        ],
    );
}

#[test]
fn region_covering_both_blocks_degenerates() {
    let phg = three_way_phg();
    let result = build(&phg, &[0, 1, 2, 3], &[4, 5, 6, 7]);
    assert_eq!(result.problem.source, 0);
    assert_eq!(result.problem.sink, 5);
    assert_eq!(result.problem.total_cut, 0);
    assert_eq!(result.problem.non_removable_cut, 0);
    assert_eq!(result.problem.weight_of_block_0, 4);
    assert_eq!(result.problem.weight_of_block_1, 4);
}

#[test]
fn identical_nets_merge_into_one_capacity() {
    use hyperpart::hypergraph::HypergraphBuilder;
    let hg = HypergraphBuilder::new(6)
        .add_net(&[0, 1, 2, 3])
        .add_net(&[3, 2, 1, 0])
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
    let mut sub = Subhypergraph {
        block_0: 0,
        block_1: 1,
        nodes_of_block_0: vec![0, 1],
        nodes_of_block_1: vec![2, 3],
        ..Default::default()
    };
    sub.hes = vec![0, 1, 2, 3];
    let result = construct_flow_hypergraph(&phg, &sub, Objective::Km1, false);
    // The two identical weight-3 and weight-5 nets collapse to capacity 8.
    let merged = (0..result.flow_hg.num_hyperedges() as u32)
        .find(|&e| result.flow_hg.pin_count(e) == 4)
        .expect("merged hyperedge");
    assert_eq!(result.flow_hg.capacity(merged), 8);
    assert_eq!(result.problem.total_cut, 8);
}

#[test]
fn distance_labels_partition_the_region() {
    let phg = three_way_phg();
    let sub = subhypergraph(&phg, &[1, 3], &[4, 6]);
    let result = construct_flow_hypergraph(&phg, &sub, Objective::Km1, true);
    let dist = result.distance_from_cut.expect("distances requested");
    for flow_node in [1usize, 2] {
        assert!(dist[flow_node] < 0, "source side must get negative labels");
    }
    for flow_node in [4usize, 5] {
        assert!(dist[flow_node] > 0, "sink side must get positive labels");
    }
    assert!(dist[result.problem.source as usize] < dist[1]);
    assert!(dist[result.problem.sink as usize] > dist[4]);
}
