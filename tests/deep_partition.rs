//! End-to-end deep multilevel partitioning.

mod common;

use hyperpart::context::{Context, Objective};
use hyperpart::metrics;

fn context_for(k: i32, epsilon: f64, seed: u64, threads: usize) -> Context {
    let mut context = Context::default();
    context.partition.k = k;
    context.partition.epsilon = epsilon;
    context.partition.seed = seed;
    context.shared_memory.num_threads = threads;
    // Small instances: coarsen aggressively enough to exercise several
    // levels without the production-size limits.
    context.coarsening.contraction_limit_multiplier = 8;
    context.initial_partitioning.runs = 3;
    context
}

#[test]
fn k8_partition_is_complete_and_balanced() {
    let hg = common::clustered_hypergraph(600, 900, 8, 5, 3);
    let total_weight = hg.total_weight();
    let context = context_for(8, 0.03, 42, 2);
    let phg = hyperpart::partition(hg, &context).unwrap();

    // Every vertex carries a block id in [0, 8).
    for u in phg.nodes() {
        let block = phg.part_id(u);
        assert!((0..8).contains(&block), "vertex {u} in block {block}");
    }
    // Block weights add up ...
    let sum: i64 = (0..8).map(|b| phg.part_weight(b)).sum();
    assert_eq!(sum, total_weight);
    // ... and respect the balance constraint, within one unit of integer
    // rounding slack.
    let perfect = (total_weight + 7) / 8;
    let cap = ((1.0 + 0.03) * perfect as f64).floor() as i64 + 1;
    for block in 0..8 {
        assert!(
            phg.part_weight(block) <= cap,
            "block {block} weighs {} (cap {cap})",
            phg.part_weight(block)
        );
    }
    phg.debug_check_partition();
}

#[test]
fn km1_objective_beats_random_assignment() {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    let hg = common::clustered_hypergraph(400, 600, 4, 5, 17);
    let context = context_for(4, 0.05, 7, 1);
    let phg = hyperpart::partition(hg.clone(), &context).unwrap();
    let achieved = metrics::km1(&phg);

    let random = hyperpart::hypergraph::PartitionedHypergraph::new(4, hg);
    let mut rng = SmallRng::seed_from_u64(7);
    let nodes: Vec<u32> = random.nodes().collect();
    for u in nodes {
        random.set_node_part(u, rng.gen_range(0..4));
    }
    assert!(
        achieved < metrics::km1(&random),
        "multilevel result ({achieved}) not better than random"
    );
}

#[test]
fn uneven_k_uses_every_block() {
    let hg = common::clustered_hypergraph(350, 500, 7, 4, 23);
    let context = context_for(7, 0.1, 11, 1);
    let phg = hyperpart::partition(hg, &context).unwrap();
    for block in 0..7 {
        assert!(
            phg.part_weight(block) > 0,
            "block {block} ended up empty"
        );
    }
    phg.debug_check_partition();
}

#[test]
fn cut_objective_is_supported() {
    let hg = common::clustered_hypergraph(300, 450, 4, 4, 29);
    let mut context = context_for(4, 0.05, 13, 1);
    context.partition.objective = Objective::Cut;
    let phg = hyperpart::partition(hg, &context).unwrap();
    assert!(metrics::cut(&phg) <= metrics::km1(&phg));
    phg.debug_check_partition();
}

#[test]
fn same_seed_same_thread_count_is_reproducible() {
    let context = context_for(4, 0.05, 99, 1);
    let a = hyperpart::partition(common::clustered_hypergraph(200, 300, 4, 4, 31), &context).unwrap();
    let b = hyperpart::partition(common::clustered_hypergraph(200, 300, 4, 4, 31), &context).unwrap();
    assert_eq!(metrics::km1(&a), metrics::km1(&b));
}

#[test]
fn rejects_invalid_parameters() {
    let hg = common::small_hypergraph();
    let mut context = Context::default();
    context.partition.k = 1;
    assert!(hyperpart::partition(hg.clone(), &context).is_err());
    context.partition.k = 2;
    context.partition.epsilon = 1.5;
    assert!(hyperpart::partition(hg, &context).is_err());
}
