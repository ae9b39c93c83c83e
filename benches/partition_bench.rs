//! Criterion benchmarks: the pin-count hot path and a full deep
//! multilevel partitioning run on a generated instance.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hyperpart::context::Context;
use hyperpart::hypergraph::{HypergraphBuilder, PartitionedHypergraph};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn clustered_hypergraph(num_nodes: usize, num_edges: usize, seed: u64) -> hyperpart::hypergraph::Hypergraph {
    let mut rng = SmallRng::seed_from_u64(seed);
    let groups = 16;
    let group_size = num_nodes / groups;
    let mut builder = HypergraphBuilder::new(num_nodes);
    for _ in 0..num_edges {
        let group = rng.gen_range(0..groups);
        let size = rng.gen_range(2..=6);
        let mut pins = Vec::with_capacity(size);
        while pins.len() < size {
            let pin = if rng.gen_bool(0.9) {
                (group * group_size + rng.gen_range(0..group_size)) as u64
            } else {
                rng.gen_range(0..num_nodes) as u64
            };
            if !pins.contains(&pin) {
                pins.push(pin);
            }
        }
        builder = builder.add_net(&pins);
    }
    builder.build().unwrap()
}

fn bench_change_node_part(c: &mut Criterion) {
    let hg = clustered_hypergraph(2000, 3000, 1);
    let mut phg = PartitionedHypergraph::new(8, hg);
    let mut rng = SmallRng::seed_from_u64(2);
    let nodes: Vec<u32> = phg.nodes().collect();
    for &u in &nodes {
        phg.set_only_node_part(u, rng.gen_range(0..8));
    }
    phg.initialize_partition();

    c.bench_function("change_node_part", |b| {
        b.iter(|| {
            let u = nodes[rng.gen_range(0..nodes.len())];
            let from = phg.part_id(u);
            let to = (from + 1) % 8;
            phg.change_node_part(u, from, to);
            phg.change_node_part(u, to, from);
        })
    });
}

fn bench_deep_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_partition");
    group.sample_size(10);
    for &k in &[2, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            let hg = clustered_hypergraph(4000, 6000, 3);
            let mut context = Context::default();
            context.partition.k = k;
            context.partition.epsilon = 0.03;
            context.partition.seed = 42;
            context.coarsening.contraction_limit_multiplier = 32;
            context.shared_memory.num_threads = 2;
            b.iter(|| hyperpart::partition(hg.clone(), &context).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_change_node_part, bench_deep_partition);
criterion_main!(benches);
