//! Shared helpers for the integration suites.

use hyperpart::hypergraph::{Hypergraph, HypergraphBuilder};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// The 10-vertex instance used across the suites.
pub fn small_hypergraph() -> Hypergraph {
    HypergraphBuilder::new(10)
        .add_net(&[0, 1, 3])
        .add_net(&[1, 2, 3])
        .add_net(&[4, 5, 6])
        .add_net(&[4, 6, 7])
        .add_net(&[1, 3, 4, 6])
        .add_net(&[0, 1, 4, 5])
        .add_net(&[3, 8])
        .add_net(&[6, 9])
        .build()
        .unwrap()
}

/// Deterministic clustered hypergraph: `num_nodes` vertices in
/// `num_groups` latent groups, nets of 2..=`max_net_size` pins drawn
/// mostly within a group so partitioners have structure to find.
pub fn clustered_hypergraph(
    num_nodes: usize,
    num_edges: usize,
    num_groups: usize,
    max_net_size: usize,
    seed: u64,
) -> Hypergraph {
    let mut rng = SmallRng::seed_from_u64(seed);
    let group_size = num_nodes / num_groups;
    let mut builder = HypergraphBuilder::new(num_nodes);
    for _ in 0..num_edges {
        let group = rng.gen_range(0..num_groups);
        let size = rng.gen_range(2..=max_net_size);
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
