//! hMetis reader against the shipped instances, end to end into the
//! partitioner.

use hyperpart::context::Context;
use hyperpart::io;
use hyperpart::metrics;

fn instance(name: &str) -> String {
    format!("{}/tests/instances/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn reads_two_cliques_instance() {
    let csr = io::read_hypergraph_file(instance("twocliques.hgr")).unwrap();
    assert_eq!(csr.num_nodes, 12);
    assert_eq!(csr.num_edges(), 11);
    // Pins are converted to 0-based ids.
    assert_eq!(csr.pins[..3], [0, 1, 2]);
    let hg = csr.to_hypergraph().unwrap();
    assert_eq!(hg.total_weight(), 12);
    assert_eq!(hg.initial_num_pins(), 32);
}

#[test]
fn reads_weighted_instance() {
    let csr = io::read_hypergraph_file(instance("weighted.hgr")).unwrap();
    assert_eq!(csr.edge_weights, vec![2, 3, 8, 7]);
    assert_eq!(csr.node_weights, vec![5, 1, 8, 7, 3, 9, 3]);
    let hg = csr.to_hypergraph().unwrap();
    assert_eq!(hg.total_weight(), 36);
}

#[test]
fn bipartitions_two_cliques_along_the_bridge() {
    let csr = io::read_hypergraph_file(instance("twocliques.hgr")).unwrap();
    let mut context = Context::default();
    context.partition.k = 2;
    context.partition.epsilon = 0.1;
    context.partition.seed = 1;
    context.coarsening.contraction_limit_multiplier = 4;
    let phg = hyperpart::partition(csr.to_hypergraph().unwrap(), &context).unwrap();
    // The instance has an obvious bipartition cutting only the bridge
    // net; anything beyond one stray move means refinement broke.
    assert!(metrics::cut(&phg) <= 2, "cut = {}", metrics::cut(&phg));
    assert_eq!(phg.part_weight(0), 6);
    assert_eq!(phg.part_weight(1), 6);
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        io::read_hypergraph_file(instance("nope.hgr")),
        Err(hyperpart::PartitionError::Io { .. })
    ));
}
