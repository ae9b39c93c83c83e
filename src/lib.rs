//! # hyperpart
//!
//! hyperpart is a shared-memory parallel multilevel hypergraph partitioner.
//! Given a hypergraph with vertex and hyperedge weights, a block count `k`
//! and an imbalance tolerance `epsilon`, it computes a k-way partition
//! minimizing either the edge cut or the connectivity metric (λ - 1) while
//! respecting the balance constraint.
//!
//! ## Features
//! - Mutable hypergraph with concurrent partition overlay (pin counts per
//!   block, connectivity sets, gain tables) and exact-inverse contraction
//! - Iterative parallel clustering coarsening with a CAS-based matching
//!   protocol and weight-capped heavy-edge rating
//! - Deep multilevel scheme: recursive bipartitioning during uncoarsening
//!   with adaptive imbalance and parallel sub-recursions
//! - Refinement chain: label propagation, localized k-way FM with a shared
//!   move log and global best-prefix rollback, and a flow-based refiner
//!   builder with identical-net deduplication (the max-flow solver itself
//!   is pluggable via [`refinement::flow::MaxFlowSolver`])
//! - hMetis file reader and a C ABI for thin shells ([`ffi`])
//!
//! ## Usage
//! ```no_run
//! use hyperpart::prelude::*;
//!
//! let csr = hyperpart::io::read_hypergraph_file("netlist.hgr")?;
//! let mut context = Context::default();
//! context.partition.k = 8;
//! context.partition.epsilon = 0.03;
//! context.partition.objective = Objective::Km1;
//! context.shared_memory.num_threads = 4;
//! let phg = hyperpart::partition(csr.to_hypergraph()?, &context)?;
//! println!("km1 = {}", hyperpart::metrics::km1(&phg));
//! # Ok::<(), hyperpart::PartitionError>(())
//! ```
//!
//! The partitioner is a pure function of its inputs, the seed, the
//! configuration and the thread count; it holds no persistent state.

pub mod coarsening;
pub mod context;
pub mod deep;
pub mod error;
pub mod ffi;
pub mod hypergraph;
pub mod initial;
pub mod io;
pub mod metrics;
pub mod parallel;
pub mod refinement;

pub use crate::context::{Context, Objective};
pub use crate::deep::{partition, partition_with_solver};
pub use crate::error::PartitionError;

/// A convenient prelude to import the most-used types.
pub mod prelude {
    pub use crate::context::{Context, Objective};
    pub use crate::deep::{partition, partition_with_solver};
    pub use crate::error::PartitionError;
    pub use crate::hypergraph::{
        Hypergraph, HypergraphBuilder, PartitionedHypergraph, INVALID_PARTITION,
    };
    pub use crate::refinement::flow::{FlowBipartition, MaxFlowSolver};
}
