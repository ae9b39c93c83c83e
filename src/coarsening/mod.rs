//! Parallel clustering coarsening and the reverse (uncoarsening) walk.

pub mod clustering;
pub mod coarsener;
pub mod rating;
pub mod uncoarsener;

pub use self::clustering::ClusteringState;
pub use self::coarsener::{Level, MultilevelCoarsener};
pub use self::rating::{Rating, VertexPairRater};
pub use self::uncoarsener::Uncoarsener;
