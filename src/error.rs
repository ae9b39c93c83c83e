//! PartitionError: unified error type for hyperpart public APIs
//!
//! This error type is used at the library boundary only. Inside the core,
//! transient concurrency conflicts are recovered by the protocols that cause
//! them, and broken invariants are a debug-assertion surface, never a
//! `Result`.

use thiserror::Error;

/// Unified error type for hyperpart operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PartitionError {
    /// The hypergraph file header is missing or malformed.
    #[error("invalid hypergraph header: {0}")]
    InvalidHeader(String),
    /// A pin references a vertex id outside the declared vertex range.
    #[error("pin {pin} of hyperedge {hyperedge} is out of range (|V| = {num_nodes})")]
    PinOutOfRange {
        hyperedge: usize,
        pin: u64,
        num_nodes: usize,
    },
    /// Entity counts exceed the 32-bit id width of this build.
    #[error("hypergraph too large: {entity} count {count} exceeds the 32-bit id range")]
    TooManyEntities { entity: &'static str, count: usize },
    /// Requested block count k < 2.
    #[error("invalid block count k = {0} (need k >= 2)")]
    InvalidBlockCount(i32),
    /// Imbalance parameter outside (0, 1).
    #[error("invalid imbalance parameter epsilon = {0} (need 0 < epsilon < 1)")]
    InvalidEpsilon(f64),
    /// A vertex or hyperedge weight is zero or negative.
    #[error("non-positive {entity} weight {weight} at index {index}")]
    NonPositiveWeight {
        entity: &'static str,
        index: usize,
        weight: i64,
    },
    /// Underlying I/O failure while reading an input file.
    #[error("i/o error reading `{path}`: {message}")]
    Io { path: String, message: String },
    /// A configuration file key has an unparsable value.
    #[error("invalid config value for `{key}`: {value}")]
    InvalidConfigValue { key: String, value: String },
}
