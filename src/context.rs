//! Partitioning configuration.
//!
//! A [`Context`] bundles every knob of the multilevel pipeline into nested
//! plain-data sections. Defaults reproduce the standard configuration; the
//! deep-multilevel driver clones and adjusts a context per recursion level
//! (block count, part weights, imbalance), so all sections are `Clone`.

use std::io::BufRead;
use std::path::Path;

use crate::error::PartitionError;
use crate::hypergraph::{NodeWeight, PartitionId};

/// Objective function minimized by the partitioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Number (weight) of hyperedges spanning more than one block.
    Cut,
    /// Connectivity minus one: `sum_e w(e) * (lambda(e) - 1)`.
    Km1,
}

/// Rating score accumulated over shared nets during coarsening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorePolicy {
    /// `w(e) / (|e| - 1)` for every net shared by the pair.
    HeavyEdge,
}

/// Penalty applied to the accumulated score of a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeavyNodePenaltyPolicy {
    /// Divide the score by the product of the endpoint weights.
    Multiplicative,
    /// Use the raw score.
    NoPenalty,
}

/// Tie-breaking rule among equally rated contraction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptancePolicy {
    /// Prefer targets that are still unmatched, then decide uniformly.
    BestPreferringUnmatched,
    /// Decide uniformly among the best rated targets.
    Best,
}

/// Top-level partitioning parameters.
#[derive(Debug, Clone)]
pub struct PartitionContext {
    /// Number of blocks of the final partition.
    pub k: PartitionId,
    /// Allowed imbalance, `0 < epsilon < 1`.
    pub epsilon: f64,
    pub objective: Objective,
    pub seed: u64,
    pub verbose: bool,
    /// Perfectly balanced weight per final block; derived by
    /// [`Context::setup_part_weights`].
    pub perfect_balance_part_weights: Vec<NodeWeight>,
    /// Maximum allowed weight per final block; derived by
    /// [`Context::setup_part_weights`].
    pub max_part_weights: Vec<NodeWeight>,
}

impl Default for PartitionContext {
    fn default() -> Self {
        Self {
            k: 2,
            epsilon: 0.03,
            objective: Objective::Km1,
            seed: 0,
            verbose: false,
            perfect_balance_part_weights: Vec::new(),
            max_part_weights: Vec::new(),
        }
    }
}

/// Coarsening parameters.
#[derive(Debug, Clone)]
pub struct CoarseningContext {
    pub score_policy: ScorePolicy,
    pub heavy_node_penalty: HeavyNodePenaltyPolicy,
    pub acceptance: AcceptancePolicy,
    /// Target node count per block at the coarsest level (`C`). The driver
    /// coarsens down to `2 * C` before bipartitioning.
    pub contraction_limit_multiplier: u32,
    /// Effective contraction limit for the current (sub-)problem; set by the
    /// driver, not by users.
    pub contraction_limit: u32,
    /// Nets larger than this are ignored while rating pairs.
    pub max_hyperedge_size: usize,
    /// Upper bound on the weight of a cluster; adapted by the driver from
    /// `max_allowed_weight_multiplier`.
    pub max_allowed_node_weight: NodeWeight,
    pub max_allowed_weight_multiplier: f64,
    /// A pass may shrink the hypergraph by at most this factor.
    pub maximum_shrink_factor: f64,
    /// A pass that shrinks by less than this factor terminates coarsening.
    pub minimum_shrink_factor: f64,
    /// Honor vertex community tags while matching.
    pub respect_communities: bool,
}

impl Default for CoarseningContext {
    fn default() -> Self {
        Self {
            score_policy: ScorePolicy::HeavyEdge,
            heavy_node_penalty: HeavyNodePenaltyPolicy::Multiplicative,
            acceptance: AcceptancePolicy::BestPreferringUnmatched,
            contraction_limit_multiplier: 160,
            contraction_limit: 320,
            max_hyperedge_size: 1000,
            max_allowed_node_weight: NodeWeight::MAX,
            max_allowed_weight_multiplier: 1.0,
            maximum_shrink_factor: 2.5,
            minimum_shrink_factor: 1.01,
            respect_communities: true,
        }
    }
}

/// Initial-partitioning (portfolio) parameters.
#[derive(Debug, Clone)]
pub struct InitialPartitioningContext {
    /// Runs per portfolio algorithm; each run gets its own derived seed.
    pub runs: usize,
}

impl Default for InitialPartitioningContext {
    fn default() -> Self {
        Self { runs: 5 }
    }
}

/// Label-propagation refinement parameters.
#[derive(Debug, Clone)]
pub struct LabelPropagationContext {
    pub enabled: bool,
    pub max_rounds: usize,
}

impl Default for LabelPropagationContext {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rounds: 5,
        }
    }
}

/// Localized k-way FM parameters.
#[derive(Debug, Clone)]
pub struct FmContext {
    pub enabled: bool,
    pub max_rounds: usize,
    /// A search stops after this many consecutive non-positive-gain moves.
    pub max_fruitless_moves: usize,
    /// Pins of nets at least this large are not activated as neighbors.
    pub hyperedge_size_activation_threshold: usize,
}

impl Default for FmContext {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rounds: 10,
            max_fruitless_moves: 250,
            hyperedge_size_activation_threshold: 50,
        }
    }
}

/// Flow refinement parameters (builder side; the max-flow solver is an
/// external collaborator registered at runtime).
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub enabled: bool,
    /// Seed the piercing heuristic with BFS distances from the cut.
    pub determine_distance_from_cut: bool,
    /// Grow the flow region around the cut up to this multiple of the
    /// perfectly balanced block weight on each side.
    pub region_growth_factor: f64,
}

impl Default for FlowContext {
    fn default() -> Self {
        Self {
            enabled: false,
            determine_distance_from_cut: true,
            region_growth_factor: 0.25,
        }
    }
}

/// Refinement chain parameters.
#[derive(Debug, Clone, Default)]
pub struct RefinementContext {
    pub label_propagation: LabelPropagationContext,
    pub fm: FmContext,
    pub flow: FlowContext,
}

/// Shared-memory execution parameters.
#[derive(Debug, Clone)]
pub struct SharedMemoryContext {
    pub num_threads: usize,
    /// Fork parallel deep-multilevel recursions when the coarsening
    /// invariant `nodes >= threads * 2C` is violated.
    pub perform_parallel_recursion: bool,
}

impl Default for SharedMemoryContext {
    fn default() -> Self {
        Self {
            num_threads: 1,
            perform_parallel_recursion: true,
        }
    }
}

/// Full configuration of a partitioning run.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub partition: PartitionContext,
    pub coarsening: CoarseningContext,
    pub initial_partitioning: InitialPartitioningContext,
    pub refinement: RefinementContext,
    pub shared_memory: SharedMemoryContext,
}

impl Context {
    /// Validate user-facing parameters before a run.
    pub fn validate(&self) -> Result<(), PartitionError> {
        if self.partition.k < 2 {
            return Err(PartitionError::InvalidBlockCount(self.partition.k));
        }
        if !(self.partition.epsilon > 0.0 && self.partition.epsilon < 1.0) {
            return Err(PartitionError::InvalidEpsilon(self.partition.epsilon));
        }
        Ok(())
    }

    /// Derive perfectly balanced and maximum part weights for the final
    /// partition from the total vertex weight.
    pub fn setup_part_weights(&mut self, total_weight: NodeWeight) {
        let k = self.partition.k as usize;
        let perfect = div_ceil(total_weight, self.partition.k as NodeWeight);
        self.partition.perfect_balance_part_weights = vec![perfect; k];
        let max = ((1.0 + self.partition.epsilon) * perfect as f64).floor() as NodeWeight;
        self.partition.max_part_weights = vec![max; k];
    }

    /// Derive the cluster weight cap for coarsening towards `limit_k` blocks.
    pub fn setup_max_allowed_node_weight(&mut self, total_weight: NodeWeight, limit_k: PartitionId) {
        let fraction = self.coarsening.max_allowed_weight_multiplier
            / (limit_k as f64 * self.coarsening.contraction_limit_multiplier as f64);
        self.coarsening.max_allowed_node_weight = (fraction * total_weight as f64).ceil() as NodeWeight;
    }

    /// Load key/value overrides from an INI-like file: one `key=value` per
    /// line, `#` starts a comment. Unknown keys are ignored so configs can be
    /// shared across versions.
    pub fn configure_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PartitionError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| PartitionError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line.map_err(|e| PartitionError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            self.apply_key_value(key.trim(), value.trim())?;
        }
        Ok(())
    }

    fn apply_key_value(&mut self, key: &str, value: &str) -> Result<(), PartitionError> {
        let invalid = || PartitionError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "objective" => {
                self.partition.objective = match value {
                    "cut" => Objective::Cut,
                    "km1" => Objective::Km1,
                    _ => return Err(invalid()),
                }
            }
            "epsilon" => self.partition.epsilon = value.parse().map_err(|_| invalid())?,
            "seed" => self.partition.seed = value.parse().map_err(|_| invalid())?,
            "verbose" => self.partition.verbose = value.parse().map_err(|_| invalid())?,
            "num-threads" => {
                self.shared_memory.num_threads = value.parse().map_err(|_| invalid())?
            }
            "contraction-limit-multiplier" => {
                self.coarsening.contraction_limit_multiplier =
                    value.parse().map_err(|_| invalid())?
            }
            "max-allowed-weight-multiplier" => {
                self.coarsening.max_allowed_weight_multiplier =
                    value.parse().map_err(|_| invalid())?
            }
            "max-hyperedge-size" => {
                self.coarsening.max_hyperedge_size = value.parse().map_err(|_| invalid())?
            }
            "minimum-shrink-factor" => {
                self.coarsening.minimum_shrink_factor = value.parse().map_err(|_| invalid())?
            }
            "maximum-shrink-factor" => {
                self.coarsening.maximum_shrink_factor = value.parse().map_err(|_| invalid())?
            }
            "initial-runs" => {
                self.initial_partitioning.runs = value.parse().map_err(|_| invalid())?
            }
            "lp-enabled" => {
                self.refinement.label_propagation.enabled = value.parse().map_err(|_| invalid())?
            }
            "lp-max-rounds" => {
                self.refinement.label_propagation.max_rounds =
                    value.parse().map_err(|_| invalid())?
            }
            "fm-enabled" => self.refinement.fm.enabled = value.parse().map_err(|_| invalid())?,
            "fm-max-rounds" => {
                self.refinement.fm.max_rounds = value.parse().map_err(|_| invalid())?
            }
            "fm-max-fruitless-moves" => {
                self.refinement.fm.max_fruitless_moves = value.parse().map_err(|_| invalid())?
            }
            "flow-enabled" => {
                self.refinement.flow.enabled = value.parse().map_err(|_| invalid())?
            }
            _ => {}
        }
        Ok(())
    }
}

/// Ceiling division for non-negative weights.
#[inline]
pub fn div_ceil(a: NodeWeight, b: NodeWeight) -> NodeWeight {
    debug_assert!(b > 0);
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_validates() {
        let mut ctx = Context::default();
        ctx.partition.k = 4;
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut ctx = Context::default();
        ctx.partition.k = 1;
        assert!(matches!(
            ctx.validate(),
            Err(PartitionError::InvalidBlockCount(1))
        ));
        ctx.partition.k = 2;
        ctx.partition.epsilon = 0.0;
        assert!(matches!(
            ctx.validate(),
            Err(PartitionError::InvalidEpsilon(_))
        ));
    }

    #[test]
    fn part_weights_respect_epsilon() {
        let mut ctx = Context::default();
        ctx.partition.k = 8;
        ctx.partition.epsilon = 0.03;
        ctx.setup_part_weights(1000);
        assert_eq!(ctx.partition.perfect_balance_part_weights, vec![125; 8]);
        assert_eq!(ctx.partition.max_part_weights, vec![128; 8]);
    }

    #[test]
    fn config_file_round_trip() {
        let dir = std::env::temp_dir().join("hyperpart_cfg_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.ini");
        std::fs::write(
            &path,
            "# sample config\nobjective=cut\nepsilon=0.1\nseed=7\nfm-max-fruitless-moves=99\n",
        )
        .unwrap();
        let mut ctx = Context::default();
        ctx.configure_from_file(&path).unwrap();
        assert_eq!(ctx.partition.objective, Objective::Cut);
        assert_eq!(ctx.partition.seed, 7);
        assert_eq!(ctx.refinement.fm.max_fruitless_moves, 99);
    }
}
