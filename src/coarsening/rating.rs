//! Vertex-pair rating for clustering coarsening.
//!
//! For an unmatched vertex `u`, the rater accumulates a heavy-edge score
//! over every net shared with a neighbor, applies the heavy-node penalty,
//! filters candidates whose cluster would exceed the weight cap, and
//! returns the best-rated contraction target.

use std::sync::atomic::Ordering;

use hashbrown::HashMap;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::context::{AcceptancePolicy, Context, HeavyNodePenaltyPolicy, ScorePolicy};
use crate::coarsening::clustering::{ClusteringState, UNMATCHED};
use crate::hypergraph::{Hypergraph, HypernodeId, INVALID_NODE};

/// Result of rating one vertex.
#[derive(Debug, Clone, Copy)]
pub struct Rating {
    /// Best contraction target, or `INVALID_NODE` if no candidate fits.
    pub target: HypernodeId,
    pub value: f64,
}

impl Rating {
    pub fn none() -> Self {
        Self {
            target: INVALID_NODE,
            value: f64::MIN,
        }
    }
}

/// Enum-dispatched rating policies (score, penalty, acceptance).
#[derive(Debug, Clone, Copy)]
pub struct VertexPairRater {
    score_policy: ScorePolicy,
    penalty_policy: HeavyNodePenaltyPolicy,
    acceptance: AcceptancePolicy,
    max_hyperedge_size: usize,
    respect_communities: bool,
}

impl VertexPairRater {
    pub fn new(context: &Context) -> Self {
        Self {
            score_policy: context.coarsening.score_policy,
            penalty_policy: context.coarsening.heavy_node_penalty,
            acceptance: context.coarsening.acceptance,
            max_hyperedge_size: context.coarsening.max_hyperedge_size,
            respect_communities: context.coarsening.respect_communities,
        }
    }

    /// Rate all neighbors of `u` and pick the best admissible target.
    pub fn rate(
        &self,
        hg: &Hypergraph,
        u: HypernodeId,
        state: &ClusteringState,
        max_allowed_node_weight: i64,
        rng: &mut SmallRng,
    ) -> Rating {
        let weight_u = hg.node_weight(u);
        // Accumulate in neighbor-discovery order so tie-breaking is
        // reproducible for a fixed seed.
        let mut scores: Vec<(HypernodeId, f64)> = Vec::new();
        let mut score_index: HashMap<HypernodeId, usize> = HashMap::new();
        for &e in hg.incident_edges(u) {
            let size = hg.edge_size(e);
            if size <= 1 || size > self.max_hyperedge_size {
                continue;
            }
            let score = match self.score_policy {
                ScorePolicy::HeavyEdge => hg.edge_weight(e) as f64 / (size - 1) as f64,
            };
            for &v in hg.pins(e) {
                if v != u {
                    match score_index.entry(v) {
                        hashbrown::hash_map::Entry::Occupied(slot) => {
                            scores[*slot.get()].1 += score;
                        }
                        hashbrown::hash_map::Entry::Vacant(slot) => {
                            slot.insert(scores.len());
                            scores.push((v, score));
                        }
                    }
                }
            }
        }

        let mut best = Rating::none();
        let mut best_unmatched = false;
        for &(v, score) in &scores {
            if self.respect_communities
                && hg.has_communities()
                && hg.community(u) != hg.community(v)
            {
                continue;
            }
            let representative = state.cluster_ids[v as usize].load(Ordering::Acquire);
            let cluster_weight = state.cluster_weights[representative as usize].load(Ordering::Acquire);
            if weight_u + cluster_weight > max_allowed_node_weight {
                continue;
            }
            let penalty = match self.penalty_policy {
                HeavyNodePenaltyPolicy::Multiplicative => {
                    (weight_u * hg.node_weight(v)).max(1) as f64
                }
                HeavyNodePenaltyPolicy::NoPenalty => 1.0,
            };
            let value = score / penalty;
            let unmatched = state.states[v as usize].load(Ordering::Acquire) == UNMATCHED;
            let take = if value > best.value {
                true
            } else if value == best.value {
                match self.acceptance {
                    AcceptancePolicy::BestPreferringUnmatched => {
                        (unmatched && !best_unmatched)
                            || (unmatched == best_unmatched && rng.gen_bool(0.5))
                    }
                    AcceptancePolicy::Best => rng.gen_bool(0.5),
                }
            } else {
                false
            };
            if take {
                best = Rating { target: v, value };
                best_unmatched = unmatched;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::HypergraphBuilder;
    use rand::SeedableRng;

    #[test]
    fn prefers_heavier_shared_nets() {
        // 0 shares a weight-4 net with 1 and a weight-1 net with 2.
        let hg = HypergraphBuilder::new(3)
            .add_net(&[0, 1])
            .add_net(&[0, 2])
            .with_edge_weights(vec![4, 1])
            .build()
            .unwrap();
        let state = ClusteringState::new(3);
        state.reset(&hg);
        let rater = VertexPairRater::new(&Context::default());
        let mut rng = SmallRng::seed_from_u64(1);
        let rating = rater.rate(&hg, 0, &state, i64::MAX, &mut rng);
        assert_eq!(rating.target, 1);
    }

    #[test]
    fn respects_weight_cap() {
        let hg = HypergraphBuilder::new(2)
            .add_net(&[0, 1])
            .with_node_weights(vec![3, 3])
            .build()
            .unwrap();
        let state = ClusteringState::new(2);
        state.reset(&hg);
        let rater = VertexPairRater::new(&Context::default());
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(rater.rate(&hg, 0, &state, 5, &mut rng).target, INVALID_NODE);
        assert_eq!(rater.rate(&hg, 0, &state, 6, &mut rng).target, 1);
    }

    #[test]
    fn skips_oversized_nets() {
        let hg = HypergraphBuilder::new(5)
            .add_net(&[0, 1, 2, 3, 4])
            .build()
            .unwrap();
        let state = ClusteringState::new(5);
        state.reset(&hg);
        let mut ctx = Context::default();
        ctx.coarsening.max_hyperedge_size = 4;
        let rater = VertexPairRater::new(&ctx);
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(
            rater.rate(&hg, 0, &state, i64::MAX, &mut rng).target,
            INVALID_NODE
        );
    }

    #[test]
    fn honors_community_boundaries() {
        let mut hg = HypergraphBuilder::new(2).add_net(&[0, 1]).build().unwrap();
        hg.set_communities(vec![0, 1]);
        let state = ClusteringState::new(2);
        state.reset(&hg);
        let rater = VertexPairRater::new(&Context::default());
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(
            rater.rate(&hg, 0, &state, i64::MAX, &mut rng).target,
            INVALID_NODE
        );
    }
}
