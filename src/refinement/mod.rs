//! Refinement chain: label propagation, localized k-way FM, and flow-based
//! refinement, each optional by configuration.

pub mod flow;
pub mod fm;
pub mod label_propagation;
pub mod rebalance;

use std::sync::Arc;

use crate::context::Context;
use crate::hypergraph::{Gain, PartitionedHypergraph};
use crate::refinement::flow::{FlowRefiner, MaxFlowSolver};
use crate::refinement::fm::FmRefiner;
use crate::refinement::label_propagation::LabelPropagationRefiner;

/// A refinement algorithm improving the current partition in place.
/// Returns the (non-negative) improvement of the objective.
pub trait Refiner {
    fn refine(&mut self, phg: &mut PartitionedHypergraph, context: &Context) -> Gain;
}

/// The configured chain, constructed once per partitioning call and re-run
/// after every projection step.
pub struct RefinementChain {
    label_propagation: Option<LabelPropagationRefiner>,
    fm: Option<FmRefiner>,
    flow: Option<FlowRefiner>,
}

impl RefinementChain {
    pub fn from_context(context: &Context, solver: Option<Arc<dyn MaxFlowSolver>>) -> Self {
        Self {
            label_propagation: context
                .refinement
                .label_propagation
                .enabled
                .then(LabelPropagationRefiner::new),
            fm: context.refinement.fm.enabled.then(FmRefiner::new),
            flow: match solver {
                Some(solver) if context.refinement.flow.enabled => {
                    Some(FlowRefiner::new(solver))
                }
                _ => None,
            },
        }
    }

    pub fn refine(&mut self, phg: &mut PartitionedHypergraph, context: &Context) -> Gain {
        let mut improvement = 0;
        if let Some(lp) = &mut self.label_propagation {
            improvement += lp.refine(phg, context);
        }
        if let Some(fm) = &mut self.fm {
            improvement += fm.refine(phg, context);
        }
        if let Some(flow) = &mut self.flow {
            improvement += flow.refine(phg, context);
        }
        improvement
    }
}
