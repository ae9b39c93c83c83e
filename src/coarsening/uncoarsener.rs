//! Reverse walk over the contraction hierarchy.
//!
//! The uncoarsener owns the level stack recorded by the coarsener and pops
//! it in LIFO order: per level, first the sparsified nets are restored
//! (undoing the weight aggregation of parallel nets), then the level's
//! contractions are undone. The driver runs refinement between projections.

use crate::coarsening::coarsener::Level;
use crate::hypergraph::PartitionedHypergraph;

/// Walks the memento stack in reverse level batches.
pub struct Uncoarsener {
    levels: Vec<Level>,
}

impl Uncoarsener {
    pub fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    /// True once every level has been projected.
    pub fn is_top_level(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn remaining_levels(&self) -> usize {
        self.levels.len()
    }

    /// Restore the most recent level: re-enable its sparsified nets (the
    /// partitioned overlay recounts their pin counts immediately) and undo
    /// its contractions, placing every reappearing vertex into its
    /// representative's block.
    pub fn project_next_level(&mut self, phg: &mut PartitionedHypergraph) {
        let level = self.levels.pop().expect("no level left to project");
        for net in level.removed_nets.iter().rev() {
            phg.restore_edge(net);
        }
        for memento in level.mementos.iter().rev() {
            phg.uncontract(memento);
        }
        phg.debug_check_partition();
    }
}
