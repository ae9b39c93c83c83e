//! Localized k-way FM with shared move bookkeeping.
//!
//! Many localized searches run concurrently, each claiming vertices through
//! a CAS on the shared node tracker and publishing its moves into a shared
//! monotone move log. After a round, the log is replayed in linearization
//! order with exact gain recomputation and per-move balance feasibility;
//! the longest prefix with the best cumulative gain is kept, everything
//! after it is rolled back.

pub mod localized;

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use log::debug;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::context::Context;
use crate::hypergraph::{
    Gain, HypernodeId, MoveId, NodeWeight, PartitionId, PartitionedHypergraph,
};
use crate::parallel::with_local_rng;
use crate::refinement::fm::localized::LocalizedKWayFm;
use crate::refinement::Refiner;

/// A single vertex move, as published to the shared log.
#[derive(Debug, Clone, Copy)]
pub struct Move {
    pub node: HypernodeId,
    pub from: PartitionId,
    pub to: PartitionId,
    /// Gain estimate at move time (the rollback recomputes exact gains).
    pub gain: Gain,
}

/// Marks a tracker entry as deactivated for the rest of its round.
const DEACTIVATED_BIT: u32 = 1 << 31;
const SEARCH_MASK: u32 = DEACTIVATED_BIT - 1;

/// Cross-search shared state: vertex ownership, the monotone move log, and
/// the per-(edge, block) first-move-in / last-move-out tables.
pub struct FmSharedData {
    /// Owning search id per vertex (possibly tagged deactivated).
    search_of_node: Vec<AtomicU32>,
    /// Earliest current-round move that brought a pin of `e` into block
    /// `i`, at index `e * k + i`. 0 = unset.
    first_move_in: Vec<AtomicU32>,
    /// Latest current-round move that took a pin of `e` out of block `i`.
    last_move_out: Vec<AtomicU32>,
    /// The shared move log; ids are `id_base + index + 1`, strictly
    /// monotone within and across rounds.
    moves: Mutex<Vec<Move>>,
    id_base: AtomicU32,
    /// Searches with id below this floor are stale (previous rounds).
    search_floor: AtomicU32,
    search_counter: AtomicU32,
    k: usize,
}

impl FmSharedData {
    pub fn new(num_nodes: usize, num_edges: usize, k: usize) -> Self {
        Self {
            search_of_node: (0..num_nodes).map(|_| AtomicU32::new(0)).collect(),
            first_move_in: (0..num_edges * k).map(|_| AtomicU32::new(0)).collect(),
            last_move_out: (0..num_edges * k).map(|_| AtomicU32::new(0)).collect(),
            moves: Mutex::new(Vec::new()),
            id_base: AtomicU32::new(0),
            search_floor: AtomicU32::new(1),
            search_counter: AtomicU32::new(1),
            k,
        }
    }

    /// Allocate a fresh search id.
    pub fn new_search(&self) -> u32 {
        self.search_counter.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    fn is_inactive(&self, entry: u32) -> bool {
        (entry & SEARCH_MASK) < self.search_floor.load(Ordering::Acquire)
    }

    /// Claim `u` for `search`. Succeeds only while no current-round search
    /// holds the vertex.
    pub fn try_claim(&self, u: HypernodeId, search: u32) -> bool {
        let cell = &self.search_of_node[u as usize];
        let mut current = cell.load(Ordering::Acquire);
        loop {
            if !self.is_inactive(current) {
                return false;
            }
            match cell.compare_exchange_weak(current, search, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    #[inline]
    pub fn owner(&self, u: HypernodeId) -> u32 {
        self.search_of_node[u as usize].load(Ordering::Acquire)
    }

    /// Remove a moved vertex from circulation for the rest of the round.
    pub fn deactivate(&self, u: HypernodeId, search: u32) {
        self.search_of_node[u as usize].store(search | DEACTIVATED_BIT, Ordering::Release);
    }

    /// Publish a move; the returned id is strictly monotone.
    pub fn insert_move(&self, m: Move) -> MoveId {
        let mut log = self.moves.lock();
        log.push(m);
        self.id_base.load(Ordering::Acquire) + log.len() as MoveId
    }

    #[inline]
    fn is_move_id_stale(&self, id: MoveId) -> bool {
        // Unset cells and ids from finished rounds are both stale.
        id <= self.id_base.load(Ordering::Acquire)
    }

    /// Record `move_id` in the first-move-in / last-move-out tables of every
    /// net incident to the moved vertex, with the standard monotone CAS
    /// pattern. Stale entries (aborted rounds) are overwritten.
    pub fn record_move_on_edges(&self, phg: &PartitionedHypergraph, m: &Move, move_id: MoveId) {
        for &e in phg.incident_edges(m.node) {
            let fmi = &self.first_move_in[e as usize * self.k + m.to as usize];
            let mut expected = fmi.load(Ordering::Acquire);
            while self.is_move_id_stale(expected) || expected > move_id {
                match fmi.compare_exchange_weak(
                    expected,
                    move_id,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(observed) => expected = observed,
                }
            }

            let lmo = &self.last_move_out[e as usize * self.k + m.from as usize];
            let mut expected = lmo.load(Ordering::Acquire);
            while self.is_move_id_stale(expected) || expected < move_id {
                match lmo.compare_exchange_weak(
                    expected,
                    move_id,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(observed) => expected = observed,
                }
            }
        }
    }

    /// First current-round move into `(e, block)`, if any.
    pub fn first_move_in(&self, e: u32, block: PartitionId) -> Option<MoveId> {
        let id = self.first_move_in[e as usize * self.k + block as usize].load(Ordering::Acquire);
        (!self.is_move_id_stale(id)).then_some(id)
    }

    /// Last current-round move out of `(e, block)`, if any.
    pub fn last_move_out(&self, e: u32, block: PartitionId) -> Option<MoveId> {
        let id = self.last_move_out[e as usize * self.k + block as usize].load(Ordering::Acquire);
        (!self.is_move_id_stale(id)).then_some(id)
    }

    /// Drain the round's log and retire its ids and searches.
    pub fn finish_round(&self) -> Vec<Move> {
        let mut log = self.moves.lock();
        let moves = std::mem::take(&mut *log);
        self.id_base.fetch_add(moves.len() as u32, Ordering::AcqRel);
        self.search_floor
            .store(self.search_counter.load(Ordering::Acquire), Ordering::Release);
        moves
    }
}

/// Localized k-way FM refiner with global best-prefix rollback.
pub struct FmRefiner {
    shared: Option<FmSharedData>,
}

impl FmRefiner {
    pub fn new() -> Self {
        Self { shared: None }
    }

    fn shared_for(&mut self, phg: &PartitionedHypergraph) -> &FmSharedData {
        let num_nodes = phg.hypergraph().initial_num_nodes();
        let num_edges = phg.hypergraph().initial_num_edges();
        let k = phg.k() as usize;
        let fits = self
            .shared
            .as_ref()
            .map(|s| s.search_of_node.len() == num_nodes && s.first_move_in.len() == num_edges * k)
            .unwrap_or(false);
        if !fits {
            self.shared = Some(FmSharedData::new(num_nodes, num_edges, k));
        }
        self.shared.as_ref().unwrap()
    }
}

impl Default for FmRefiner {
    fn default() -> Self {
        Self::new()
    }
}

impl Refiner for FmRefiner {
    fn refine(&mut self, phg: &mut PartitionedHypergraph, context: &Context) -> Gain {
        phg.initialize_gain_cache();
        let max_weights = context.partition.max_part_weights.clone();
        let mut total_improvement: Gain = 0;

        for round in 0..context.refinement.fm.max_rounds {
            let mut seeds: Vec<HypernodeId> =
                phg.nodes().filter(|&u| phg.is_border_node(u)).collect();
            if seeds.is_empty() {
                break;
            }
            with_local_rng(|rng| seeds.shuffle(rng));

            {
                let shared = self.shared_for(phg);
                let phg_ref: &PartitionedHypergraph = phg;
                let next_seed = AtomicUsize::new(0);
                let num_workers = rayon::current_num_threads().max(1);
                (0..num_workers).into_par_iter().for_each(|_| {
                    let mut search = LocalizedKWayFm::new(
                        phg_ref.hypergraph().initial_num_nodes(),
                        phg_ref.k() as usize,
                    );
                    loop {
                        let i = next_seed.fetch_add(1, Ordering::Relaxed);
                        if i >= seeds.len() {
                            break;
                        }
                        search.find_moves(phg_ref, shared, seeds[i], context, &max_weights);
                    }
                });
            }

            let moves = self.shared.as_ref().unwrap().finish_round();
            if moves.is_empty() {
                break;
            }
            let improvement = apply_best_prefix(phg, &moves, &max_weights);
            debug!(
                "fm round {round}: {} published moves, improvement {improvement}",
                moves.len()
            );
            total_improvement += improvement;
            if improvement <= 0 {
                break;
            }
        }
        phg.debug_check_partition();
        total_improvement
    }
}

/// Revert the round's moves, then replay them in linearization order with
/// exact gains and balance feasibility; keep the longest prefix with the
/// best cumulative gain. Returns that best gain.
fn apply_best_prefix(
    phg: &PartitionedHypergraph,
    moves: &[Move],
    max_weights: &[NodeWeight],
) -> Gain {
    for m in moves.iter().rev() {
        debug_assert_eq!(phg.part_id(m.node), m.to);
        phg.change_node_part(m.node, m.to, m.from);
    }

    let mut applied: Vec<Move> = Vec::with_capacity(moves.len());
    let mut cumulative: Gain = 0;
    let mut best: Gain = 0;
    let mut best_len = 0usize;
    for m in moves {
        if phg.part_id(m.node) != m.from {
            // A rejected earlier move invalidated this one.
            continue;
        }
        if phg.part_weight(m.to) + phg.node_weight(m.node) > max_weights[m.to as usize] {
            continue;
        }
        let gain = phg.compute_km1_gain(m.node, m.from, m.to);
        phg.change_node_part(m.node, m.from, m.to);
        applied.push(*m);
        cumulative += gain;
        if cumulative > best {
            best = cumulative;
            best_len = applied.len();
        }
    }
    for m in applied[best_len..].iter().rev() {
        phg.change_node_part(m.node, m.to, m.from);
    }
    best
}
