//! Seeded worker pools.
//!
//! Shuffles and tie-breaks throughout the partitioner draw from a
//! per-worker `SmallRng` rather than a global generator, so a run is
//! reproducible for a fixed (seed, thread count) pair. [`run_seeded`]
//! builds a Rayon pool whose workers each receive an independent stream
//! derived from the global seed; code executing inside the pool reaches
//! its worker's generator through [`with_local_rng`]. Phases that manage
//! their own generators (the initial-partitioning portfolio) split
//! further deterministic seeds off the global one with [`derive_seed`].

use std::cell::RefCell;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::ThreadPoolBuilder;

thread_local! {
    /// The worker's generator; `None` outside a seeded pool.
    static LOCAL_RNG: RefCell<Option<SmallRng>> = RefCell::new(None);
}

/// FNV-1a over a label and a sequence of 64-bit values. Cheap, stable
/// across platforms, and decorrelates derived seeds well enough for
/// heuristic tie-breaking.
fn fnv1a(label: &str, parts: &[u64]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &byte in label.as_bytes() {
        hash = (hash ^ byte as u64).wrapping_mul(PRIME);
    }
    for &part in parts {
        for byte in part.to_le_bytes() {
            hash = (hash ^ byte as u64).wrapping_mul(PRIME);
        }
    }
    hash
}

/// Derive an independent seed for `(label, index)` from the global seed.
pub fn derive_seed(global_seed: u64, label: &str, index: u64) -> u64 {
    fnv1a(label, &[global_seed, index])
}

/// Run `f` inside a fresh pool of `num_threads` workers, each carrying its
/// own `SmallRng` stream derived from `global_seed`. Every parallel phase
/// of a partitioning call executes under one such pool.
pub fn run_seeded<F, R>(global_seed: u64, num_threads: usize, f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .start_handler(move |worker| {
            let seed = derive_seed(global_seed, "worker", worker as u64);
            LOCAL_RNG.with(|slot| *slot.borrow_mut() = Some(SmallRng::seed_from_u64(seed)));
        })
        .exit_handler(|_| LOCAL_RNG.with(|slot| *slot.borrow_mut() = None))
        .build()
        .expect("failed to build seeded worker pool");
    pool.install(f)
}

/// Hand `f` the current worker's generator. Outside a seeded pool (unit
/// tests driving a component directly) a fixed-seed generator is
/// substituted, so callers never need a fallback path of their own.
pub fn with_local_rng<T>(f: impl FnOnce(&mut SmallRng) -> T) -> T {
    LOCAL_RNG.with(|slot| match slot.borrow_mut().as_mut() {
        Some(rng) => f(rng),
        None => f(&mut SmallRng::seed_from_u64(derive_seed(0, "unpooled", 0))),
    })
}
