//! C ABI for the thin CLI / language-binding shells.
//!
//! The surface mirrors the library lifecycle: create and configure an
//! opaque context, initialize the process-wide thread pool once, read a
//! hypergraph into CSR arrays, partition. All functions are
//! `panic`-free: errors are reported through boolean return values.

use std::ffi::{c_char, CStr};

use once_cell::sync::OnceCell;

use crate::context::Context;
use crate::deep;
use crate::hypergraph::Hypergraph;
use crate::io;

/// Process-wide thread count requested through
/// [`hyperpart_initialize_thread_pool`]; set once per run.
static THREAD_POOL_SIZE: OnceCell<usize> = OnceCell::new();

/// Allocate a context with default configuration. Free with
/// [`hyperpart_context_free`].
#[no_mangle]
pub extern "C" fn hyperpart_context_new() -> *mut Context {
    Box::into_raw(Box::new(Context::default()))
}

/// Free a context allocated by [`hyperpart_context_new`].
///
/// # Safety
/// `ctx` must be null or a pointer obtained from `hyperpart_context_new`
/// that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn hyperpart_context_free(ctx: *mut Context) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Load key/value configuration from an INI-like file into `ctx`.
///
/// # Safety
/// `ctx` must be a live context pointer; `path` a valid NUL-terminated
/// string.
#[no_mangle]
pub unsafe extern "C" fn hyperpart_configure_context_from_file(
    ctx: *mut Context,
    path: *const c_char,
) -> bool {
    if ctx.is_null() || path.is_null() {
        return false;
    }
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        return false;
    };
    (*ctx).configure_from_file(path).is_ok()
}

/// Fix the number of worker threads for all subsequent partitioning calls.
/// Effective once per process; later calls are ignored. The
/// `interleaved_allocations` flag is accepted for interface compatibility
/// and has no effect on this allocator.
#[no_mangle]
pub extern "C" fn hyperpart_initialize_thread_pool(
    num_threads: u64,
    _interleaved_allocations: bool,
) {
    let _ = THREAD_POOL_SIZE.set((num_threads as usize).max(1));
}

fn leak_slice<T>(data: Vec<T>) -> *mut T {
    Box::into_raw(data.into_boxed_slice()) as *mut T
}

/// Read an hMetis file into freshly allocated CSR arrays. On success the
/// out-pointers receive arrays of sizes `|E| + 1`, `pins`, `|E|` and
/// `|V|`; free them with [`hyperpart_free_hypergraph_arrays`].
///
/// # Safety
/// `file_name` must be a valid NUL-terminated string and every out
/// pointer non-null and writable.
#[no_mangle]
pub unsafe extern "C" fn hyperpart_read_hypergraph_from_file(
    file_name: *const c_char,
    num_vertices: *mut u64,
    num_hyperedges: *mut u64,
    hyperedge_indices: *mut *mut u64,
    hyperedges: *mut *mut u64,
    hyperedge_weights: *mut *mut i64,
    vertex_weights: *mut *mut i64,
) -> bool {
    if file_name.is_null() {
        return false;
    }
    let Ok(path) = CStr::from_ptr(file_name).to_str() else {
        return false;
    };
    let Ok(csr) = io::read_hypergraph_file(path) else {
        return false;
    };
    *num_vertices = csr.num_nodes as u64;
    *num_hyperedges = csr.num_edges() as u64;
    *hyperedge_indices = leak_slice(csr.edge_indices.iter().map(|&i| i as u64).collect());
    *hyperedges = leak_slice(csr.pins.clone());
    *hyperedge_weights = leak_slice(csr.edge_weights.clone());
    *vertex_weights = leak_slice(csr.node_weights.clone());
    true
}

/// Free the arrays returned by [`hyperpart_read_hypergraph_from_file`].
///
/// # Safety
/// The pointers and counts must come from a single successful reader call
/// and must not have been freed before.
#[no_mangle]
pub unsafe extern "C" fn hyperpart_free_hypergraph_arrays(
    num_vertices: u64,
    num_hyperedges: u64,
    hyperedge_indices: *mut u64,
    hyperedges: *mut u64,
    num_pins: u64,
    hyperedge_weights: *mut i64,
    vertex_weights: *mut i64,
) {
    let free_slice = |ptr: *mut u64, len: usize| {
        if !ptr.is_null() {
            drop(Box::from_raw(std::slice::from_raw_parts_mut(ptr, len)));
        }
    };
    let free_slice_i64 = |ptr: *mut i64, len: usize| {
        if !ptr.is_null() {
            drop(Box::from_raw(std::slice::from_raw_parts_mut(ptr, len)));
        }
    };
    free_slice(hyperedge_indices, num_hyperedges as usize + 1);
    free_slice(hyperedges, num_pins as usize);
    free_slice_i64(hyperedge_weights, num_hyperedges as usize);
    free_slice_i64(vertex_weights, num_vertices as usize);
}

/// Partition the CSR hypergraph into `num_blocks` blocks. Writes a block
/// id in `[0, num_blocks)` for every vertex into `partition_out` and the
/// achieved objective into `objective`. Returns false on invalid input;
/// an infeasible balance is not an error (check the result).
///
/// # Safety
/// The array arguments must match the declared sizes
/// (`hyperedge_indices`: `num_hyperedges + 1`; `hyperedges`: the pin
/// count; weights: `num_hyperedges` / `num_vertices` or null for unit
/// weights; `partition_out`: `num_vertices`). `ctx` may be null for the
/// default configuration.
#[no_mangle]
pub unsafe extern "C" fn hyperpart_partition(
    num_vertices: u64,
    num_hyperedges: u64,
    epsilon: f64,
    num_blocks: u32,
    seed: u64,
    vertex_weights: *const i64,
    hyperedge_weights: *const i64,
    hyperedge_indices: *const u64,
    hyperedges: *const u64,
    objective: *mut i64,
    ctx: *const Context,
    partition_out: *mut u32,
    verbose: bool,
) -> bool {
    if hyperedge_indices.is_null() || hyperedges.is_null() || partition_out.is_null() {
        return false;
    }
    let mut context = if ctx.is_null() {
        Context::default()
    } else {
        (*ctx).clone()
    };
    context.partition.k = num_blocks as i32;
    context.partition.epsilon = epsilon;
    context.partition.seed = seed;
    context.partition.verbose = verbose;
    if let Some(&n) = THREAD_POOL_SIZE.get() {
        context.shared_memory.num_threads = n;
    }

    let indices: Vec<usize> = std::slice::from_raw_parts(hyperedge_indices, num_hyperedges as usize + 1)
        .iter()
        .map(|&i| i as usize)
        .collect();
    let num_pins = *indices.last().unwrap_or(&0);
    let pins = std::slice::from_raw_parts(hyperedges, num_pins);
    let edge_weights = (!hyperedge_weights.is_null())
        .then(|| std::slice::from_raw_parts(hyperedge_weights, num_hyperedges as usize));
    let node_weights = (!vertex_weights.is_null())
        .then(|| std::slice::from_raw_parts(vertex_weights, num_vertices as usize));

    let Ok(hg) = Hypergraph::from_csr(num_vertices as usize, &indices, pins, edge_weights, node_weights)
    else {
        return false;
    };
    let Ok(phg) = deep::partition(hg, &context) else {
        return false;
    };

    let out = std::slice::from_raw_parts_mut(partition_out, num_vertices as usize);
    for u in 0..num_vertices as u32 {
        out[u as usize] = phg.part_id(u) as u32;
    }
    if !objective.is_null() {
        *objective = crate::metrics::objective(&phg, context.partition.objective);
    }
    true
}
