//! Parallel execution policy and chunk sizing.
//!
//! The pipeline fans counter-style transforms out to a pool with a
//! fixed worker count. The unit it reads and transforms in one
//! concurrent call is the parallel block; its size must be a multiple
//! of `parallel_minimum_size = workers * unit * SIMD_LANE_COUNT`, where
//! `unit` is the cipher block (block modes) or keystream block (stream
//! engines). Regions below the minimum run sequentially.

use crate::{Error, Result};

/// Keystream lanes a vectorized counter batch covers.
pub const SIMD_LANE_COUNT: usize = 8;

/// Upper bound on one parallel block: 100 MiB.
pub const MAX_PARALLEL_BLOCK: usize = 100 * 1024 * 1024;

/// How the pipeline chooses its parallel block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelPolicy {
    /// Strictly sequential processing.
    Off,
    /// The largest block the cap allows: best throughput, coarse
    /// progress.
    SpeedProfile,
    /// Size the block so the source divides into about `n` progress
    /// steps.
    ProgressProfile(u32),
}

/// A resolved fan-out plan for one `process` call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParallelConfig {
    pub workers: usize,
    /// Bytes read and transformed per concurrent call.
    pub block_bytes: usize,
}

/// Smallest region worth splitting across `workers`.
pub(crate) fn parallel_minimum_size(workers: usize, unit: usize) -> usize {
    workers.max(1) * unit * SIMD_LANE_COUNT
}

/// Resolve a policy against the source size, or `None` for sequential.
pub(crate) fn resolve(
    policy: ParallelPolicy,
    workers: usize,
    unit: usize,
    total: u64,
) -> Option<ParallelConfig> {
    let minimum = parallel_minimum_size(workers, unit);
    let usable = match policy {
        ParallelPolicy::Off => return None,
        _ if total < minimum as u64 => return None,
        ParallelPolicy::SpeedProfile => MAX_PARALLEL_BLOCK.min(total as usize),
        ParallelPolicy::ProgressProfile(steps) => {
            let target = (total / steps.max(1) as u64) as usize;
            target.clamp(minimum, MAX_PARALLEL_BLOCK)
        }
    };
    // Round down to a whole number of minimum-size units.
    let block_bytes = usable / minimum * minimum;
    Some(ParallelConfig {
        workers,
        block_bytes,
    })
}

/// Build the worker pool the pipeline owns for one `process` call.
pub(crate) fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|_| Error::InternalInvariant("worker pool construction failed"))
}
