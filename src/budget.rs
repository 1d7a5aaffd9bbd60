//! Chunk planning against the configured memory budget

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::analysis::ResourceConfig;

/// Working-set multiplier over the raw reconstruction buffers, covering the
/// derived-metric tensors and transient copies alive alongside them.
pub const OVERHEAD_FACTOR: f64 = 3.0;

/// Node partitioning for one batch run, fixed for the run's duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    /// Nodes processed per chunk
    pub chunk_size: usize,
    /// Chunks needed to cover the node set
    pub num_chunks: usize,
    /// True when even a single node exceeds the budget and the plan was
    /// forced to chunk size 1 instead of failing
    pub low_memory: bool,
}

impl ChunkPlan {
    /// Node range covered by a chunk index
    pub fn chunk_range(&self, chunk: usize, num_nodes: usize) -> std::ops::Range<usize> {
        let start = chunk * self.chunk_size;
        let end = (start + self.chunk_size).min(num_nodes);
        start..end
    }
}

/// Available host memory in bytes, probed once per batch run
pub fn available_memory_bytes() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.available_memory()
}

/// Compute how many nodes fit in one chunk under the configured budget.
///
/// usable = available x fraction; a node costs
/// time samples x components x bytes-per-value x [`OVERHEAD_FACTOR`].
/// The result is clamped to [1, num_nodes]; a forced clamp up to 1 is the
/// documented low-memory degradation, logged and flagged but not an error.
pub fn plan(
    available_bytes: u64,
    config: &ResourceConfig,
    num_nodes: usize,
    num_time_samples: usize,
    num_components: usize,
) -> ChunkPlan {
    let usable = available_bytes as f64 * config.memory_fraction;
    let per_node_bytes = (num_time_samples * num_components * config.precision.bytes_per_value())
        as f64
        * OVERHEAD_FACTOR;

    let raw = if per_node_bytes > 0.0 {
        (usable / per_node_bytes).floor() as usize
    } else {
        num_nodes
    };

    let low_memory = raw == 0 && num_nodes > 0;
    if low_memory {
        warn!(
            "memory budget of {:.0} bytes is below the {:.0} bytes one node needs; \
             forcing chunk size 1",
            usable, per_node_bytes
        );
    }

    let chunk_size = raw.clamp(1, num_nodes.max(1));
    let num_chunks = num_nodes.div_ceil(chunk_size);
    debug!(
        "chunk plan: {} nodes in {} chunks of {} ({} time samples, {} components)",
        num_nodes, num_chunks, chunk_size, num_time_samples, num_components
    );

    ChunkPlan {
        chunk_size,
        num_chunks,
        low_memory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Precision;

    fn config(fraction: f64) -> ResourceConfig {
        ResourceConfig::default()
            .with_memory_fraction(fraction)
            .with_precision(Precision::Double)
    }

    #[test]
    fn chunk_size_never_exceeds_node_count() {
        let p = plan(u64::MAX / 2, &config(1.0), 10, 100, 6);
        assert_eq!(p.chunk_size, 10);
        assert_eq!(p.num_chunks, 1);
        assert!(!p.low_memory);
    }

    #[test]
    fn too_small_budget_degrades_to_single_node_chunks() {
        // One node needs 100 * 6 * 8 * 3 = 14400 bytes
        let p = plan(1000, &config(1.0), 10, 100, 6);
        assert_eq!(p.chunk_size, 1);
        assert_eq!(p.num_chunks, 10);
        assert!(p.low_memory);
    }

    #[test]
    fn doubling_memory_never_shrinks_the_chunk() {
        let mut available = 10_000u64;
        let mut last = 0;
        for _ in 0..10 {
            let p = plan(available, &config(0.5), 1_000, 200, 6);
            assert!(p.chunk_size >= last);
            last = p.chunk_size;
            available *= 2;
        }
    }

    #[test]
    fn single_precision_fits_twice_as_many_nodes() {
        let double = plan(1_000_000, &config(1.0), 10_000, 100, 6);
        let single = plan(
            1_000_000,
            &config(1.0).with_precision(Precision::Single),
            10_000,
            100,
            6,
        );
        assert_eq!(single.chunk_size, double.chunk_size * 2);
    }

    #[test]
    fn chunk_ranges_tile_the_node_set() {
        let p = plan(1_000_000, &config(1.0), 10, 100, 6);
        let p = ChunkPlan {
            chunk_size: 4,
            num_chunks: 3,
            low_memory: p.low_memory,
        };
        assert_eq!(p.chunk_range(0, 10), 0..4);
        assert_eq!(p.chunk_range(1, 10), 4..8);
        assert_eq!(p.chunk_range(2, 10), 8..10);
    }
}
