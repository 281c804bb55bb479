//! Partition planner - maps grid rows onto workers
//!
//! Pure domain decomposition: a contiguous, gap-free assignment of rows to
//! worker ids, computed once at startup and immutable afterwards. Remainder
//! rows go to the highest-id workers so that offsets stay a simple prefix sum.

use tracing::debug;

use crate::error::EngineError;

/// One worker's slice of the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerRange {
    pub worker_id: usize,
    pub row_count: usize,
    pub row_offset: usize,
}

/// Ordered, contiguous assignment of grid rows to workers
///
/// Invariants: `row_offset[0] == 0`, each offset is the prefix sum of earlier
/// row counts, row counts sum to the grid height, and every worker owns at
/// least one row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionPlan {
    height: usize,
    ranges: Vec<WorkerRange>,
}

impl PartitionPlan {
    /// Compute the row assignment for `worker_count` workers over `height` rows
    ///
    /// Fails with `InvalidPartition` when `worker_count` is zero or exceeds the
    /// height, since some worker would own no rows.
    pub fn compute(height: usize, worker_count: usize) -> Result<Self, EngineError> {
        if worker_count == 0 || worker_count > height {
            return Err(EngineError::InvalidPartition { height, worker_count });
        }

        let base = height / worker_count;
        let remainder = height % worker_count;

        let mut ranges = Vec::with_capacity(worker_count);
        let mut row_offset = 0;
        for worker_id in 0..worker_count {
            // The last `remainder` workers take one extra row
            let row_count = if worker_id >= worker_count - remainder {
                base + 1
            } else {
                base
            };
            ranges.push(WorkerRange {
                worker_id,
                row_count,
                row_offset,
            });
            row_offset += row_count;
        }

        debug!(height, worker_count, base, remainder, "computed partition plan");
        Ok(Self { height, ranges })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn worker_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[WorkerRange] {
        &self.ranges
    }

    pub fn range(&self, worker_id: usize) -> WorkerRange {
        self.ranges[worker_id]
    }
}
