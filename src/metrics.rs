//! Point-in-time scheduler counters.

use serde::Serialize;

/// Snapshot of queue depths and worker counters.
///
/// All counts are read without locking, so fields may be mutually skewed by a
/// few tasks. Serializable so hosts can ship snapshots to a monitoring
/// endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerMetrics {
    /// Workers currently driving a handler.
    pub running_operations: usize,
    /// Partition normal queues plus the shared generic normal queue.
    pub operation_queue_size: usize,
    /// All priority queues combined.
    pub priority_operation_queue_size: usize,
    /// Depth of the response worker's queue.
    pub response_queue_size: usize,
    /// Tasks processed per partition worker, indexed by thread id.
    pub partition_processed: Vec<u64>,
    /// Tasks processed per generic worker, indexed by thread id.
    pub generic_processed: Vec<u64>,
    /// Response packets processed so far.
    pub processed_responses: u64,
}
