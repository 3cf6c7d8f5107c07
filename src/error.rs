//! Errors surfaced synchronously by the dispatch entry points.

use crate::task::PartitionId;
use thiserror::Error;

/// Dispatch-time failures.
///
/// Faults inside handlers are deliberately not represented here: workers catch
/// and log them so a misbehaving handler can never take its worker down.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The packet does not carry the operation header bit.
    #[error("packet does not have the operation flag set")]
    NotAnOperationPacket,

    /// Inline execution was requested from a thread that may not run the
    /// operation without violating partition affinity.
    #[error("operation for partition {partition_id} may not run on thread {thread_name:?}")]
    ThreadAffinity {
        partition_id: PartitionId,
        thread_name: String,
    },

    /// A runnable without a partition binding was submitted. Runnables must
    /// always declare a partition; only operations and packets may be
    /// unpartitioned.
    #[error("runnable must declare a partition, got partition id {partition_id}")]
    UnpartitionedRunnable { partition_id: PartitionId },

    /// A partitioned task referenced a partition this node does not host.
    #[error("partition id {partition_id} is outside the configured {partition_count} partitions")]
    PartitionOutOfRange {
        partition_id: PartitionId,
        partition_count: usize,
    },

    /// The scheduler has been shut down and no longer accepts work.
    #[error("operation scheduler is shut down")]
    ShutDown,
}
