//! Contracts the scheduler requires from the operation-execution layer.
//!
//! The scheduler is purely responsible for assigning a task to a particular
//! thread; interpreting and executing the task is the handler's business.

use crate::packet::Packet;
use crate::task::{PartitionId, Task, TaskLabel};
use std::sync::Arc;

/// Processes the tasks a worker hands over.
///
/// Partition handlers exist one per partition id and are only ever driven by
/// the partition worker owning that partition. Generic handlers exist one per
/// generic worker. The ad-hoc handler serves callers that execute inline from
/// a thread the scheduler does not own.
pub trait OperationHandler: Send + Sync {
    fn process(&self, task: Task);

    /// The task presently being processed, if any.
    fn current_task(&self) -> Option<TaskLabel> {
        None
    }
}

/// Builds the handler tables during scheduler construction.
///
/// All handlers are created before any worker starts and stay addressable for
/// the scheduler's whole lifetime, including final metric reads after
/// shutdown.
pub trait OperationHandlerFactory {
    fn create_partition_handler(&self, partition_id: PartitionId) -> Arc<dyn OperationHandler>;

    fn create_generic_handler(&self) -> Arc<dyn OperationHandler>;

    fn create_ad_hoc_handler(&self) -> Arc<dyn OperationHandler>;
}

/// Consumes decoded response packets on the dedicated response worker.
pub trait ResponsePacketHandler: Send + Sync {
    fn handle(&self, packet: Packet);
}
