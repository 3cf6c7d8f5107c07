//! Work units routed by the scheduler.

use crate::packet::Packet;
use std::fmt;

/// Identifier of a keyspace shard. A negative value means "not partitioned".
pub type PartitionId = i32;

/// A unit of work with an optional partition binding and an urgency flag.
///
/// The payload is opaque serialized bytes; only the handler that ultimately
/// processes the operation knows how to decode them.
#[derive(Debug, Clone)]
pub struct Operation {
    partition_id: PartitionId,
    urgent: bool,
    payload: Vec<u8>,
}

impl Operation {
    pub fn new(partition_id: PartitionId, payload: Vec<u8>) -> Operation {
        Operation {
            partition_id,
            urgent: false,
            payload,
        }
    }

    /// Flag the operation as urgent so it travels through the priority queues.
    pub fn urgent(mut self) -> Operation {
        self.urgent = true;
        self
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A partition-bound unit of work that runs directly instead of being decoded.
///
/// Unlike operations, runnables must always declare the partition they belong
/// to; the scheduler rejects unpartitioned runnables at the entry point.
pub trait PartitionRunnable: Send {
    fn partition_id(&self) -> PartitionId;

    fn run(self: Box<Self>);
}

/// Discriminant mirrored in [`TaskLabel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Operation,
    Runnable,
    Packet,
}

/// Cheap copyable description of a task.
///
/// Handlers report the label of whatever they are currently processing through
/// [`OperationHandler::current_task`](crate::handler::OperationHandler::current_task).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLabel {
    pub kind: TaskKind,
    pub partition_id: PartitionId,
    pub urgent: bool,
}

/// The polymorphic value travelling through the work queues.
///
/// `Trigger` never reaches a handler: it exists purely to wake a worker that is
/// parked on its normal queue while the priority queue holds work, and is
/// discarded on dequeue.
pub enum Task {
    Operation(Operation),
    Runnable(Box<dyn PartitionRunnable>),
    Packet(Packet),
    Trigger,
}

impl Task {
    /// Partition binding used for routing. `Trigger` is unpartitioned.
    pub fn partition_id(&self) -> PartitionId {
        match self {
            Task::Operation(op) => op.partition_id(),
            Task::Runnable(runnable) => runnable.partition_id(),
            Task::Packet(packet) => packet.partition_id(),
            Task::Trigger => -1,
        }
    }

    pub fn is_urgent(&self) -> bool {
        match self {
            Task::Operation(op) => op.is_urgent(),
            Task::Packet(packet) => packet.is_urgent(),
            Task::Runnable(_) | Task::Trigger => false,
        }
    }

    /// Label describing this task, or `None` for the trigger sentinel.
    pub fn label(&self) -> Option<TaskLabel> {
        let kind = match self {
            Task::Operation(_) => TaskKind::Operation,
            Task::Runnable(_) => TaskKind::Runnable,
            Task::Packet(_) => TaskKind::Packet,
            Task::Trigger => return None,
        };
        Some(TaskLabel {
            kind,
            partition_id: self.partition_id(),
            urgent: self.is_urgent(),
        })
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Operation(op) => f.debug_tuple("Operation").field(op).finish(),
            Task::Runnable(runnable) => f
                .debug_struct("Runnable")
                .field("partition_id", &runnable.partition_id())
                .finish(),
            Task::Packet(packet) => f.debug_tuple("Packet").field(packet).finish(),
            Task::Trigger => f.write_str("Trigger"),
        }
    }
}
