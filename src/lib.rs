//! Partition-affine operation scheduler for an in-memory data grid node.
//!
//! Every incoming task is assigned to a thread such that work on the same
//! partition is always serialized on one partition worker, unpartitioned work
//! is load-balanced across a generic pool, response packets are consumed on a
//! dedicated thread, and urgent work overtakes normal traffic through
//! per-worker priority queues. See [`scheduler::OperationScheduler`] for the
//! entry points.

pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod metrics;
pub mod node;
pub mod packet;
pub mod queue;
mod response;
pub mod scheduler;
pub mod task;
mod worker;

// Re-export the surface most callers need.
pub use config::SchedulerConfig;
pub use error::ScheduleError;
pub use handler::{OperationHandler, OperationHandlerFactory, ResponsePacketHandler};
pub use identity::{register_io_thread, ThreadIdentity};
pub use metrics::SchedulerMetrics;
pub use node::{NodeExtension, NoopNodeExtension, ThreadGroup};
pub use packet::Packet;
pub use scheduler::{OperationScheduler, TERMINATION_TIMEOUT};
pub use task::{Operation, PartitionId, PartitionRunnable, Task, TaskKind, TaskLabel};
