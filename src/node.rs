//! Integration points between the scheduler and the hosting node.

use crate::identity::ThreadIdentity;

/// Pool name used for partition worker threads.
pub const PARTITION_POOL: &str = "partition-operation";
/// Pool name used for generic worker threads.
pub const GENERIC_POOL: &str = "generic-operation";
/// Name of the response worker thread.
pub const RESPONSE_THREAD: &str = "response";

/// Produces the names of scheduler-owned threads.
///
/// Every thread name is prefixed with the node's instance name so that
/// thread dumps from a multi-node test process stay attributable.
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    instance_name: String,
}

impl ThreadGroup {
    pub fn new(instance_name: impl Into<String>) -> ThreadGroup {
        ThreadGroup {
            instance_name: instance_name.into(),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Name for thread `id` of the given pool, e.g.
    /// `"grid1.partition-operation.thread-3"`.
    pub fn pool_thread_name(&self, pool: &str, id: usize) -> String {
        format!("{}.{}.thread-{}", self.instance_name, pool, id)
    }

    /// Name for a singleton thread, e.g. `"grid1.response"`.
    pub fn thread_name(&self, name: &str) -> String {
        format!("{}.{}", self.instance_name, name)
    }
}

/// Hooks the host installs around every scheduler-owned thread.
///
/// `on_worker_start` runs on the worker thread before it begins pulling work,
/// `on_worker_stop` after the run loop has exited; hosts use them to install
/// and tear down thread-local state such as a security context.
pub trait NodeExtension: Send + Sync {
    fn on_worker_start(&self, identity: ThreadIdentity) {
        let _ = identity;
    }

    fn on_worker_stop(&self, identity: ThreadIdentity) {
        let _ = identity;
    }
}

/// Extension that installs nothing.
#[derive(Debug, Default)]
pub struct NoopNodeExtension;

impl NodeExtension for NoopNodeExtension {}
