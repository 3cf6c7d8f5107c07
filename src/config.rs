//! Scheduler sizing configuration.

use std::num::NonZeroUsize;

/// Number of partition handlers built when the option is left at zero.
pub const DEFAULT_PARTITION_COUNT: usize = 271;

/// Worker-pool sizing options.
///
/// Thread counts of `0` mean "derive from the machine": `max(2, cores)`
/// partition workers and `max(2, cores / 2)` generic workers.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of partition worker threads; `0` derives a default.
    pub partition_thread_count: usize,
    /// Number of generic worker threads; `0` derives a default.
    pub generic_thread_count: usize,
    /// Number of partitions hosted by this node, fixed for the node's
    /// lifetime. One partition handler is built per partition.
    pub partition_count: usize,
}

impl Default for SchedulerConfig {
    fn default() -> SchedulerConfig {
        SchedulerConfig {
            partition_thread_count: 0,
            generic_thread_count: 0,
            partition_count: DEFAULT_PARTITION_COUNT,
        }
    }
}

impl SchedulerConfig {
    /// Effective partition worker count.
    pub fn partition_threads(&self) -> usize {
        if self.partition_thread_count > 0 {
            self.partition_thread_count
        } else {
            available_cores().max(2)
        }
    }

    /// Effective generic worker count.
    pub fn generic_threads(&self) -> usize {
        if self.generic_thread_count > 0 {
            self.generic_thread_count
        } else {
            (available_cores() / 2).max(2)
        }
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
