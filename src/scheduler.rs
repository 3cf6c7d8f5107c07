//! The operation scheduler: assigns every task to the right thread.
//!
//! Routing is the whole job; interpreting a task belongs to the handlers.
//! Partition-bound work goes to the partition worker owning the partition
//! (`partition_id % P`), unpartitioned work is load-balanced across the
//! generic pool through one shared queue pair, and response packets bypass
//! the operation pool entirely on a dedicated worker. Urgent tasks travel
//! through per-worker priority queues and are observed ahead of normal
//! traffic.
//!
//! Correctness rests on partition affinity: all state of a partition is only
//! ever touched from its one worker thread, which is what serializes
//! concurrent mutations per partition without locks. The predicates
//! [`OperationScheduler::may_run_here`] and
//! [`OperationScheduler::may_invoke_here`] let callers check, from any
//! thread, whether bypassing the queues would keep that property intact.

use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::handler::{OperationHandler, OperationHandlerFactory, ResponsePacketHandler};
use crate::identity::{self, ThreadIdentity};
use crate::metrics::SchedulerMetrics;
use crate::node::{NodeExtension, ThreadGroup, GENERIC_POOL, PARTITION_POOL, RESPONSE_THREAD};
use crate::packet::Packet;
use crate::queue::TaskQueues;
use crate::response::ResponseWorker;
use crate::task::{Operation, PartitionId, PartitionRunnable, Task};
use crate::worker::{GenericWorker, PartitionWorker};
use log::info;
use std::fmt::{self, Write as _};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bound applied to each worker join during shutdown.
pub const TERMINATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Owns the partition workers, the generic pool and the response worker.
pub struct OperationScheduler {
    thread_group: ThreadGroup,
    partition_count: usize,
    partition_handlers: Arc<[Arc<dyn OperationHandler>]>,
    partition_workers: Vec<PartitionWorker>,
    generic_queues: TaskQueues,
    generic_handlers: Vec<Arc<dyn OperationHandler>>,
    generic_workers: Vec<GenericWorker>,
    response_worker: ResponseWorker,
    ad_hoc_handler: Arc<dyn OperationHandler>,
    live: AtomicBool,
}

impl OperationScheduler {
    /// Build the handler tables and start every worker.
    ///
    /// Handlers are created first, one per partition id plus one per generic
    /// worker plus the ad-hoc handler, and published before any worker
    /// starts; the tables never change afterwards. Workers start in order:
    /// partition, generic, response.
    pub fn new(
        config: &SchedulerConfig,
        thread_group: ThreadGroup,
        handler_factory: &dyn OperationHandlerFactory,
        response_handler: Arc<dyn ResponsePacketHandler>,
        extension: Arc<dyn NodeExtension>,
    ) -> io::Result<OperationScheduler> {
        let partition_thread_count = config.partition_threads();
        let generic_thread_count = config.generic_threads();
        let partition_count = config.partition_count;

        let ad_hoc_handler = handler_factory.create_ad_hoc_handler();

        let partition_handlers: Arc<[Arc<dyn OperationHandler>]> = (0..partition_count)
            .map(|partition_id| handler_factory.create_partition_handler(partition_id as PartitionId))
            .collect::<Vec<_>>()
            .into();

        let mut partition_workers = Vec::with_capacity(partition_thread_count);
        for thread_id in 0..partition_thread_count {
            partition_workers.push(PartitionWorker::spawn(
                thread_id,
                thread_group.pool_thread_name(PARTITION_POOL, thread_id),
                partition_handlers.clone(),
                extension.clone(),
            )?);
        }

        let generic_queues = TaskQueues::new();
        let generic_handlers: Vec<Arc<dyn OperationHandler>> = (0..generic_thread_count)
            .map(|_| handler_factory.create_generic_handler())
            .collect();
        let mut generic_workers = Vec::with_capacity(generic_thread_count);
        for (thread_id, handler) in generic_handlers.iter().enumerate() {
            generic_workers.push(GenericWorker::spawn(
                thread_id,
                thread_group.pool_thread_name(GENERIC_POOL, thread_id),
                &generic_queues,
                handler.clone(),
                extension.clone(),
            )?);
        }

        let response_worker = ResponseWorker::spawn(
            thread_group.thread_name(RESPONSE_THREAD),
            response_handler,
            extension,
        )?;

        info!(
            "{}: starting with {} generic operation threads and {} partition operation threads",
            thread_group.instance_name(),
            generic_thread_count,
            partition_thread_count,
        );

        Ok(OperationScheduler {
            thread_group,
            partition_count,
            partition_handlers,
            partition_workers,
            generic_queues,
            generic_handlers,
            generic_workers,
            response_worker,
            ad_hoc_handler,
            live: AtomicBool::new(true),
        })
    }

    /// Route an operation to the worker owning its partition, or to the
    /// generic pool when it is unpartitioned. Urgent operations take the
    /// priority path.
    pub fn execute_operation(&self, op: Operation) -> Result<(), ScheduleError> {
        self.check_live()?;
        let partition_id = op.partition_id();
        let urgent = op.is_urgent();
        self.check_partition(partition_id)?;
        self.dispatch(Task::Operation(op), partition_id, urgent);
        Ok(())
    }

    /// Route a partition-bound runnable. Runnables are never urgent and,
    /// unlike operations, must declare the partition they belong to.
    pub fn execute_runnable(
        &self,
        runnable: Box<dyn PartitionRunnable>,
    ) -> Result<(), ScheduleError> {
        self.check_live()?;
        let partition_id = runnable.partition_id();
        if partition_id < 0 {
            return Err(ScheduleError::UnpartitionedRunnable { partition_id });
        }
        self.check_partition(partition_id)?;
        self.dispatch(Task::Runnable(runnable), partition_id, false);
        Ok(())
    }

    /// Route an inbound packet. Response packets go straight to the response
    /// worker; everything else must be an operation packet and is routed
    /// like an operation.
    pub fn execute_packet(&self, packet: Packet) -> Result<(), ScheduleError> {
        self.check_live()?;
        if !packet.is_operation() {
            return Err(ScheduleError::NotAnOperationPacket);
        }
        if packet.is_response() {
            self.response_worker.queue(packet);
            return Ok(());
        }
        let partition_id = packet.partition_id();
        let urgent = packet.is_urgent();
        self.check_partition(partition_id)?;
        self.dispatch(Task::Packet(packet), partition_id, urgent);
        Ok(())
    }

    /// Execute `op` synchronously on the calling thread, bypassing the
    /// queues. Fails unless [`may_run_here`](Self::may_run_here) holds for
    /// the calling thread.
    pub fn run_on_calling_thread(&self, op: Operation) -> Result<(), ScheduleError> {
        if !self.may_run_here(&op) {
            return Err(ScheduleError::ThreadAffinity {
                partition_id: op.partition_id(),
                thread_name: current_thread_name(),
            });
        }
        self.current_thread_operation_handler()
            .process(Task::Operation(op));
        Ok(())
    }

    /// Can the calling thread execute `op` inline right now without
    /// violating partition affinity?
    ///
    /// IO threads may never run operations. Unpartitioned operations may run
    /// on anything else. Partitioned operations may only run on the one
    /// partition worker owning the partition.
    pub fn may_run_here(&self, op: &Operation) -> bool {
        let caller = identity::current();
        if caller == ThreadIdentity::Io {
            return false;
        }
        let partition_id = op.partition_id();
        if partition_id < 0 {
            return true;
        }
        match caller {
            ThreadIdentity::Partition(thread_id) => {
                thread_id == self.partition_thread_index(partition_id)
            }
            _ => false,
        }
    }

    /// Can the calling thread originate an outbound invocation for `op`?
    ///
    /// Looser than [`may_run_here`](Self::may_run_here): invoking from a
    /// generic worker or an unowned thread is always safe. Partition workers
    /// stay pinned to their own partitions and IO threads stay fully banned.
    pub fn may_invoke_here(&self, op: &Operation) -> bool {
        let caller = identity::current();
        if caller == ThreadIdentity::Io {
            return false;
        }
        let partition_id = op.partition_id();
        if partition_id < 0 {
            return true;
        }
        match caller {
            ThreadIdentity::Partition(thread_id) => {
                thread_id == self.partition_thread_index(partition_id)
            }
            _ => true,
        }
    }

    /// True when called from a partition or generic worker.
    pub fn is_operation_thread(&self) -> bool {
        identity::current().is_operation_thread()
    }

    /// Handler serving inline execution on the calling thread.
    ///
    /// Partition workers resolve through their current-handler slot, generic
    /// workers use their fixed handler, and every other thread gets the
    /// ad-hoc handler.
    pub fn current_thread_operation_handler(&self) -> Arc<dyn OperationHandler> {
        match identity::current() {
            ThreadIdentity::Partition(thread_id) => {
                match self.partition_workers[thread_id].stats.current_partition() {
                    Some(partition_id) => self.partition_handlers[partition_id as usize].clone(),
                    // Not mid-task, so no partition handler can be pinned down.
                    None => self.ad_hoc_handler.clone(),
                }
            }
            ThreadIdentity::Generic(thread_id) => self.generic_handlers[thread_id].clone(),
            _ => self.ad_hoc_handler.clone(),
        }
    }

    /// The immutable partition handler table, one handler per partition id.
    pub fn partition_handlers(&self) -> &[Arc<dyn OperationHandler>] {
        &self.partition_handlers
    }

    /// The immutable generic handler table, one handler per generic worker.
    pub fn generic_handlers(&self) -> &[Arc<dyn OperationHandler>] {
        &self.generic_handlers
    }

    pub fn partition_thread_count(&self) -> usize {
        self.partition_workers.len()
    }

    pub fn generic_thread_count(&self) -> usize {
        self.generic_workers.len()
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Workers currently driving a handler. Never exceeds `P + G`.
    pub fn running_operation_count(&self) -> usize {
        self.partition_workers
            .iter()
            .filter(|worker| worker.stats.is_busy())
            .count()
            + self
                .generic_workers
                .iter()
                .filter(|worker| worker.stats.is_busy())
                .count()
    }

    /// Queued normal work across partition workers and the generic pool.
    pub fn operation_queue_size(&self) -> usize {
        self.partition_workers
            .iter()
            .map(|worker| worker.queues.normal_len())
            .sum::<usize>()
            + self.generic_queues.normal_len()
    }

    /// Queued priority work across partition workers and the generic pool.
    pub fn priority_operation_queue_size(&self) -> usize {
        self.partition_workers
            .iter()
            .map(|worker| worker.queues.priority_len())
            .sum::<usize>()
            + self.generic_queues.priority_len()
    }

    pub fn response_queue_size(&self) -> usize {
        self.response_worker.queue_len()
    }

    /// Lock-free snapshot of all counters.
    pub fn metrics(&self) -> SchedulerMetrics {
        SchedulerMetrics {
            running_operations: self.running_operation_count(),
            operation_queue_size: self.operation_queue_size(),
            priority_operation_queue_size: self.priority_operation_queue_size(),
            response_queue_size: self.response_queue_size(),
            partition_processed: self
                .partition_workers
                .iter()
                .map(|worker| worker.stats.processed_count())
                .collect(),
            generic_processed: self
                .generic_workers
                .iter()
                .map(|worker| worker.stats.processed_count())
                .collect(),
            processed_responses: self.response_worker.processed_responses(),
        }
    }

    /// Append one line per worker with its processed and pending counts.
    pub fn dump_performance_metrics(&self, out: &mut String) {
        for worker in &self.partition_workers {
            let _ = writeln!(
                out,
                "{} processedCount={} pendingCount={}",
                worker.stats.name,
                worker.stats.processed_count(),
                worker.queues.normal_len(),
            );
        }
        let _ = writeln!(
            out,
            "pending generic operations {}",
            self.generic_queues.normal_len()
        );
        for worker in &self.generic_workers {
            let _ = writeln!(
                out,
                "{} processedCount={}",
                worker.stats.name,
                worker.stats.processed_count(),
            );
        }
        let _ = writeln!(
            out,
            "{} processedCount={} pendingCount={}",
            self.response_worker.name,
            self.response_worker.processed_responses(),
            self.response_worker.queue_len(),
        );
    }

    /// Stop every worker and wait for each with a bounded join.
    ///
    /// Idempotent; later calls return immediately. Work submitted after
    /// shutdown is rejected with [`ScheduleError::ShutDown`]. A worker stuck
    /// inside a handler past [`TERMINATION_TIMEOUT`] is left behind with a
    /// warning.
    pub fn shutdown(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            return;
        }

        self.response_worker.stop();

        // All run flags drop before any wake-up: a woken generic worker may
        // consume the trigger meant for a neighbour, and must still observe
        // its own flag as cleared.
        for worker in &self.partition_workers {
            worker.stop();
        }
        for worker in &self.generic_workers {
            worker.stop();
        }
        for worker in &self.partition_workers {
            worker.wake();
        }
        for _ in &self.generic_workers {
            self.generic_queues.wake();
        }

        for worker in &self.partition_workers {
            worker.await_termination(TERMINATION_TIMEOUT);
        }
        for worker in &self.generic_workers {
            worker.await_termination(TERMINATION_TIMEOUT);
        }
        self.response_worker.await_termination(TERMINATION_TIMEOUT);
    }

    fn dispatch(&self, task: Task, partition_id: PartitionId, urgent: bool) {
        let queues = if partition_id < 0 {
            &self.generic_queues
        } else {
            &self.partition_workers[self.partition_thread_index(partition_id)].queues
        };
        queues.offer(task, urgent);
    }

    fn partition_thread_index(&self, partition_id: PartitionId) -> usize {
        partition_id as usize % self.partition_workers.len()
    }

    fn check_live(&self) -> Result<(), ScheduleError> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ScheduleError::ShutDown)
        }
    }

    fn check_partition(&self, partition_id: PartitionId) -> Result<(), ScheduleError> {
        if partition_id >= 0 && partition_id as usize >= self.partition_count {
            return Err(ScheduleError::PartitionOutOfRange {
                partition_id,
                partition_count: self.partition_count,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for OperationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationScheduler")
            .field("instance", &self.thread_group.instance_name())
            .field("partition_threads", &self.partition_workers.len())
            .field("generic_threads", &self.generic_workers.len())
            .field("partition_count", &self.partition_count)
            .finish()
    }
}

fn current_thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or("unnamed")
        .to_string()
}
