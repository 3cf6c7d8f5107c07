//! Long-lived worker threads that drive the operation handlers.
//!
//! Partition workers each own a private queue pair and may only invoke the
//! partition handlers whose ids map onto their thread id. Generic workers all
//! consume the one shared pair and each drive a single fixed handler. Neither
//! kind ever reads another worker's queues; stealing between partition
//! workers would break partition affinity.

use crate::handler::OperationHandler;
use crate::identity::{self, ThreadIdentity};
use crate::node::NodeExtension;
use crate::queue::TaskQueues;
use crate::task::{PartitionId, Task};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use log::{error, warn};
use parking_lot::Mutex;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Current-handler slot value while the worker is idle.
const IDLE: usize = 0;
/// Slot marker used by generic workers, whose handler is fixed.
const GENERIC_BUSY: usize = usize::MAX;

/// Counters published by a worker and read lock-free by observers.
///
/// The current-handler slot is written only by the owning worker (release)
/// and read by anyone (acquire). Readers accept slight skew on the processed
/// counter.
pub(crate) struct WorkerStats {
    pub(crate) name: String,
    processed: AtomicU64,
    current: AtomicUsize,
}

impl WorkerStats {
    fn new(name: String) -> Arc<WorkerStats> {
        Arc::new(WorkerStats {
            name,
            processed: AtomicU64::new(0),
            current: AtomicUsize::new(IDLE),
        })
    }

    pub(crate) fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// True while a task is in progress on this worker.
    pub(crate) fn is_busy(&self) -> bool {
        self.current.load(Ordering::Acquire) != IDLE
    }

    /// Partition whose handler is currently being driven, for partition
    /// workers. `None` while idle and on generic workers.
    pub(crate) fn current_partition(&self) -> Option<PartitionId> {
        match self.current.load(Ordering::Acquire) {
            IDLE | GENERIC_BUSY => None,
            slot => Some((slot - 1) as PartitionId),
        }
    }
}

/// Run-flag plus join plumbing shared by all worker kinds.
///
/// Termination is observed through a zero-capacity channel whose sender lives
/// on the worker thread: once the thread exits (normally or by unwinding) the
/// receiver disconnects.
pub(crate) struct Lifecycle {
    running: Arc<AtomicBool>,
    join: Mutex<Option<JoinHandle<()>>>,
    done_rx: Receiver<()>,
}

impl Lifecycle {
    pub(crate) fn from_parts(
        running: Arc<AtomicBool>,
        handle: JoinHandle<()>,
        done_rx: Receiver<()>,
    ) -> Lifecycle {
        Lifecycle {
            running,
            join: Mutex::new(Some(handle)),
            done_rx,
        }
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Wait up to `timeout` for the worker thread to exit. A worker that
    /// misses the bound is left behind with a warning; shutdown continues.
    pub(crate) fn await_termination(&self, name: &str, timeout: Duration) {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.join.lock().take() {
                    if handle.join().is_err() {
                        warn!("{name} terminated by panic");
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("{name} did not terminate within {timeout:?}; leaving it behind");
            }
        }
    }
}

enum WorkerRole {
    /// May drive any handler in the table; resolves per task partition id.
    Partition(Arc<[Arc<dyn OperationHandler>]>),
    /// Always drives its own fixed handler, whatever the task.
    Generic(Arc<dyn OperationHandler>),
}

/// Worker bound to one slice of the partition space.
pub(crate) struct PartitionWorker {
    pub(crate) queues: TaskQueues,
    pub(crate) stats: Arc<WorkerStats>,
    lifecycle: Lifecycle,
}

impl PartitionWorker {
    pub(crate) fn spawn(
        thread_id: usize,
        name: String,
        handlers: Arc<[Arc<dyn OperationHandler>]>,
        extension: Arc<dyn NodeExtension>,
    ) -> io::Result<PartitionWorker> {
        let queues = TaskQueues::new();
        let (normal_rx, priority_rx) = queues.receivers();
        let stats = WorkerStats::new(name);
        let lifecycle = spawn_worker(
            ThreadIdentity::Partition(thread_id),
            stats.clone(),
            normal_rx,
            priority_rx,
            WorkerRole::Partition(handlers),
            extension,
        )?;
        Ok(PartitionWorker {
            queues,
            stats,
            lifecycle,
        })
    }

    pub(crate) fn stop(&self) {
        self.lifecycle.stop();
    }

    /// Wake the worker if it is parked on its normal queue.
    pub(crate) fn wake(&self) {
        self.queues.wake();
    }

    pub(crate) fn await_termination(&self, timeout: Duration) {
        self.lifecycle.await_termination(&self.stats.name, timeout);
    }
}

/// Worker consuming the shared generic queues.
pub(crate) struct GenericWorker {
    pub(crate) stats: Arc<WorkerStats>,
    lifecycle: Lifecycle,
}

impl GenericWorker {
    pub(crate) fn spawn(
        thread_id: usize,
        name: String,
        shared_queues: &TaskQueues,
        handler: Arc<dyn OperationHandler>,
        extension: Arc<dyn NodeExtension>,
    ) -> io::Result<GenericWorker> {
        let (normal_rx, priority_rx) = shared_queues.receivers();
        let stats = WorkerStats::new(name);
        let lifecycle = spawn_worker(
            ThreadIdentity::Generic(thread_id),
            stats.clone(),
            normal_rx,
            priority_rx,
            WorkerRole::Generic(handler),
            extension,
        )?;
        Ok(GenericWorker { stats, lifecycle })
    }

    pub(crate) fn stop(&self) {
        self.lifecycle.stop();
    }

    pub(crate) fn await_termination(&self, timeout: Duration) {
        self.lifecycle.await_termination(&self.stats.name, timeout);
    }
}

fn spawn_worker(
    identity: ThreadIdentity,
    stats: Arc<WorkerStats>,
    normal_rx: Receiver<Task>,
    priority_rx: Receiver<Task>,
    role: WorkerRole,
    extension: Arc<dyn NodeExtension>,
) -> io::Result<Lifecycle> {
    let running = Arc::new(AtomicBool::new(true));
    let (done_tx, done_rx) = bounded::<()>(0);
    let running_for_loop = running.clone();
    let stats_for_loop = stats.clone();
    let handle = thread::Builder::new()
        .name(stats.name.clone())
        .spawn(move || {
            // Dropped on any exit path, disconnecting `done_rx`.
            let _done = done_tx;
            run_loop(
                identity,
                normal_rx,
                priority_rx,
                role,
                &stats_for_loop,
                &running_for_loop,
                extension.as_ref(),
            );
        })?;
    Ok(Lifecycle {
        running,
        join: Mutex::new(Some(handle)),
        done_rx,
    })
}

/// The worker loop shared by partition and generic workers.
///
/// The priority queue is drained fully before every normal dequeue attempt,
/// so a burst of priority work is never starved behind normal traffic. A
/// trigger pulled from the normal queue is discarded; its only job was to
/// wake us so the priority queue gets re-checked.
fn run_loop(
    identity: ThreadIdentity,
    normal_rx: Receiver<Task>,
    priority_rx: Receiver<Task>,
    role: WorkerRole,
    stats: &WorkerStats,
    running: &AtomicBool,
    extension: &dyn NodeExtension,
) {
    identity::set_current(identity);
    extension.on_worker_start(identity);

    while running.load(Ordering::Acquire) {
        let task = match priority_rx.try_recv() {
            Ok(task) => task,
            Err(TryRecvError::Empty) => match normal_rx.recv() {
                Ok(Task::Trigger) => continue,
                Ok(task) => task,
                // All producers gone: the scheduler was dropped.
                Err(_) => break,
            },
            Err(TryRecvError::Disconnected) => break,
        };

        process(&role, task, stats);
    }

    extension.on_worker_stop(identity);
}

fn process(role: &WorkerRole, task: Task, stats: &WorkerStats) {
    let label = task.label();
    let (handler, slot) = match role {
        WorkerRole::Partition(handlers) => {
            // The dispatcher only routes partition ids this node hosts and
            // only to the worker owning them, so the index is in range.
            let partition_id = task.partition_id() as usize;
            (&handlers[partition_id], partition_id + 1)
        }
        WorkerRole::Generic(handler) => (handler, GENERIC_BUSY),
    };

    stats.current.store(slot, Ordering::Release);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.process(task)));
    stats.current.store(IDLE, Ordering::Release);

    match outcome {
        Ok(()) => {
            stats.processed.fetch_add(1, Ordering::Relaxed);
        }
        Err(_) => {
            // A faulty handler must not kill its worker.
            error!(
                "{}: handler panicked while processing {:?}; continuing with the next task",
                stats.name, label
            );
        }
    }
}
