//! Work queue pair backing each worker.
//!
//! Every worker pulls from a normal queue (blocking) and a priority queue
//! (polled ahead of every normal dequeue). The blocking primitive parks a
//! worker indefinitely on an empty normal queue, and a producer writing only
//! to the priority queue would never wake it; producers therefore follow
//! every priority enqueue with a [`Task::Trigger`] on the normal queue. The
//! woken worker discards the trigger and re-checks the priority side first.

use crate::task::Task;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::error;

/// Unbounded normal/priority channel pair.
///
/// Partition workers own a pair each (single consumer); the generic pool
/// shares one pair, which gives multi-consumer semantics and work-stealing
/// for free since crossbeam receivers can be cloned.
pub struct TaskQueues {
    normal_tx: Sender<Task>,
    normal_rx: Receiver<Task>,
    priority_tx: Sender<Task>,
    priority_rx: Receiver<Task>,
}

impl TaskQueues {
    pub fn new() -> TaskQueues {
        let (normal_tx, normal_rx) = unbounded();
        let (priority_tx, priority_rx) = unbounded();
        TaskQueues {
            normal_tx,
            normal_rx,
            priority_tx,
            priority_rx,
        }
    }

    /// Enqueue a task, applying the trigger protocol for urgent work.
    ///
    /// Urgent tasks land on the priority queue first, then a trigger sentinel
    /// lands on the normal queue; the order matters, a worker woken by the
    /// trigger must already observe the priority task.
    pub fn offer(&self, task: Task, urgent: bool) {
        if urgent {
            self.push(&self.priority_tx, task);
            self.push(&self.normal_tx, Task::Trigger);
        } else {
            self.push(&self.normal_tx, task);
        }
    }

    /// Wake one consumer parked on the normal queue.
    pub fn wake(&self) {
        self.push(&self.normal_tx, Task::Trigger);
    }

    fn push(&self, queue: &Sender<Task>, task: Task) {
        // Unbounded channels only refuse work once every receiver is gone.
        if let Err(rejected) = queue.send(task) {
            error!(
                "failed to offer {:?} to a work queue with no consumers left; dropping it",
                rejected.into_inner()
            );
        }
    }

    /// Receiver handles for a consumer thread: `(normal, priority)`.
    pub fn receivers(&self) -> (Receiver<Task>, Receiver<Task>) {
        (self.normal_rx.clone(), self.priority_rx.clone())
    }

    pub fn normal_len(&self) -> usize {
        self.normal_rx.len()
    }

    pub fn priority_len(&self) -> usize {
        self.priority_rx.len()
    }
}

impl Default for TaskQueues {
    fn default() -> TaskQueues {
        TaskQueues::new()
    }
}
