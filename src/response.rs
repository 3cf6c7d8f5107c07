//! The dedicated response worker.
//!
//! Response packets are consumed off the operation pool so that response
//! decoding latency can never be blocked behind a long-running operation.

use crate::handler::ResponsePacketHandler;
use crate::identity::{self, ThreadIdentity};
use crate::node::NodeExtension;
use crate::packet::Packet;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use log::error;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often a parked response worker re-checks its run flag. The trigger
/// protocol does not apply here since the queue carries only packets.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Single consumer of the response packet queue.
pub(crate) struct ResponseWorker {
    pub(crate) name: String,
    queue_tx: Sender<Packet>,
    processed: Arc<AtomicU64>,
    lifecycle: crate::worker::Lifecycle,
}

impl ResponseWorker {
    pub(crate) fn spawn(
        name: String,
        handler: Arc<dyn ResponsePacketHandler>,
        extension: Arc<dyn NodeExtension>,
    ) -> io::Result<ResponseWorker> {
        let (queue_tx, queue_rx) = unbounded::<Packet>();
        let processed = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = bounded::<()>(0);

        let worker_name = name.clone();
        let worker_processed = processed.clone();
        let worker_running = running.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let _done = done_tx;
            identity::set_current(ThreadIdentity::Response);
            extension.on_worker_start(ThreadIdentity::Response);

            while worker_running.load(Ordering::Acquire) {
                let packet = match queue_rx.recv_timeout(IDLE_POLL) {
                    Ok(packet) => packet,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| handler.handle(packet)));
                match outcome {
                    Ok(()) => {
                        worker_processed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        error!("{worker_name}: response handler panicked; continuing");
                    }
                }
            }

            extension.on_worker_stop(ThreadIdentity::Response);
        })?;

        Ok(ResponseWorker {
            name,
            queue_tx,
            processed,
            lifecycle: crate::worker::Lifecycle::from_parts(running, handle, done_rx),
        })
    }

    pub(crate) fn queue(&self, packet: Packet) {
        if self.queue_tx.send(packet).is_err() {
            error!("{}: dropped a response packet, worker is gone", self.name);
        }
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue_tx.len()
    }

    pub(crate) fn processed_responses(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub(crate) fn stop(&self) {
        self.lifecycle.stop();
    }

    pub(crate) fn await_termination(&self, timeout: Duration) {
        self.lifecycle.await_termination(&self.name, timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NoopNodeExtension;
    use parking_lot::Mutex;

    struct Collecting {
        packets: Mutex<Vec<Packet>>,
    }

    impl ResponsePacketHandler for Collecting {
        fn handle(&self, packet: Packet) {
            self.packets.lock().push(packet);
        }
    }

    #[test]
    fn responses_are_counted_and_delivered() {
        let handler = Arc::new(Collecting {
            packets: Mutex::new(Vec::new()),
        });
        let worker = ResponseWorker::spawn(
            "test.response".to_string(),
            handler.clone(),
            Arc::new(NoopNodeExtension),
        )
        .unwrap();

        worker.queue(Packet::response(1, vec![9]));
        let start = std::time::Instant::now();
        while worker.processed_responses() < 1 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(worker.processed_responses(), 1);
        assert_eq!(handler.packets.lock()[0].payload(), &[9]);
        assert_eq!(worker.queue_len(), 0);

        worker.stop();
        worker.await_termination(Duration::from_secs(2));
    }
}
