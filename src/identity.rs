//! Thread identity descriptors backing the dispatch predicates.
//!
//! Worker threads install their descriptor when they start; the network layer
//! tags its reactor threads through [`register_io_thread`]. Predicates read
//! the calling thread's descriptor instead of inspecting thread handles.

use std::cell::Cell;

/// What kind of thread the calling thread is, from the scheduler's viewpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadIdentity {
    /// Network reactor thread. Banned from executing or invoking operations
    /// so a slow handler can never stall the reactor.
    Io,
    /// Partition worker with the given thread id.
    Partition(usize),
    /// Generic worker with the given thread id.
    Generic(usize),
    /// The response worker.
    Response,
    /// Any thread the scheduler knows nothing about.
    Other,
}

impl ThreadIdentity {
    /// True for partition and generic workers; false for everything else.
    pub fn is_operation_thread(self) -> bool {
        matches!(
            self,
            ThreadIdentity::Partition(_) | ThreadIdentity::Generic(_)
        )
    }
}

thread_local! {
    static IDENTITY: Cell<ThreadIdentity> = const { Cell::new(ThreadIdentity::Other) };
}

/// The identity of the calling thread.
pub fn current() -> ThreadIdentity {
    IDENTITY.with(|cell| cell.get())
}

/// Tag the calling thread as a network reactor thread.
///
/// The IO layer must call this on every reactor thread it starts, otherwise
/// those threads count as [`ThreadIdentity::Other`] and the inline-execution
/// ban does not apply to them.
pub fn register_io_thread() {
    set_current(ThreadIdentity::Io);
}

pub(crate) fn set_current(identity: ThreadIdentity) {
    IDENTITY.with(|cell| cell.set(identity));
}
