//! Crate-wide error types for the subsystems that can fail in a way a
//! caller is expected to handle (as opposed to allocation/OS-handle
//! failures, which are fatal -- see the module docs on [`crate::executor`]).

use std::io;

use thiserror::Error;

/// Failures surfaced by [`crate::reactor::Reactor`] registration and
/// polling.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The underlying OS readiness facility (epoll, kqueue, ...) returned
    /// an error from `register`/`reregister`/`deregister`.
    #[error("reactor registration failed: {0}")]
    Io(#[from] io::Error),

    /// The reactor was asked to block on `poll()` while nothing was
    /// registered and the executor still had outstanding tasks -- this
    /// would spin forever, so it is reported instead.
    #[error(
        "deadlock: reactor has no registered descriptors but the executor still has \
         outstanding tasks waiting to be woken"
    )]
    Deadlock,
}

/// Failures surfaced by [`crate::executor::Executor`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The ready queue is at capacity; the caller is responsible for
    /// sizing the executor's queue to the workload.
    #[error("ready queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error(transparent)]
    Reactor(#[from] ReactorError),
}
