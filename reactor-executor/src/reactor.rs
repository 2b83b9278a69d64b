//! The readiness reactor.
//!
//! Bridges OS-level I/O readiness (via `mio`) to the executor: leaf
//! futures register interest in a descriptor becoming readable/writable,
//! and when the OS reports readiness the reactor enqueues the
//! corresponding task directly onto the ready queue it shares with the
//! executor.
//!
//! A single descriptor is associated with a single task id, overwritten by
//! subsequent registrations -- this is the same design point as the
//! original C reactor, which stuffs the waker's identity directly into the
//! OS event payload; here, the "payload" is simply the `mio::Token` that
//! doubles as the task's slab key (see [`crate::executor::TaskId`]), so no
//! auxiliary token-to-waker table is required at all.

use std::io::{self, ErrorKind};

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use tracing::{trace, warn};

use crate::error::ReactorError;
use crate::executor::TaskId;
use crate::queue::ReadyQueue;
use crate::waker::Waker;

/// Documented ceiling on the number of descriptors this reactor will
/// track, matching `original_source/src/mio.c`'s `MAX_DESCRIPTORS`. `mio`
/// itself does not take a capacity bound at construction time, so this
/// surfaces as an assertion in [`Reactor::register`] rather than an OS
/// allocation size.
pub const MAX_DESCRIPTORS: usize = 1_048_577;

/// Number of events drained from the OS per `poll()` call.
const EVENTS_CAPACITY: usize = 256;

pub struct Reactor {
    poll: Poll,
    events: Events,
    registered: usize,
}

impl Reactor {
    pub(crate) fn create() -> Self {
        let poll = Poll::new().expect("reactor-executor: failed to create OS readiness handle");
        Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            registered: 0,
        }
    }

    pub(crate) fn has_registrations(&self) -> bool {
        self.registered > 0
    }

    /// Arm interest in `interest` on `source`, waking `waker`'s task when
    /// it fires.
    ///
    /// On first registration of a given descriptor this increments the
    /// registered-descriptor count; if the descriptor is already armed,
    /// the interest is modified in place (mio's `reregister`) and the
    /// count is left untouched -- matching the `EEXIST` → `EPOLL_CTL_MOD`
    /// fallback in the original reactor.
    pub fn register<S>(
        &mut self,
        source: &mut S,
        interest: Interest,
        waker: &Waker,
    ) -> Result<(), ReactorError>
    where
        S: Source,
    {
        if self.registered >= MAX_DESCRIPTORS {
            return Err(ReactorError::Io(io::Error::new(
                ErrorKind::OutOfMemory,
                "reactor descriptor capacity exhausted",
            )));
        }

        let token = Token(waker.task_id().raw());
        match self.poll.registry().register(source, token, interest) {
            Ok(()) => {
                self.registered += 1;
                trace!(task = waker.task_id().raw(), "registered descriptor");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.poll.registry().reregister(source, token, interest)?;
                trace!(task = waker.task_id().raw(), "reregistered descriptor");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove `source` from the reactor's interest set.
    pub fn unregister<S>(&mut self, source: &mut S) -> Result<(), ReactorError>
    where
        S: Source,
    {
        self.poll.registry().deregister(source)?;
        self.registered = self.registered.saturating_sub(1);
        Ok(())
    }

    /// Block until at least one registered descriptor is ready, then
    /// enqueue every task whose descriptor fired.
    ///
    /// A no-op, returning immediately, if nothing is currently registered
    /// (spec.md §4.2) -- the busy-spin guard in
    /// [`crate::executor::Executor::run`] is what turns a resulting empty
    /// iteration into a loud failure rather than a silent spin.
    pub(crate) fn poll(&mut self, queue: &mut ReadyQueue) -> Result<(), ReactorError> {
        if self.registered == 0 {
            return Ok(());
        }

        self.poll.poll(&mut self.events, None)?;

        for event in self.events.iter() {
            let id = TaskId::from_raw(event.token().0);
            if queue.enqueue(id).is_err() {
                warn!(task = id.raw(), "ready queue full while dispatching reactor event");
                return Err(ReactorError::Io(io::Error::new(
                    ErrorKind::Other,
                    "ready queue overflow while dispatching reactor events",
                )));
            }
        }
        Ok(())
    }
}
