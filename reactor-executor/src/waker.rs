//! The waker token.
//!
//! A [`Waker`] is a cheap-to-copy pair of an executor reference and the id
//! of the task it is bound to. Firing it enqueues that task back onto the
//! executor's ready queue; it does not itself poll anything.

use std::cell::RefCell;
use std::rc::Rc;

use mio::event::Source;
use mio::Interest;
use tracing::trace;

use crate::error::ReactorError;
use crate::executor::{ExecutorInner, Task, TaskId};

#[derive(Clone)]
pub struct Waker {
    pub(crate) inner: Rc<RefCell<ExecutorInner>>,
    pub(crate) id: TaskId,
}

impl Waker {
    pub(crate) fn new(inner: Rc<RefCell<ExecutorInner>>, id: TaskId) -> Self {
        Self { inner, id }
    }

    /// The id of the task this waker reschedules.
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Re-enqueue this waker's task onto the executor's ready queue.
    ///
    /// Firing a waker for a task that is already queued, or currently
    /// being polled, would violate the at-most-one-in-queue invariant;
    /// nothing in this crate does that (combinators guard against it via
    /// their own completion bookkeeping -- see `combinators::join` and
    /// `combinators::select`).
    pub fn wake(&self) {
        trace!(task = self.id.raw(), "waking task");
        self.inner.borrow_mut().enqueue(self.id);
    }

    /// Register interest in `interest` on `source` with the reactor,
    /// keyed on this waker's task id: when `source` becomes ready the
    /// reactor will enqueue this task directly.
    ///
    /// This and [`Waker::unregister`] are the only primitives a leaf
    /// future author needs (spec.md §6): register before returning
    /// [`crate::PollState::Pending`], and unregister before returning a
    /// terminal state.
    pub fn register<S: Source>(&self, source: &mut S, interest: Interest) -> Result<(), ReactorError> {
        self.inner.borrow_mut().reactor().register(source, interest, self)
    }

    /// Remove `source` from the reactor's interest set.
    pub fn unregister<S: Source>(&self, source: &mut S) -> Result<(), ReactorError> {
        self.inner.borrow_mut().reactor().unregister(source)
    }

    /// Spawn `task` as a counted top-level task sharing this waker's
    /// executor -- used by `Join` to schedule its two sub-futures (spec.md
    /// §4.3.2: they are genuine top-level tasks).
    pub(crate) fn spawn_counted(&self, task: Box<dyn Task>) -> TaskId {
        self.inner.borrow_mut().spawn_counted(task)
    }

    /// Spawn `task` as an uncounted internal task sharing this waker's
    /// executor -- used by `Select` to schedule its two sub-futures
    /// (spec.md §4.3.3: they must not be required to terminate for `run()`
    /// to return).
    pub(crate) fn spawn_uncounted(&self, task: Box<dyn Task>) -> TaskId {
        self.inner.borrow_mut().spawn_uncounted(task)
    }

    /// Forcibly free `id`'s arena slot. Used by `Join`'s parent to reclaim
    /// its sub-task wrappers from its own second poll -- see
    /// `combinators::join` and `ExecutorInner::remove_task`.
    pub(crate) fn remove_task(&self, id: TaskId) {
        self.inner.borrow_mut().remove_task(id);
    }
}
