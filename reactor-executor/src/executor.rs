//! The task executor.
//!
//! Owns the ready queue and the reactor, and repeatedly polls ready tasks
//! until every top-level task spawned onto it has reached a terminal
//! state. There is exactly one logical thread of control here: no part of
//! this module is `Send` or `Sync`, which is the compile-time expression
//! of "no locking is required" (the runtime is single-threaded by
//! construction, not by convention).

use std::cell::RefCell;
use std::rc::Rc;

use slab::Slab;
use tracing::{debug, error, trace};

use crate::error::{ExecutorError, ReactorError};
use crate::future::{Future, PollState};
use crate::queue::ReadyQueue;
use crate::reactor::Reactor;
use crate::waker::Waker;

/// A handle into the executor's task arena.
///
/// This is the concrete form of the "arena of sub-future slots indexed by
/// small handles" the design notes call for: the slab key doubles as the
/// mio registration token for leaf futures that register file descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub(crate) fn from_raw(raw: usize) -> Self {
        TaskId(raw)
    }

    pub(crate) fn raw(self) -> usize {
        self.0
    }
}

/// Internal, object-safe driving trait every task in the arena implements.
///
/// This is deliberately *not* the public [`Future`] trait: the arena is
/// type-erased (it must hold a leaf future, a `Then`, a `Join`, and a
/// `Join`'s sub-future side by side), whereas `Future::Output` varies per
/// concrete type. A task's actual result, if any caller cares about it, is
/// delivered out of band via a [`JoinHandle`] or a combinator's own shared
/// state -- `poll_task` itself only ever needs to report whether the task
/// is done.
pub(crate) trait Task {
    fn poll_task(&mut self, waker: &Waker) -> PollState<(), ()>;

    /// Called instead of `poll_task` during [`Executor::destroy`]'s
    /// shutdown drain, for tasks still sitting in the ready queue when the
    /// executor is torn down. The default is a no-op; `Select`'s losing
    /// sub-future overrides this to release its wrapper (see
    /// `combinators::select`).
    fn dispose(&mut self) {}
}

pub(crate) type TaskCell = Rc<RefCell<Box<dyn Task>>>;

/// An arena slot: the task itself plus whether it counts toward
/// `outstanding`. Tracked per-slot rather than inferred from context so
/// that an uncounted task's own termination (e.g. `Select`'s losing
/// branch, if it ever does terminate) never perturbs the counted total.
struct Entry {
    cell: TaskCell,
    counted: bool,
}

/// Adapts a concrete [`Future`] into the object-safe [`Task`] the executor
/// arena stores, stashing the terminal result into a shared slot a
/// [`JoinHandle`] can read back.
struct TopLevelTask<F: Future> {
    future: F,
    slot: Rc<RefCell<Option<PollState<F::Output, F::Error>>>>,
}

impl<F: Future> Task for TopLevelTask<F> {
    fn poll_task(&mut self, waker: &Waker) -> PollState<(), ()> {
        match self.future.poll(waker) {
            PollState::Pending => PollState::Pending,
            PollState::Completed(v) => {
                *self.slot.borrow_mut() = Some(PollState::Completed(v));
                PollState::Completed(())
            }
            PollState::Failed(e) => {
                *self.slot.borrow_mut() = Some(PollState::Failed(e));
                PollState::Failed(())
            }
        }
    }
}

/// A handle to a spawned future's eventual result.
///
/// Caller and executor share ownership of the result slot: the executor
/// owns and drives the boxed future itself (see `DESIGN.md` for why this
/// crate resolves spec.md's "caller retains ownership" wording this way),
/// while the caller retains a cheap handle to read the outcome back out
/// once `Executor::run` returns.
pub struct JoinHandle<T, E> {
    slot: Rc<RefCell<Option<PollState<T, E>>>>,
}

impl<T, E> JoinHandle<T, E> {
    /// Take the result, if the task has terminated. Returns `None` if the
    /// task is still pending (including if `run()` has not been called
    /// yet).
    pub fn try_take(&self) -> Option<PollState<T, E>> {
        self.slot.borrow_mut().take()
    }
}

/// Shared executor state: the ready queue, task arena, and reactor.
///
/// Lives behind an `Rc<RefCell<_>>` so that [`Waker`]s -- which must be
/// able to reach back into the executor from anywhere, including from
/// inside a task's own `poll` -- can hold a cheap clone of it without
/// fighting the borrow checker across `run()`'s call stack.
pub struct ExecutorInner {
    queue: ReadyQueue,
    tasks: Slab<Entry>,
    reactor: Reactor,
    outstanding: usize,
}

impl ExecutorInner {
    pub(crate) fn enqueue(&mut self, id: TaskId) {
        // Enqueueing beyond capacity is a sizing bug in the caller, not a
        // recoverable condition -- matches the original executor's
        // `fatal()` on the equivalent path.
        if let Err(err) = self.queue.enqueue(id) {
            error!(error = %err, "ready queue overflow");
            panic!("reactor-executor: {err}");
        }
    }

    pub(crate) fn reactor(&mut self) -> &mut Reactor {
        &mut self.reactor
    }

    /// Insert `task`, enqueue it, and count it toward `outstanding` -- used
    /// by top-level `spawn` and by `Join`'s sub-futures (which are genuine
    /// top-level tasks from the executor's point of view; see spec.md
    /// §4.3.2).
    pub(crate) fn spawn_counted(&mut self, task: Box<dyn Task>) -> TaskId {
        let id = TaskId::from_raw(self.tasks.insert(Entry {
            cell: Rc::new(RefCell::new(task)),
            counted: true,
        }));
        self.outstanding += 1;
        self.enqueue(id);
        id
    }

    /// Insert `task` and enqueue it, *without* counting it toward
    /// `outstanding` -- used by `Select`'s sub-futures, which must not be
    /// required to reach a terminal state for `run()` to return (see
    /// spec.md §4.3.3 and `combinators::select`).
    pub(crate) fn spawn_uncounted(&mut self, task: Box<dyn Task>) -> TaskId {
        let id = TaskId::from_raw(self.tasks.insert(Entry {
            cell: Rc::new(RefCell::new(task)),
            counted: false,
        }));
        self.enqueue(id);
        id
    }

    /// Forcibly free a task's arena slot, independent of whatever
    /// `PollState` its own `poll_task` last returned.
    ///
    /// Used by `Join`'s parent future to reclaim its two sub-task wrappers
    /// from its own second poll (spec.md §9 open question (a)): those
    /// sub-tasks deliberately never report a terminal state themselves, so
    /// `Executor::poll_one` would otherwise never remove them.
    pub(crate) fn remove_task(&mut self, id: TaskId) {
        if let Some(entry) = self.tasks.try_remove(id.raw()) {
            if entry.counted {
                self.outstanding = self.outstanding.saturating_sub(1);
            }
        }
    }
}

/// The executor: owns the ready queue and a bound reactor, and drives
/// spawned futures to completion.
pub struct Executor {
    inner: Rc<RefCell<ExecutorInner>>,
}

impl Executor {
    /// Allocate a ready queue with the given fixed capacity and a bound
    /// reactor.
    pub fn create(capacity: usize) -> Self {
        let reactor = Reactor::create();
        let inner = ExecutorInner {
            queue: ReadyQueue::new(capacity),
            tasks: Slab::new(),
            reactor,
            outstanding: 0,
        };
        debug!(capacity, "executor created");
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Spawn `future` as a new top-level task, returning a handle to its
    /// eventual result.
    ///
    /// Calling this from outside an active `poll` after `run()` has
    /// already begun is not supported (see `DESIGN.md`); calling it
    /// re-entrantly from inside a task's own `poll` on the same thread is
    /// fine and is how `Join`/`Select` schedule their sub-futures.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output, F::Error>
    where
        F: Future + 'static,
    {
        let slot = Rc::new(RefCell::new(None));
        let task = TopLevelTask {
            future,
            slot: Rc::clone(&slot),
        };
        let id = self.inner.borrow_mut().spawn_counted(Box::new(task));
        trace!(task = id.raw(), "spawned top-level task");
        JoinHandle { slot }
    }

    pub(crate) fn waker_for(&self, id: TaskId) -> Waker {
        Waker::new(Rc::clone(&self.inner), id)
    }

    /// Run the main loop until every spawned top-level task has reached a
    /// terminal state.
    pub fn run(&mut self) {
        loop {
            let outstanding = self.inner.borrow().outstanding;
            if outstanding == 0 {
                debug!("all top-level tasks finished");
                break;
            }

            let next = self.inner.borrow_mut().queue.dequeue();
            match next {
                Some(id) => self.poll_one(id),
                None => {
                    if let Err(err) = self.block_on_reactor() {
                        error!(error = %err, "fatal executor error");
                        panic!("reactor-executor: {err}");
                    }
                }
            }
        }
    }

    fn poll_one(&mut self, id: TaskId) {
        let task_cell = {
            let inner = self.inner.borrow();
            match inner.tasks.get(id.raw()) {
                Some(entry) => Rc::clone(&entry.cell),
                // Guard against a stale wakeup for a task that already
                // terminated and was removed from the arena.
                None => return,
            }
        };

        let waker = self.waker_for(id);
        let outcome = task_cell.borrow_mut().poll_task(&waker);

        if outcome.is_terminal() {
            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.tasks.try_remove(id.raw()) {
                if entry.counted {
                    inner.outstanding = inner.outstanding.saturating_sub(1);
                }
                trace!(task = id.raw(), remaining = inner.outstanding, "task terminated");
            }
        }
    }

    fn block_on_reactor(&mut self) -> Result<(), ExecutorError> {
        let mut inner = self.inner.borrow_mut();
        inner.reactor.poll(&mut inner.queue)?;

        // The reactor guarantees it will enqueue at least one task before
        // returning whenever descriptors are registered (spec.md §5). If
        // nothing was registered *and* the queue is still empty here, we
        // would spin forever re-entering this branch: report it as the
        // deadlock it is instead of spinning.
        if inner.queue.is_empty() && inner.outstanding > 0 && !inner.reactor.has_registrations() {
            return Err(ExecutorError::Reactor(ReactorError::Deadlock));
        }
        Ok(())
    }

    /// Dispose of every task still held in the arena -- not just the ready
    /// queue. A `Select`'s losing branch (spec.md §4.3.3) is marked
    /// unneeded and never woken again once the race is settled, so it sits
    /// outside the ready queue for the rest of the run; walking the whole
    /// arena here, rather than only draining the queue, is what makes
    /// invariant 5 in spec.md §8 ("destroy leaves no sub-future wrapper
    /// allocated") actually hold.
    pub fn destroy(self) {
        let mut inner = self.inner.borrow_mut();
        for (_, entry) in inner.tasks.iter() {
            entry.cell.borrow_mut().dispose();
        }
        inner.tasks.clear();
        debug!("executor destroyed");
        // `inner`'s `Reactor` is dropped here along with the last `Rc` to
        // `ExecutorInner` once every outstanding `Waker` goes out of scope.
    }
}
