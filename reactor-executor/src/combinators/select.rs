//! First-to-finish racing: complete with whichever child finishes first;
//! report a combined failure only if both children fail.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::executor::Task;
use crate::future::{Future, PollState};
use crate::waker::Waker;

/// The error a [`Select`] reports. Only produced once *both* children have
/// failed -- a single failure just leaves `Select` waiting on the other
/// side (spec.md §8, scenario S6).
#[derive(Debug)]
pub enum SelectError<E1, E2> {
    Both(E1, E2),
}

struct Shared<T, E1, E2> {
    result: Option<T>,
    err1: Option<E1>,
    err2: Option<E2>,
}

/// The losing branch's sub-future is spawned uncounted (spec.md §4.3.3):
/// it never holds up `run()`'s termination. Once the race is settled by a
/// completion, `other_unneeded` is set and the loser stops polling its
/// child altogether, reporting `Pending` forever until the executor's
/// shutdown drain calls [`Task::dispose`] on it.
struct SubFirst<F1: Future, E2> {
    fut: Option<F1>,
    shared: Rc<RefCell<Shared<F1::Output, F1::Error, E2>>>,
    parent_waker: Waker,
    own_unneeded: Rc<Cell<bool>>,
    other_unneeded: Rc<Cell<bool>>,
}

impl<F1, E2> Task for SubFirst<F1, E2>
where
    F1: Future,
{
    fn poll_task(&mut self, waker: &Waker) -> PollState<(), ()> {
        if self.own_unneeded.get() {
            return PollState::Pending;
        }
        let fut = match self.fut.as_mut() {
            Some(f) => f,
            None => return PollState::Pending,
        };
        match fut.poll(waker) {
            PollState::Pending => PollState::Pending,
            PollState::Completed(v) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                if shared.result.is_none() {
                    shared.result = Some(v);
                    self.other_unneeded.set(true);
                    drop(shared);
                    self.parent_waker.wake();
                }
                PollState::Completed(())
            }
            PollState::Failed(e) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                if shared.result.is_some() {
                    return PollState::Failed(());
                }
                shared.err1 = Some(e);
                let both_failed = shared.err1.is_some() && shared.err2.is_some();
                drop(shared);
                if both_failed {
                    self.parent_waker.wake();
                }
                PollState::Failed(())
            }
        }
    }

    fn dispose(&mut self) {
        self.fut = None;
    }
}

struct SubSecond<F2: Future, E1> {
    fut: Option<F2>,
    shared: Rc<RefCell<Shared<F2::Output, E1, F2::Error>>>,
    parent_waker: Waker,
    own_unneeded: Rc<Cell<bool>>,
    other_unneeded: Rc<Cell<bool>>,
}

impl<F2, E1> Task for SubSecond<F2, E1>
where
    F2: Future,
{
    fn poll_task(&mut self, waker: &Waker) -> PollState<(), ()> {
        if self.own_unneeded.get() {
            return PollState::Pending;
        }
        let fut = match self.fut.as_mut() {
            Some(f) => f,
            None => return PollState::Pending,
        };
        match fut.poll(waker) {
            PollState::Pending => PollState::Pending,
            PollState::Completed(v) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                if shared.result.is_none() {
                    shared.result = Some(v);
                    self.other_unneeded.set(true);
                    drop(shared);
                    self.parent_waker.wake();
                }
                PollState::Completed(())
            }
            PollState::Failed(e) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                if shared.result.is_some() {
                    return PollState::Failed(());
                }
                shared.err2 = Some(e);
                let both_failed = shared.err1.is_some() && shared.err2.is_some();
                drop(shared);
                if both_failed {
                    self.parent_waker.wake();
                }
                PollState::Failed(())
            }
        }
    }

    fn dispose(&mut self) {
        self.fut = None;
    }
}

enum State<F1: Future, F2: Future> {
    NotStarted(F1, F2),
    Running(Rc<RefCell<Shared<F1::Output, F1::Error, F2::Error>>>),
    Done,
}

/// `Select(fut1, fut2)`: race two same-output children, completing with
/// whichever finishes first. The losing child is left running in the
/// background, marked unneeded, and reclaimed during shutdown.
pub struct Select<F1: Future, F2: Future> {
    state: State<F1, F2>,
}

impl<F1: Future, F2: Future> Select<F1, F2> {
    pub fn new(fut1: F1, fut2: F2) -> Self {
        Self {
            state: State::NotStarted(fut1, fut2),
        }
    }
}

impl<F1, F2> Future for Select<F1, F2>
where
    F1: Future + 'static,
    F2: Future<Output = F1::Output> + 'static,
    F1::Output: 'static,
    F1::Error: 'static,
    F2::Error: 'static,
{
    type Output = F1::Output;
    type Error = SelectError<F1::Error, F2::Error>;

    fn poll(&mut self, waker: &Waker) -> PollState<Self::Output, Self::Error> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::NotStarted(fut1, fut2) => {
                let shared = Rc::new(RefCell::new(Shared {
                    result: None,
                    err1: None,
                    err2: None,
                }));
                let unneeded1 = Rc::new(Cell::new(false));
                let unneeded2 = Rc::new(Cell::new(false));
                let sub1 = SubFirst {
                    fut: Some(fut1),
                    shared: Rc::clone(&shared),
                    parent_waker: waker.clone(),
                    own_unneeded: Rc::clone(&unneeded1),
                    other_unneeded: Rc::clone(&unneeded2),
                };
                let sub2 = SubSecond {
                    fut: Some(fut2),
                    shared: Rc::clone(&shared),
                    parent_waker: waker.clone(),
                    own_unneeded: Rc::clone(&unneeded2),
                    other_unneeded: Rc::clone(&unneeded1),
                };
                waker.spawn_uncounted(Box::new(sub1));
                waker.spawn_uncounted(Box::new(sub2));
                self.state = State::Running(shared);
                PollState::Pending
            }
            State::Running(shared) => {
                let mut s = shared.borrow_mut();
                if let Some(v) = s.result.take() {
                    return PollState::Completed(v);
                }
                match (s.err1.take(), s.err2.take()) {
                    (Some(e1), Some(e2)) => PollState::Failed(SelectError::Both(e1, e2)),
                    _ => unreachable!("Select woken before either branch settled"),
                }
            }
            State::Done => unreachable!("Select polled after termination"),
        }
    }
}
