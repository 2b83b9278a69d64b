//! Parallel composition: progress both children concurrently as
//! independent tasks, completing with a pair of results if both succeed.

use std::cell::RefCell;
use std::rc::Rc;

use crate::executor::{Task, TaskId};
use crate::future::{Future, PollState};
use crate::waker::Waker;

/// The error a [`Join`] reports. Carries the successful side's value when
/// only one child failed, so it is not lost (spec.md §8, scenario S4).
#[derive(Debug)]
pub enum JoinError<T1, E1, T2, E2> {
    First { error: E1, second_ok: T2 },
    Second { error: E2, first_ok: T1 },
    Both(E1, E2),
}

struct Shared<T1, E1, T2, E2> {
    fut1: Option<Result<T1, E1>>,
    fut2: Option<Result<T2, E2>>,
    remaining: u8,
}

/// Writes a terminated child's result into its slot, decrements the
/// shared countdown, and wakes the parent exactly once -- when the last
/// side to finish does so (spec.md §4.3.2, invariant 3 in §8).
fn record_and_maybe_wake<T, E>(
    slot: &mut Option<Result<T, E>>,
    remaining: &mut u8,
    parent_waker: &Waker,
    result: Result<T, E>,
) {
    *slot = Some(result);
    *remaining -= 1;
    if *remaining == 0 {
        parent_waker.wake();
    }
}

/// Holds `fut1` until it terminates, then reports `Pending` forever.
///
/// The sub-task is never allowed to return a terminal `PollState` of its
/// own: doing so would let `Executor::poll_one` reclaim its arena slot the
/// instant the child finishes, which is exactly the premature-free spec.md
/// §9 open question (a) rules out. Ownership of the wrapper is only given
/// up when `Join`'s own second poll explicitly removes it (see
/// `Waker::remove_task`), once both sides are known to have terminated.
struct SubFirst<F1: Future, T2, E2> {
    fut: Option<F1>,
    shared: Rc<RefCell<Shared<F1::Output, F1::Error, T2, E2>>>,
    parent_waker: Waker,
}

impl<F1, T2, E2> Task for SubFirst<F1, T2, E2>
where
    F1: Future,
{
    fn poll_task(&mut self, waker: &Waker) -> PollState<(), ()> {
        let fut = match self.fut.as_mut() {
            Some(f) => f,
            None => return PollState::Pending,
        };
        match fut.poll(waker) {
            PollState::Pending => PollState::Pending,
            PollState::Completed(v) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                let mut remaining = shared.remaining;
                record_and_maybe_wake(&mut shared.fut1, &mut remaining, &self.parent_waker, Ok(v));
                shared.remaining = remaining;
                PollState::Pending
            }
            PollState::Failed(e) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                let mut remaining = shared.remaining;
                record_and_maybe_wake(&mut shared.fut1, &mut remaining, &self.parent_waker, Err(e));
                shared.remaining = remaining;
                PollState::Pending
            }
        }
    }
}

/// Mirror of [`SubFirst`] for the second child; see its docs.
struct SubSecond<F2: Future, T1, E1> {
    fut: Option<F2>,
    shared: Rc<RefCell<Shared<T1, E1, F2::Output, F2::Error>>>,
    parent_waker: Waker,
}

impl<F2, T1, E1> Task for SubSecond<F2, T1, E1>
where
    F2: Future,
{
    fn poll_task(&mut self, waker: &Waker) -> PollState<(), ()> {
        let fut = match self.fut.as_mut() {
            Some(f) => f,
            None => return PollState::Pending,
        };
        match fut.poll(waker) {
            PollState::Pending => PollState::Pending,
            PollState::Completed(v) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                let mut remaining = shared.remaining;
                record_and_maybe_wake(&mut shared.fut2, &mut remaining, &self.parent_waker, Ok(v));
                shared.remaining = remaining;
                PollState::Pending
            }
            PollState::Failed(e) => {
                self.fut = None;
                let mut shared = self.shared.borrow_mut();
                let mut remaining = shared.remaining;
                record_and_maybe_wake(&mut shared.fut2, &mut remaining, &self.parent_waker, Err(e));
                shared.remaining = remaining;
                PollState::Pending
            }
        }
    }
}

enum State<F1: Future, F2: Future> {
    NotStarted(F1, F2),
    Running {
        shared: Rc<RefCell<Shared<F1::Output, F1::Error, F2::Output, F2::Error>>>,
        sub1: TaskId,
        sub2: TaskId,
    },
    Done,
}

/// `Join(fut1, fut2)`: run both children to completion concurrently,
/// wrapping each in its own sub-task spawned onto the executor (spec.md
/// §4.3.2 -- unlike `Select`'s sub-futures, these genuinely count toward
/// the executor's outstanding-task total).
pub struct Join<F1: Future, F2: Future> {
    state: State<F1, F2>,
}

impl<F1: Future, F2: Future> Join<F1, F2> {
    pub fn new(fut1: F1, fut2: F2) -> Self {
        Self {
            state: State::NotStarted(fut1, fut2),
        }
    }
}

impl<F1, F2> Future for Join<F1, F2>
where
    F1: Future + 'static,
    F2: Future + 'static,
    F1::Output: 'static,
    F1::Error: 'static,
    F2::Output: 'static,
    F2::Error: 'static,
{
    type Output = (F1::Output, F2::Output);
    type Error = JoinError<F1::Output, F1::Error, F2::Output, F2::Error>;

    fn poll(&mut self, waker: &Waker) -> PollState<Self::Output, Self::Error> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::NotStarted(fut1, fut2) => {
                let shared = Rc::new(RefCell::new(Shared {
                    fut1: None,
                    fut2: None,
                    remaining: 2,
                }));
                let sub1 = SubFirst {
                    fut: Some(fut1),
                    shared: Rc::clone(&shared),
                    parent_waker: waker.clone(),
                };
                let sub2 = SubSecond {
                    fut: Some(fut2),
                    shared: Rc::clone(&shared),
                    parent_waker: waker.clone(),
                };
                let sub1_id = waker.spawn_counted(Box::new(sub1));
                let sub2_id = waker.spawn_counted(Box::new(sub2));
                self.state = State::Running {
                    shared,
                    sub1: sub1_id,
                    sub2: sub2_id,
                };
                PollState::Pending
            }
            State::Running { shared, sub1, sub2 } => {
                let (fut1, fut2) = {
                    let mut s = shared.borrow_mut();
                    (
                        s.fut1.take().expect("Join polled before fut1 finished"),
                        s.fut2.take().expect("Join polled before fut2 finished"),
                    )
                };
                // Both sub-tasks report `Pending` forever once their child
                // terminates (see `SubFirst`/`SubSecond` docs above); their
                // arena slots are only freed here, from the parent's own
                // second poll, matching spec.md §9 open question (a).
                waker.remove_task(sub1);
                waker.remove_task(sub2);
                match (fut1, fut2) {
                    (Ok(v1), Ok(v2)) => PollState::Completed((v1, v2)),
                    (Err(error), Ok(second_ok)) => {
                        PollState::Failed(JoinError::First { error, second_ok })
                    }
                    (Ok(first_ok), Err(error)) => {
                        PollState::Failed(JoinError::Second { error, first_ok })
                    }
                    (Err(e1), Err(e2)) => PollState::Failed(JoinError::Both(e1, e2)),
                }
            }
            State::Done => unreachable!("Join polled after termination"),
        }
    }
}
