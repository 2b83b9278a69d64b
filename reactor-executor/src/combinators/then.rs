//! Sequential composition: poll the first future to completion, feed its
//! output into a factory that produces the second, then poll that to
//! completion.

use crate::future::{Future, PollState};
use crate::waker::Waker;

/// The error a [`Then`] reports, distinguishing which child failed.
#[derive(Debug)]
pub enum ThenError<E1, E2> {
    First(E1),
    Second(E2),
}

enum State<F1, F2> {
    First(F1),
    Second(F2),
}

/// `Then(fut1, make_fut2)`: poll `fut1`; on completion, call `make_fut2`
/// with `fut1`'s output to build the second future, then poll that.
/// Completes with the second future's output; fails with whichever child
/// failed first. `fut2` is never even constructed if `fut1` fails.
///
/// Child futures are not spawned independently -- `Then` holds them and
/// polls them directly with its own waker, exactly as spec.md §4.3.1
/// describes.
pub struct Then<F1, F2, M>
where
    F1: Future,
    F2: Future,
    M: FnOnce(F1::Output) -> F2,
{
    state: State<F1, F2>,
    make_second: Option<M>,
}

impl<F1, F2, M> Then<F1, F2, M>
where
    F1: Future,
    F2: Future,
    M: FnOnce(F1::Output) -> F2,
{
    pub fn new(first: F1, make_second: M) -> Self {
        Self {
            state: State::First(first),
            make_second: Some(make_second),
        }
    }
}

impl<F1, F2, M> Future for Then<F1, F2, M>
where
    F1: Future,
    F2: Future,
    M: FnOnce(F1::Output) -> F2,
{
    type Output = F2::Output;
    type Error = ThenError<F1::Error, F2::Error>;

    fn poll(&mut self, waker: &Waker) -> PollState<Self::Output, Self::Error> {
        if let State::First(fut1) = &mut self.state {
            match fut1.poll(waker) {
                PollState::Pending => return PollState::Pending,
                PollState::Failed(e) => return PollState::Failed(ThenError::First(e)),
                PollState::Completed(v) => {
                    let make_second = self
                        .make_second
                        .take()
                        .expect("Then: make_second already consumed");
                    self.state = State::Second(make_second(v));
                }
            }
        }

        match &mut self.state {
            State::Second(fut2) => match fut2.poll(waker) {
                PollState::Pending => PollState::Pending,
                PollState::Failed(e) => PollState::Failed(ThenError::Second(e)),
                PollState::Completed(v) => PollState::Completed(v),
            },
            State::First(_) => unreachable!("transitioned to Second above"),
        }
    }
}
