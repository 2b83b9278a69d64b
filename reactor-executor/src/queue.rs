//! The executor's bounded, FIFO ready queue.
//!
//! This is a direct port of the cyclic-buffer task queue used by the
//! original executor: a fixed-capacity ring buffer of task ids, valid and
//! empty iff `len == 0`. Enqueueing past capacity is a programmer error
//! (the caller sizes the executor), so it is reported as an error the
//! executor turns into a fatal diagnostic rather than silently dropped or
//! grown.

use crate::error::ExecutorError;
use crate::executor::TaskId;

/// A bounded FIFO of [`TaskId`]s with a fixed capacity chosen at executor
/// creation.
///
/// Invariants:
/// - `len() <= capacity()` at all times;
/// - enqueueing beyond capacity is an error;
/// - dequeueing from an empty queue yields `None`;
/// - ordering is strict FIFO.
pub struct ReadyQueue {
    data: Vec<Option<TaskId>>,
    capacity: usize,
    head: usize,
    tail: usize,
    len: usize,
}

impl ReadyQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ready queue capacity must be non-zero");
        Self {
            data: vec![None; capacity],
            capacity,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Push `id` onto the back of the queue.
    pub fn enqueue(&mut self, id: TaskId) -> Result<(), ExecutorError> {
        if self.len == self.capacity {
            return Err(ExecutorError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.data[self.head] = Some(id);
        self.head = (self.head + 1) % self.capacity;
        self.len += 1;
        Ok(())
    }

    /// Pop the oldest enqueued id, if any.
    pub fn dequeue(&mut self) -> Option<TaskId> {
        if self.len == 0 {
            return None;
        }
        let id = self.data[self.tail].take();
        self.tail = (self.tail + 1) % self.capacity;
        self.len -= 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use proptest::prelude::*;

    use super::*;

    fn id(n: usize) -> TaskId {
        TaskId::from_raw(n)
    }

    proptest! {
        /// Invariant 1 (spec.md §8): for any sequence of enqueues/dequeues
        /// within capacity, the queue never exceeds capacity and dequeued
        /// ids emerge in strict FIFO order.
        #[test]
        fn respects_capacity_and_fifo_order(
            capacity in 1usize..8,
            push in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let mut q = ReadyQueue::new(capacity);
            let mut model: VecDeque<usize> = VecDeque::new();
            let mut next_id = 0usize;

            for enqueue in push {
                if enqueue {
                    let result = q.enqueue(id(next_id));
                    if model.len() == capacity {
                        prop_assert!(result.is_err());
                    } else {
                        prop_assert!(result.is_ok());
                        model.push_back(next_id);
                    }
                    next_id += 1;
                } else {
                    let got = q.dequeue();
                    match model.pop_front() {
                        Some(expected) => prop_assert_eq!(got, Some(id(expected))),
                        None => prop_assert_eq!(got, None),
                    }
                }
                prop_assert!(q.len() <= capacity);
                prop_assert_eq!(q.is_empty(), model.is_empty());
            }
        }
    }

    #[test]
    fn fifo_order() {
        let mut q = ReadyQueue::new(4);
        let a = id(0);
        let b = id(1);
        let c = id(2);
        q.enqueue(a).unwrap();
        q.enqueue(b).unwrap();
        q.enqueue(c).unwrap();
        assert_eq!(q.dequeue(), Some(a));
        assert_eq!(q.dequeue(), Some(b));
        assert_eq!(q.dequeue(), Some(c));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn rejects_over_capacity() {
        let mut q = ReadyQueue::new(1);
        q.enqueue(id(0)).unwrap();
        assert!(q.enqueue(id(1)).is_err());
    }

    #[test]
    fn wraps_around_ring_buffer() {
        let mut q = ReadyQueue::new(2);
        q.enqueue(id(0)).unwrap();
        q.enqueue(id(1)).unwrap();
        assert_eq!(q.dequeue(), Some(id(0)));
        q.enqueue(id(2)).unwrap();
        assert_eq!(q.dequeue(), Some(id(1)));
        assert_eq!(q.dequeue(), Some(id(2)));
        assert!(q.is_empty());
    }
}
