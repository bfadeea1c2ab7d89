//! Global injection queue.
//!
//! A thread-safe unbounded FIFO for runnable behaviours that cannot be
//! pushed to a worker-local queue: the root behaviour, and grants resolved
//! on threads that own no local queue.

use crossbeam_queue::SegQueue;

/// An unbounded multi-producer multi-consumer FIFO.
#[derive(Debug)]
pub(crate) struct GlobalQueue<T> {
    inner: SegQueue<T>,
}

impl<T> GlobalQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    pub(crate) fn push(&self, item: T) {
        self.inner.push(item);
    }

    pub(crate) fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> Default for GlobalQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn pops_in_push_order() {
        let queue = GlobalQueue::new();
        for i in 0..10 {
            queue.push(i);
        }
        for i in 0..10 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_consumers_drain_exactly_once() {
        let queue = Arc::new(GlobalQueue::new());
        let total = 1000_usize;
        for i in 0..total {
            queue.push(i);
        }

        let consumers = 4;
        let barrier = Arc::new(Barrier::new(consumers));
        let handles: Vec<_> = (0..consumers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut seen = Vec::new();
                    while let Some(item) = queue.pop() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("consumer join"))
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..total).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }
}
