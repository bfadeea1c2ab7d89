//! Per-worker local queue.
//!
//! A lock-based deque: the owning worker pushes and pops at the back
//! (LIFO, for cache locality on freshly granted behaviours) while thieves
//! steal from the front (FIFO, taking the oldest work). Lock-based keeps
//! the crate free of `unsafe` while preserving work-stealing semantics;
//! the critical sections are single deque operations.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A single-owner, multi-thief deque.
#[derive(Debug)]
pub(crate) struct LocalQueue<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> LocalQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Pushes an item at the owner end.
    pub(crate) fn push(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    /// Pops the most recently pushed item (owner side, LIFO).
    pub(crate) fn pop(&self) -> Option<T> {
        self.inner.lock().pop_back()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Creates a stealer handle for this queue.
    pub(crate) fn stealer(&self) -> Stealer<T> {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Clone for LocalQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Steals the oldest items from a [`LocalQueue`].
#[derive(Debug)]
pub(crate) struct Stealer<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Stealer<T> {
    /// Takes the oldest item (thief side, FIFO).
    pub(crate) fn steal(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }
}

impl<T> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn owner_pops_lifo() {
        let queue = LocalQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn thief_steals_fifo() {
        let queue = LocalQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        let stealer = queue.stealer();
        assert_eq!(stealer.steal(), Some(1));
        assert_eq!(stealer.steal(), Some(2));
        assert_eq!(stealer.steal(), Some(3));
        assert_eq!(stealer.steal(), None);
    }

    #[test]
    fn owner_and_thieves_see_each_item_once() {
        let queue = Arc::new(LocalQueue::new());
        let total = 512_usize;
        for item in 0..total {
            queue.push(item);
        }

        let counts: Arc<Vec<AtomicUsize>> =
            Arc::new((0..total).map(|_| AtomicUsize::new(0)).collect());
        let thieves = 4;
        let barrier = Arc::new(Barrier::new(thieves + 1));

        let owner = {
            let queue = Arc::clone(&queue);
            let counts = Arc::clone(&counts);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                while let Some(item) = queue.pop() {
                    counts[item].fetch_add(1, Ordering::SeqCst);
                    thread::yield_now();
                }
            })
        };

        let mut handles = Vec::new();
        for _ in 0..thieves {
            let stealer = queue.stealer();
            let counts = Arc::clone(&counts);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                while let Some(item) = stealer.steal() {
                    counts[item].fetch_add(1, Ordering::SeqCst);
                    thread::yield_now();
                }
            }));
        }

        owner.join().expect("owner join");
        for handle in handles {
            handle.join().expect("thief join");
        }

        let mut seen = HashSet::new();
        for (item, count) in counts.iter().enumerate() {
            assert_eq!(count.load(Ordering::SeqCst), 1, "item {item} duplicated or lost");
            seen.insert(item);
        }
        assert_eq!(seen.len(), total);
    }
}
