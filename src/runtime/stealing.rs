//! Work stealing.

use crate::runtime::local_queue::Stealer;
use crate::util::DetRng;

/// Tries each peer stealer once, starting at a random index.
pub(crate) fn steal<T>(stealers: &[Stealer<T>], rng: &mut DetRng) -> Option<T> {
    if stealers.is_empty() {
        return None;
    }

    let len = stealers.len();
    let start = rng.next_usize(len);
    for offset in 0..len {
        if let Some(item) = stealers[(start + offset) % len].steal() {
            return Some(item);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::local_queue::LocalQueue;
    use std::collections::HashSet;

    #[test]
    fn steals_from_the_only_busy_queue() {
        let empty_a = LocalQueue::new();
        let empty_b = LocalQueue::new();
        let busy = LocalQueue::new();
        busy.push(99);

        let stealers = vec![empty_a.stealer(), empty_b.stealer(), busy.stealer()];
        let mut rng = DetRng::new(3);
        assert_eq!(steal(&stealers, &mut rng), Some(99));
    }

    #[test]
    fn empty_everything_returns_none() {
        let queue: LocalQueue<u32> = LocalQueue::new();
        let mut rng = DetRng::new(3);
        assert_eq!(steal(&[queue.stealer()], &mut rng), None);
        assert_eq!(steal::<u32>(&[], &mut rng), None);
    }

    #[test]
    fn repeated_steals_visit_every_queue() {
        let queues: Vec<LocalQueue<usize>> = (0..5).map(|_| LocalQueue::new()).collect();
        for (index, queue) in queues.iter().enumerate() {
            queue.push(index);
        }

        let stealers: Vec<_> = queues.iter().map(LocalQueue::stealer).collect();
        let mut rng = DetRng::new(1);
        let mut seen = HashSet::new();
        for _ in 0..5 {
            if let Some(item) = steal(&stealers, &mut rng) {
                seen.insert(item);
            }
        }
        assert_eq!(seen.len(), 5);
    }
}
