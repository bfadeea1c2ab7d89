//! An asynchronous channel built on a cown.
//!
//! The channel is two FIFOs inside one cown: callbacks waiting for values,
//! and values waiting for callbacks. A write hands its value to the oldest
//! waiting reader or queues it; a read consumes the oldest queued value or
//! queues its callback. At most one of the two queues is ever non-empty.

use crate::cown::Cown;
use crate::when::when;
use std::collections::VecDeque;

type ReadCallback<T> = Box<dyn FnOnce(T) + Send + Sync>;

struct ChannelState<T> {
    reads: VecDeque<ReadCallback<T>>,
    writes: VecDeque<T>,
}

/// A clonable unbounded channel; values are delivered to callbacks in FIFO
/// order.
pub struct Channel<T> {
    state: Cown<ChannelState<T>>,
}

impl<T: Send + Sync + 'static> Channel<T> {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Cown::new(ChannelState {
                reads: VecDeque::new(),
                writes: VecDeque::new(),
            }),
        }
    }

    /// Sends `value`: delivered to the oldest waiting reader, or queued.
    pub fn write(&self, value: T) {
        when(self.state.clone()).run(move |mut channel| {
            if let Some(reader) = channel.reads.pop_front() {
                debug_assert!(channel.writes.is_empty(), "both channel queues non-empty");
                reader(value);
            } else {
                channel.writes.push_back(value);
            }
        });
    }

    /// Receives one value into `callback`: the oldest queued value, or the
    /// next one written.
    pub fn read<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + Sync + 'static,
    {
        when(self.state.clone()).run(move |mut channel| {
            if let Some(value) = channel.writes.pop_front() {
                debug_assert!(channel.reads.is_empty(), "both channel queues non-empty");
                callback(value);
            } else {
                channel.reads.push_back(Box::new(callback));
            }
        });
    }
}

impl<T: Send + Sync + 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> core::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Channel({:?})", self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systematic::run_systematic;
    use crate::when::schedule;
    use std::sync::{Arc, Mutex};

    #[test]
    fn values_reach_readers_in_fifo_order() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&received);
        let report = run_systematic(11, move || {
            let channel = Channel::new();
            channel.write(1_u32);
            channel.write(2_u32);
            let first = Arc::clone(&out);
            channel.read(move |value| first.lock().expect("received lock").push(value));
            let second = Arc::clone(&out);
            channel.read(move |value| second.lock().expect("received lock").push(value));
        });
        assert!(report.quiescent);
        assert_eq!(*received.lock().expect("received lock"), vec![1, 2]);
    }

    #[test]
    fn readers_park_until_a_value_arrives() {
        for seed in 0..24 {
            let received = Arc::new(Mutex::new(Vec::new()));
            let out = Arc::clone(&received);
            let report = run_systematic(seed, move || {
                let channel = Channel::new();
                // Racy spawn order: readers and writers interleave per seed.
                for value in [2_u32, 42] {
                    let channel = channel.clone();
                    schedule(move || channel.write(value));
                }
                for _ in 0..2 {
                    let channel = channel.clone();
                    let sink = Arc::clone(&out);
                    schedule(move || {
                        channel.read(move |value| {
                            sink.lock().expect("received lock").push(value);
                        });
                    });
                }
            });
            assert!(report.quiescent);
            let mut values = received.lock().expect("received lock").clone();
            values.sort_unstable();
            assert_eq!(values, vec![2, 42], "every write is delivered exactly once");
        }
    }
}
