//! Trace capture for systematic runs.
//!
//! Every scheduling decision of a systematic run is recorded as a
//! [`TraceEvent`] in a bounded [`TraceBuffer`]. The dispatch-order
//! projection is the determinism oracle: two runs of the same program with
//! the same seed produce identical dispatch orders.

use crate::types::{Access, BehaviourId, CownId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One recorded scheduling event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    /// A behaviour was constructed and began enqueuing on its cowns.
    Spawned {
        /// The behaviour's per-run id.
        behaviour: BehaviourId,
        /// The requested cowns with their access modes, in canonical order.
        requests: Vec<(CownId, Access)>,
    },
    /// Every requested cown granted; the behaviour entered the runnable pool.
    Runnable {
        /// The behaviour's per-run id.
        behaviour: BehaviourId,
    },
    /// The scheduler picked the behaviour to execute.
    Dispatched {
        /// The behaviour's per-run id.
        behaviour: BehaviourId,
        /// The 1-based step at which it ran.
        step: u64,
    },
    /// The behaviour's closure returned and its cowns were released.
    Completed {
        /// The behaviour's per-run id.
        behaviour: BehaviourId,
    },
}

/// A bounded ring of trace events; the oldest events are dropped first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceBuffer {
    events: VecDeque<TraceEvent>,
    capacity: usize,
    dropped: u64,
}

impl TraceBuffer {
    /// Creates a buffer holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Appends an event, evicting the oldest when full.
    pub(crate) fn push(&mut self, event: TraceEvent) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events evicted due to the capacity bound.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Iterates over the retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    /// Clones the retained events into a `Vec`, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<TraceEvent> {
        self.events.iter().cloned().collect()
    }

    /// The order in which behaviours were dispatched.
    #[must_use]
    pub fn dispatch_order(&self) -> Vec<BehaviourId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Dispatched { behaviour, .. } => Some(*behaviour),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable(id: u64) -> TraceEvent {
        TraceEvent::Runnable {
            behaviour: BehaviourId::new(id),
        }
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut buffer = TraceBuffer::new(2);
        buffer.push(runnable(1));
        buffer.push(runnable(2));
        buffer.push(runnable(3));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.to_vec(), vec![runnable(2), runnable(3)]);
    }

    #[test]
    fn dispatch_order_projects_dispatched_events() {
        let mut buffer = TraceBuffer::new(16);
        buffer.push(runnable(1));
        buffer.push(TraceEvent::Dispatched {
            behaviour: BehaviourId::new(1),
            step: 1,
        });
        buffer.push(TraceEvent::Completed {
            behaviour: BehaviourId::new(1),
        });
        buffer.push(TraceEvent::Dispatched {
            behaviour: BehaviourId::new(2),
            step: 2,
        });

        assert_eq!(
            buffer.dispatch_order(),
            vec![BehaviourId::new(1), BehaviourId::new(2)]
        );
    }
}
