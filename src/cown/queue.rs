//! Per-cown queue state machine.
//!
//! Each cown carries the state that serialises access to its payload: which
//! mode is currently active (idle, one writer, or a read-group with an
//! in-flight count) and the FIFO of behaviours waiting behind it. The state
//! sits behind a per-cown mutex; critical sections are a handful of queue
//! operations, and no lock spans more than one cown.
//!
//! Grants are returned to the caller and resolved outside the lock.

use crate::behaviour::Behaviour;
use crate::types::{Access, CownId};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Behaviours granted this cown by a single enqueue or release transition.
///
/// More than one entry only when a releasing writer admits a read-group.
pub(crate) type Grants = SmallVec<[Arc<Behaviour>; 2]>;

/// A flag that flips once a behaviour has finished enqueuing on all of its
/// cowns. Successors wait on it before enqueuing on their own next cown,
/// which keeps per-cown queue orders mutually consistent.
pub(crate) type EnqueueFence = Arc<AtomicBool>;

/// Result of appending a behaviour to a cown's queue.
pub(crate) struct EnqueueOutcome {
    /// The slot was granted immediately (empty queue, or an open read-group
    /// was joined).
    pub granted: bool,
    /// Fence of the behaviour that was the queue tail before this one.
    pub fence: Option<EnqueueFence>,
}

/// The type-independent header of a cown: identity plus queue state.
pub(crate) struct CownHeader {
    id: CownId,
    queue: Mutex<QueueState>,
}

/// What currently holds the cown.
#[derive(Default)]
enum Active {
    /// No behaviour holds the cown and nothing is queued.
    #[default]
    Idle,
    /// One writer holds the cown.
    Writer,
    /// A read-group holds the cown; the count is the number of members that
    /// have not yet released.
    Readers(usize),
}

#[derive(Default)]
struct QueueState {
    active: Active,
    waiting: VecDeque<Waiter>,
    /// Fence of the most recent enqueuer, granted or waiting.
    last_tail: Option<EnqueueFence>,
}

struct Waiter {
    behaviour: Arc<Behaviour>,
    mode: Access,
}

impl CownHeader {
    pub(crate) fn new() -> Self {
        Self {
            id: CownId::fresh(),
            queue: Mutex::new(QueueState::default()),
        }
    }

    pub(crate) fn id(&self) -> CownId {
        self.id
    }

    /// Appends `behaviour` to this cown's queue in `mode`.
    ///
    /// A write is granted only on an empty queue. A read is granted on an
    /// empty queue or when the active read-group is still open (no waiter has
    /// closed it); it then joins the group. Everything else waits in FIFO
    /// order.
    pub(crate) fn enqueue(&self, behaviour: &Arc<Behaviour>, mode: Access) -> EnqueueOutcome {
        let mut queue = self.queue.lock();
        let state = &mut *queue;
        let fence = state.last_tail.replace(behaviour.enqueue_fence());
        let granted = match (&mut state.active, mode) {
            (active @ Active::Idle, Access::Write) => {
                debug_assert!(state.waiting.is_empty(), "idle cown with waiters");
                *active = Active::Writer;
                true
            }
            (active @ Active::Idle, Access::Read) => {
                debug_assert!(state.waiting.is_empty(), "idle cown with waiters");
                *active = Active::Readers(1);
                true
            }
            // An active read-group stays open until something queues behind it.
            (Active::Readers(count), Access::Read) if state.waiting.is_empty() => {
                *count += 1;
                true
            }
            _ => {
                state.waiting.push_back(Waiter {
                    behaviour: Arc::clone(behaviour),
                    mode,
                });
                false
            }
        };
        EnqueueOutcome { granted, fence }
    }

    /// Releases one grant held in `mode` and returns the behaviours that the
    /// transition hands the cown to.
    pub(crate) fn release(&self, mode: Access) -> Grants {
        let mut queue = self.queue.lock();
        let state = &mut *queue;
        let mut grants = Grants::new();
        match mode {
            Access::Write => {
                debug_assert!(
                    matches!(state.active, Active::Writer),
                    "write release without an active writer"
                );
                promote_front(state, &mut grants);
            }
            Access::Read => {
                let Active::Readers(count) = &mut state.active else {
                    unreachable!("read release without an active read-group")
                };
                *count -= 1;
                if *count == 0 {
                    promote_front(state, &mut grants);
                }
            }
        }
        grants
    }
}

/// Hands the cown to the front of the waiting queue: a single writer, or the
/// whole run of consecutive reads (the next read-group).
fn promote_front(state: &mut QueueState, grants: &mut Grants) {
    match state.waiting.front().map(|waiter| waiter.mode) {
        None => {
            state.active = Active::Idle;
            state.last_tail = None;
        }
        Some(Access::Write) => {
            let waiter = state.waiting.pop_front().expect("front checked");
            state.active = Active::Writer;
            grants.push(waiter.behaviour);
        }
        Some(Access::Read) => {
            let mut admitted = 0;
            while state
                .waiting
                .front()
                .is_some_and(|waiter| waiter.mode.is_read())
            {
                let waiter = state.waiting.pop_front().expect("front checked");
                grants.push(waiter.behaviour);
                admitted += 1;
            }
            state.active = Active::Readers(admitted);
        }
    }
}
