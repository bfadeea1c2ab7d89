//! Behaviour records and the multi-cown acquisition protocol.
//!
//! A behaviour is one scheduled unit of work: a sorted list of cown requests
//! plus the closure to run once every request has been granted. Enqueuing is
//! lock-free across cowns in the sense that no lock ever spans two cowns;
//! atomicity of the multi-cown grant comes from the pending counter instead.
//!
//! # Protocol
//!
//! `schedule` initialises `pending = n + 1` (one slot per cown plus an
//! enqueue bias), then appends the behaviour to each cown's queue in
//! ascending cown-id order. Immediate grants decrement `pending`; so do
//! grants handed over later by releasing predecessors. The bias is
//! subtracted after the last append, so the behaviour cannot become runnable
//! while it is still appearing on queues. It becomes runnable exactly when
//! every cown has granted it, and is submitted to the dispatcher once.
//!
//! After appending to a cown, the enqueuing thread waits until the previous
//! queue tail has finished its *entire* enqueue phase before moving to the
//! next cown. Together with the canonical append order this embeds all
//! per-cown queue orders into one scheduling order, which is what makes the
//! waits-for relation acyclic: two behaviours always agree on who comes
//! first on every cown they share.

use crate::cown::queue::EnqueueFence;
use crate::cown::CownRef;
use crate::runtime::context::{self, Dispatch};
use crate::tracing_compat::{error, trace};
use crate::types::{Access, BehaviourId, CownId};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// The closure of a behaviour, boxed for storage in the record.
pub(crate) type Thunk = Box<dyn FnOnce() + Send>;

/// One slot of a behaviour: a cown and the mode it is requested in.
///
/// Produced by the [`CownSlot`](crate::CownSlot) implementations; user code
/// never constructs requests directly.
pub struct Request {
    cown: CownRef,
    mode: Access,
}

impl Request {
    pub(crate) fn new(cown: CownRef, mode: Access) -> Self {
        Self { cown, mode }
    }

    pub(crate) fn cown_id(&self) -> CownId {
        self.cown.header().id()
    }

    pub(crate) fn mode(&self) -> Access {
        self.mode
    }
}

impl core::fmt::Debug for Request {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Request({} {:?})", self.cown_id(), self.mode)
    }
}

/// A scheduled unit of work.
pub(crate) struct Behaviour {
    id: BehaviourId,
    /// Requests sorted by cown id; the append order during scheduling.
    requests: Vec<Request>,
    /// Cown slots not yet granted, plus the enqueue bias while scheduling.
    pending: AtomicUsize,
    /// Flips once the enqueue phase has touched every cown.
    enqueued: EnqueueFence,
    /// Taken exactly once, on dispatch.
    thunk: Mutex<Option<Thunk>>,
    dispatcher: Arc<dyn Dispatch>,
}

impl Behaviour {
    /// Constructs a behaviour for `requests` and enqueues it on every cown.
    ///
    /// Must run on a thread with an active runtime (a worker, or inside
    /// `run`/`run_systematic`).
    ///
    /// # Panics
    ///
    /// Panics if no runtime is active, or if one cown appears twice in
    /// `requests`.
    pub(crate) fn schedule(mut requests: Vec<Request>, thunk: Thunk) {
        let dispatcher = context::current();
        requests.sort_by_key(Request::cown_id);
        for pair in requests.windows(2) {
            assert_ne!(
                pair[0].cown_id(),
                pair[1].cown_id(),
                "cown {} requested twice by one behaviour",
                pair[0].cown_id()
            );
        }

        let id = dispatcher.register(&requests);
        let slots = requests.len();
        let behaviour = Arc::new(Self {
            id,
            requests,
            pending: AtomicUsize::new(slots + 1),
            enqueued: Arc::new(AtomicBool::new(false)),
            thunk: Mutex::new(Some(thunk)),
            dispatcher,
        });
        trace!(behaviour = %id, cowns = slots, "behaviour spawned");

        for request in &behaviour.requests {
            let outcome = request.cown.header().enqueue(&behaviour, request.mode);
            if outcome.granted {
                behaviour.resolve_one();
            }
            if let Some(fence) = outcome.fence {
                wait_until_enqueued(&fence);
            }
        }
        behaviour.enqueued.store(true, Ordering::Release);
        behaviour.resolve_one();
    }

    pub(crate) fn id(&self) -> BehaviourId {
        self.id
    }

    pub(crate) fn enqueue_fence(&self) -> EnqueueFence {
        Arc::clone(&self.enqueued)
    }

    /// Records one granted slot (or the removal of the enqueue bias) and
    /// submits the behaviour once nothing is pending.
    pub(crate) fn resolve_one(self: &Arc<Self>) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            trace!(behaviour = %self.id, "behaviour runnable");
            self.dispatcher.submit(Arc::clone(self));
        }
    }

    /// Executes the closure, then hands every cown to its successors.
    ///
    /// A panicking closure is fatal: the process aborts without releasing,
    /// so no successor can observe half-written payloads.
    pub(crate) fn run(self: Arc<Self>) {
        debug_assert_eq!(
            self.pending.load(Ordering::Acquire),
            0,
            "behaviour dispatched while slots were pending"
        );
        let thunk = self
            .thunk
            .lock()
            .take()
            .expect("behaviour dispatched twice");

        if panic::catch_unwind(AssertUnwindSafe(thunk)).is_err() {
            error!(behaviour = %self.id, "behaviour closure panicked; aborting without release");
            std::process::abort();
        }

        for request in &self.requests {
            for successor in request.cown.header().release(request.mode) {
                successor.resolve_one();
            }
        }
        trace!(behaviour = %self.id, "behaviour completed");
        self.dispatcher.retire(self.id);
    }
}

/// Spins (briefly) until a predecessor has finished its enqueue phase.
fn wait_until_enqueued(fence: &AtomicBool) {
    let mut spins = 0_u32;
    while !fence.load(Ordering::Acquire) {
        if spins < 64 {
            spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}
