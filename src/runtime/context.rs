//! The dispatcher context.
//!
//! Behaviours are scheduled against whichever runtime is active on the
//! current thread: a worker of the parallel pool, or the thread driving a
//! systematic run. The active dispatcher is kept in a thread-local slot and
//! installed with an RAII guard, so nested installs restore their
//! predecessor on drop.

use crate::behaviour::{Behaviour, Request};
use crate::types::BehaviourId;
use std::cell::RefCell;
use std::sync::Arc;

/// The interface a behaviour needs from its runtime.
pub(crate) trait Dispatch: Send + Sync {
    /// Accounts for a newly constructed behaviour and assigns its id.
    fn register(&self, requests: &[Request]) -> BehaviourId;

    /// Hands a runnable behaviour to the scheduler. Called exactly once per
    /// behaviour, by whichever thread grants its last cown.
    fn submit(&self, behaviour: Arc<Behaviour>);

    /// Accounts for a completed behaviour. The runtime quiesces when every
    /// registered behaviour has retired.
    fn retire(&self, behaviour: BehaviourId);
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn Dispatch>>> = const { RefCell::new(None) };
}

/// Installs `dispatcher` as the current one; restored on guard drop.
pub(crate) fn set_current(dispatcher: Arc<dyn Dispatch>) -> ContextGuard {
    let previous = CURRENT.with(|slot| slot.borrow_mut().replace(dispatcher));
    ContextGuard { previous }
}

/// Returns the active dispatcher.
///
/// # Panics
///
/// Panics when no runtime is active on this thread: `when` and `schedule`
/// may only be called inside `run`, `run_systematic`, or a behaviour.
pub(crate) fn current() -> Arc<dyn Dispatch> {
    CURRENT
        .with(|slot| slot.borrow().clone())
        .expect("no active runtime: `when`/`schedule` must run inside `run` or `run_systematic`")
}

/// Returns true if a runtime is active on this thread.
pub(crate) fn is_active() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

/// Restores the previously active dispatcher on drop.
pub(crate) struct ContextGuard {
    previous: Option<Arc<dyn Dispatch>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A hand-cranked dispatcher for protocol unit tests: behaviours queue
    //! up and the test decides when each one runs.

    use super::{set_current, ContextGuard, Dispatch};
    use crate::behaviour::{Behaviour, Request};
    use crate::types::BehaviourId;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct ManualShared {
        runnable: Mutex<VecDeque<Arc<Behaviour>>>,
        live: AtomicUsize,
        next_id: AtomicU64,
    }

    impl Dispatch for ManualShared {
        fn register(&self, _requests: &[Request]) -> BehaviourId {
            self.live.fetch_add(1, Ordering::SeqCst);
            BehaviourId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn submit(&self, behaviour: Arc<Behaviour>) {
            self.runnable.lock().push_back(behaviour);
        }

        fn retire(&self, _behaviour: BehaviourId) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub(crate) struct ManualDispatch {
        shared: Arc<ManualShared>,
        _guard: ContextGuard,
    }

    impl ManualDispatch {
        pub(crate) fn install() -> Self {
            let shared = Arc::new(ManualShared::default());
            let guard = set_current(Arc::clone(&shared) as Arc<dyn Dispatch>);
            Self {
                shared,
                _guard: guard,
            }
        }

        pub(crate) fn runnable_count(&self) -> usize {
            self.shared.runnable.lock().len()
        }

        /// Runs the oldest runnable behaviour and returns its id.
        pub(crate) fn run_next(&self) -> BehaviourId {
            let behaviour = self
                .shared
                .runnable
                .lock()
                .pop_front()
                .expect("nothing runnable");
            let id = behaviour.id();
            behaviour.run();
            id
        }

        pub(crate) fn is_quiescent(&self) -> bool {
            self.shared.live.load(Ordering::SeqCst) == 0
        }
    }
}
