//! Worker threads.
//!
//! Each worker owns a local queue and loops: local pop, then the global
//! queue, then stealing from peers, then a timed park. A worker thread
//! also advertises its local queue in a thread-local slot so that grants
//! resolved while it executes a behaviour land locally instead of in the
//! global queue.

use crate::behaviour::Behaviour;
use crate::runtime::context::{self, Dispatch};
use crate::runtime::local_queue::{LocalQueue, Stealer};
use crate::runtime::{stealing, Pool};
use crate::tracing_compat::trace;
use crate::util::DetRng;
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

/// How long an idle worker sleeps before re-checking the queues.
const PARK_INTERVAL: Duration = Duration::from_millis(1);

thread_local! {
    /// The local queue of the worker running on this thread, keyed by its
    /// pool so grants for a different pool never land here.
    static ACTIVE_LOCAL: RefCell<Option<(usize, LocalQueue<Arc<Behaviour>>)>> =
        const { RefCell::new(None) };
}

/// Pushes to the current worker's local queue if it belongs to `pool_key`;
/// otherwise hands the behaviour back.
pub(crate) fn try_push_local(
    pool_key: usize,
    behaviour: Arc<Behaviour>,
) -> Result<(), Arc<Behaviour>> {
    ACTIVE_LOCAL.with(|slot| match &*slot.borrow() {
        Some((key, local)) if *key == pool_key => {
            local.push(behaviour);
            Ok(())
        }
        _ => Err(behaviour),
    })
}

struct LocalGuard;

impl LocalGuard {
    fn install(pool_key: usize, local: LocalQueue<Arc<Behaviour>>) -> Self {
        ACTIVE_LOCAL.with(|slot| *slot.borrow_mut() = Some((pool_key, local)));
        Self
    }
}

impl Drop for LocalGuard {
    fn drop(&mut self) {
        ACTIVE_LOCAL.with(|slot| *slot.borrow_mut() = None);
    }
}

/// One worker of the parallel pool.
pub(crate) struct Worker {
    id: usize,
    local: LocalQueue<Arc<Behaviour>>,
    /// Stealers for the peers' queues (own queue excluded).
    stealers: Vec<Stealer<Arc<Behaviour>>>,
    pool: Arc<Pool>,
    parker: Parker,
    rng: DetRng,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        local: LocalQueue<Arc<Behaviour>>,
        stealers: Vec<Stealer<Arc<Behaviour>>>,
        pool: Arc<Pool>,
    ) -> Self {
        let parker = pool.parker(id);
        Self {
            id,
            local,
            stealers,
            pool,
            parker,
            rng: DetRng::new(id as u64 + 1),
        }
    }

    /// The scheduling loop; returns once the pool has quiesced.
    pub(crate) fn run_loop(mut self) {
        let _context = context::set_current(Arc::clone(&self.pool) as Arc<dyn Dispatch>);
        let _local = LocalGuard::install(self.pool.key(), self.local.clone());
        trace!(worker = self.id, "worker started");

        while !self.pool.is_shutdown() {
            if let Some(behaviour) = self.local.pop() {
                behaviour.run();
                continue;
            }
            if let Some(behaviour) = self.pool.global_pop() {
                behaviour.run();
                continue;
            }
            if let Some(behaviour) = stealing::steal(&self.stealers, &mut self.rng) {
                behaviour.run();
                continue;
            }
            self.parker.park_timeout(PARK_INTERVAL);
        }

        debug_assert!(
            self.local.is_empty(),
            "worker {} shut down with queued work",
            self.id
        );
        trace!(worker = self.id, "worker stopped");
    }
}

/// Parks and unparks one worker.
///
/// Carries a permit so an unpark delivered before the park is not lost.
#[derive(Clone)]
pub(crate) struct Parker {
    inner: Arc<ParkerInner>,
}

struct ParkerInner {
    permit: Mutex<bool>,
    condvar: Condvar,
}

impl Parker {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(ParkerInner {
                permit: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Sleeps until unparked or the timeout elapses, consuming any permit.
    pub(crate) fn park_timeout(&self, timeout: Duration) {
        let mut permit = self.inner.permit.lock();
        if !*permit {
            self.inner.condvar.wait_for(&mut permit, timeout);
        }
        *permit = false;
    }

    /// Wakes the parked worker, or primes the next park to return at once.
    pub(crate) fn unpark(&self) {
        let mut permit = self.inner.permit.lock();
        *permit = true;
        drop(permit);
        self.inner.condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn unpark_before_park_is_not_lost() {
        let parker = Parker::new();
        parker.unpark();

        let start = Instant::now();
        parker.park_timeout(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn park_wakes_on_unpark() {
        let parker = Parker::new();
        let remote = parker.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.unpark();
        });

        parker.park_timeout(Duration::from_secs(5));
        handle.join().expect("unparker join");
    }
}
