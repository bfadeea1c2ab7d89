//! The parallel runtime: a pool of work-stealing workers.
//!
//! [`Runtime::run`] boots an entry closure as the root behaviour, spins up
//! the configured workers and blocks until quiescence: every spawned
//! behaviour has completed and nothing is queued anywhere. The pool and its
//! quiescence counter live for one `run`; running again builds a fresh
//! pool.

pub(crate) mod context;
mod config;
mod global_queue;
mod local_queue;
mod stealing;
mod worker;

pub use config::{ConfigError, RuntimeConfig};

use crate::behaviour::{Behaviour, Request};
use crate::tracing_compat::debug;
use crate::types::BehaviourId;
use context::Dispatch;
use global_queue::GlobalQueue;
use local_queue::LocalQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use worker::{Parker, Worker};

/// Shared state of one `run`: the injection queue, parking, and the
/// quiescence counter.
pub(crate) struct Pool {
    global: GlobalQueue<Arc<Behaviour>>,
    /// Behaviours registered but not yet retired.
    live: AtomicUsize,
    next_behaviour: AtomicU64,
    shutdown: AtomicBool,
    parkers: Vec<Parker>,
    next_unpark: AtomicUsize,
}

impl Pool {
    fn new(workers: usize) -> Self {
        Self {
            global: GlobalQueue::new(),
            live: AtomicUsize::new(0),
            next_behaviour: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
            parkers: (0..workers).map(|_| Parker::new()).collect(),
            next_unpark: AtomicUsize::new(0),
        }
    }

    /// A key identifying this pool, for the worker-local fast path.
    pub(crate) fn key(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }

    pub(crate) fn parker(&self, worker: usize) -> Parker {
        self.parkers[worker].clone()
    }

    pub(crate) fn global_pop(&self) -> Option<Arc<Behaviour>> {
        self.global.pop()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn unpark_one(&self) {
        let index = self.next_unpark.fetch_add(1, Ordering::Relaxed) % self.parkers.len();
        self.parkers[index].unpark();
    }

    fn unpark_all(&self) {
        for parker in &self.parkers {
            parker.unpark();
        }
    }
}

impl Dispatch for Pool {
    fn register(&self, _requests: &[Request]) -> BehaviourId {
        self.live.fetch_add(1, Ordering::SeqCst);
        BehaviourId::new(self.next_behaviour.fetch_add(1, Ordering::Relaxed))
    }

    fn submit(&self, behaviour: Arc<Behaviour>) {
        let key = self as *const Self as usize;
        if let Err(behaviour) = worker::try_push_local(key, behaviour) {
            self.global.push(behaviour);
        }
        self.unpark_one();
    }

    fn retire(&self, _behaviour: BehaviourId) {
        if self.live.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("pool quiescent, shutting down");
            self.shutdown.store(true, Ordering::Release);
            self.unpark_all();
        }
    }
}

/// The parallel behaviour runtime.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
}

impl Runtime {
    /// Validates `config` and builds a runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Runs `entry` as the root behaviour and blocks until quiescence.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a running behaviour (reentrant runs
    /// are not supported) or if a worker thread cannot be spawned.
    pub fn run<F>(&self, entry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        assert!(
            !context::is_active(),
            "reentrant run(): a runtime is already active on this thread"
        );

        let workers = self.config.workers;
        let pool = Arc::new(Pool::new(workers));
        let locals: Vec<LocalQueue<Arc<Behaviour>>> =
            (0..workers).map(|_| LocalQueue::new()).collect();
        debug!(workers, "runtime starting");

        {
            // Boot the root behaviour through the ordinary scheduling path;
            // it lands in the global queue for the first worker to claim.
            let _guard = context::set_current(Arc::clone(&pool) as Arc<dyn Dispatch>);
            crate::when::schedule(entry);
        }

        let handles: Vec<_> = locals
            .iter()
            .enumerate()
            .map(|(id, local)| {
                let stealers = locals
                    .iter()
                    .enumerate()
                    .filter(|(peer, _)| *peer != id)
                    .map(|(_, peer)| peer.stealer())
                    .collect();
                let worker = Worker::new(id, local.clone(), stealers, Arc::clone(&pool));
                thread::Builder::new()
                    .name(format!("{}{id}", self.config.thread_name_prefix))
                    .spawn(move || worker.run_loop())
                    .expect("failed to spawn worker thread")
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread panicked");
        }
        debug_assert!(pool.global.is_empty(), "quiescent pool with queued work");
        debug!("runtime finished");
    }
}

/// Runs `entry` on a fresh pool of `workers` threads, blocking until every
/// behaviour it (transitively) spawned has completed.
///
/// # Panics
///
/// Panics if `workers` is zero or when called inside a running behaviour.
pub fn run<F>(workers: usize, entry: F)
where
    F: FnOnce() + Send + 'static,
{
    Runtime::new(RuntimeConfig::new().workers(workers))
        .expect("invalid worker count")
        .run(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cown::Cown;
    use crate::when::{schedule, when};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn runs_the_entry_to_quiescence() {
        let hits = Arc::new(AtomicUsize::new(0));
        let entry_hits = Arc::clone(&hits);
        run(2, move || {
            entry_hits.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn waits_for_transitively_spawned_behaviours() {
        let sum = Arc::new(AtomicUsize::new(0));
        let entry_sum = Arc::clone(&sum);
        run(4, move || {
            for _ in 0..64 {
                let inner = Arc::clone(&entry_sum);
                schedule(move || {
                    inner.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        assert_eq!(sum.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn cown_state_survives_across_behaviours() {
        let out = Arc::new(Mutex::new(0_u64));
        let entry_out = Arc::clone(&out);
        run(2, move || {
            let counter = Cown::new(0_u64);
            for _ in 0..100 {
                when(counter.clone()).run(|mut value| *value += 1);
            }
            let report = counter.clone();
            when(report).run(move |value| *entry_out.lock().expect("out lock") = *value);
        });
        assert_eq!(*out.lock().expect("out lock"), 100);
    }

    #[test]
    fn a_second_run_is_supported() {
        for _ in 0..2 {
            let hits = Arc::new(AtomicUsize::new(0));
            let entry_hits = Arc::clone(&hits);
            run(1, move || {
                entry_hits.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        assert!(Runtime::new(RuntimeConfig::new().workers(0)).is_err());
    }
}
