//! The systematic runtime: deterministic, seed-driven execution.
//!
//! One logical thread advances the program by repeatedly picking a runnable
//! behaviour at (seeded) random and running it to completion. Every
//! interleaving the parallel runtime could produce between behaviours is
//! reachable by some seed, so racy logic can be explored and any failing
//! schedule replayed exactly from its seed. Both runtimes honour the same
//! per-cown FIFO and happens-before contract.

mod config;
mod trace;

pub use config::SystematicConfig;
pub use trace::{TraceBuffer, TraceEvent};

use crate::behaviour::{Behaviour, Request};
use crate::runtime::context::{self, Dispatch};
use crate::tracing_compat::debug;
use crate::types::BehaviourId;
use crate::util::DetRng;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// The outcome of a systematic run.
#[derive(Debug, Clone)]
pub struct SystematicReport {
    /// Dispatch steps executed.
    pub steps: u64,
    /// True if the run reached quiescence, false if the step budget stopped
    /// it first.
    pub quiescent: bool,
    /// The recorded schedule.
    pub trace: TraceBuffer,
}

/// Dispatcher state shared with running behaviours.
struct SysShared {
    runnable: Mutex<Vec<Arc<Behaviour>>>,
    live: AtomicUsize,
    next_behaviour: AtomicU64,
    trace: Mutex<TraceBuffer>,
}

impl Dispatch for SysShared {
    fn register(&self, requests: &[Request]) -> BehaviourId {
        self.live.fetch_add(1, Ordering::SeqCst);
        let id = BehaviourId::new(self.next_behaviour.fetch_add(1, Ordering::Relaxed));
        self.trace.lock().push(TraceEvent::Spawned {
            behaviour: id,
            requests: requests
                .iter()
                .map(|request| (request.cown_id(), request.mode()))
                .collect(),
        });
        id
    }

    fn submit(&self, behaviour: Arc<Behaviour>) {
        self.trace.lock().push(TraceEvent::Runnable {
            behaviour: behaviour.id(),
        });
        self.runnable.lock().push(behaviour);
    }

    fn retire(&self, behaviour: BehaviourId) {
        self.trace.lock().push(TraceEvent::Completed { behaviour });
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The deterministic behaviour runtime.
pub struct SystematicRuntime {
    config: SystematicConfig,
    shared: Arc<SysShared>,
    rng: DetRng,
    steps: u64,
}

impl SystematicRuntime {
    /// Creates a systematic runtime from `config`.
    #[must_use]
    pub fn new(config: SystematicConfig) -> Self {
        let shared = Arc::new(SysShared {
            runnable: Mutex::new(Vec::new()),
            live: AtomicUsize::new(0),
            next_behaviour: AtomicU64::new(1),
            trace: Mutex::new(TraceBuffer::new(config.trace_capacity)),
        });
        let rng = config.rng();
        Self {
            config,
            shared,
            rng,
            steps: 0,
        }
    }

    /// Creates a systematic runtime with default budgets and `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::new(SystematicConfig::new(seed))
    }

    /// Dispatch steps executed so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs `entry` as the root behaviour under the seeded schedule and
    /// returns the report once quiescent (or once the step budget is spent).
    ///
    /// # Panics
    ///
    /// Panics on a reentrant call, or if the scheduler ever stalls — a
    /// non-empty set of pending behaviours with nothing runnable, which a
    /// correct program cannot produce.
    pub fn run<F>(&mut self, entry: F) -> SystematicReport
    where
        F: FnOnce() + Send + 'static,
    {
        assert!(
            !context::is_active(),
            "reentrant run_systematic(): a runtime is already active on this thread"
        );
        let _guard = context::set_current(Arc::clone(&self.shared) as Arc<dyn Dispatch>);
        debug!(seed = self.config.seed, "systematic run starting");
        crate::when::schedule(entry);

        let start_steps = self.steps;
        let mut quiescent = true;
        loop {
            if let Some(max) = self.config.max_steps {
                if self.steps >= max {
                    quiescent = false;
                    break;
                }
            }
            let Some(behaviour) = self.pick_next() else {
                break;
            };
            self.steps += 1;
            self.shared.trace.lock().push(TraceEvent::Dispatched {
                behaviour: behaviour.id(),
                step: self.steps,
            });
            behaviour.run();
        }

        let live = self.shared.live.load(Ordering::SeqCst);
        if quiescent {
            assert_eq!(
                live, 0,
                "systematic scheduler stalled: {live} behaviour(s) pending with nothing runnable"
            );
        }
        debug!(steps = self.steps, quiescent, "systematic run finished");

        let trace = std::mem::replace(
            &mut *self.shared.trace.lock(),
            TraceBuffer::new(self.config.trace_capacity),
        );
        SystematicReport {
            steps: self.steps - start_steps,
            quiescent: live == 0,
            trace,
        }
    }

    /// Picks the next behaviour to dispatch, at seeded random.
    fn pick_next(&mut self) -> Option<Arc<Behaviour>> {
        let mut runnable = self.shared.runnable.lock();
        if runnable.is_empty() {
            return None;
        }
        let index = self.rng.next_usize(runnable.len());
        Some(runnable.swap_remove(index))
    }
}

impl core::fmt::Debug for SystematicRuntime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SystematicRuntime")
            .field("seed", &self.config.seed)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

/// Runs `entry` deterministically under `seed` and returns the report.
///
/// Equivalent to [`SystematicRuntime::with_seed`] followed by
/// [`SystematicRuntime::run`].
pub fn run_systematic<F>(seed: u64, entry: F) -> SystematicReport
where
    F: FnOnce() + Send + 'static,
{
    SystematicRuntime::with_seed(seed).run(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cown::Cown;
    use crate::when::{schedule, when};
    use std::sync::Mutex as StdMutex;

    #[test]
    fn quiesces_on_an_empty_entry() {
        let report = run_systematic(1, || {});
        assert!(report.quiescent);
        assert_eq!(report.steps, 1, "only the root behaviour ran");
    }

    #[test]
    fn step_budget_stops_infinite_spawns() {
        fn respawn() {
            schedule(respawn);
        }
        let mut runtime = SystematicRuntime::new(SystematicConfig::new(3).max_steps(50));
        let report = runtime.run(respawn);
        assert!(!report.quiescent);
        assert_eq!(report.steps, 50);
    }

    #[test]
    fn same_seed_gives_the_same_dispatch_order() {
        fn racy_entry(log: Arc<StdMutex<Vec<u64>>>) -> impl FnOnce() + Send + 'static {
            move || {
                let cell = Cown::new(0_u64);
                for i in 0..8 {
                    let log = Arc::clone(&log);
                    let cell = cell.clone();
                    schedule(move || {
                        when(cell).run(move |mut value| {
                            *value += 1;
                            log.lock().expect("log lock").push(i);
                        });
                    });
                }
            }
        }

        let log_a = Arc::new(StdMutex::new(Vec::new()));
        let log_b = Arc::new(StdMutex::new(Vec::new()));
        let a = run_systematic(0xBEEF, racy_entry(Arc::clone(&log_a)));
        let b = run_systematic(0xBEEF, racy_entry(Arc::clone(&log_b)));

        assert_eq!(a.trace.dispatch_order(), b.trace.dispatch_order());
        assert_eq!(
            *log_a.lock().expect("log lock"),
            *log_b.lock().expect("log lock")
        );
    }
}
