//! Bocage: behaviour-oriented concurrency for Rust.
//!
//! # Overview
//!
//! Mutable state is partitioned into *cowns* (concurrent owners); work is
//! expressed as *behaviours*, each naming the cowns it needs and a closure
//! to run once all of them are available. The runtime delivers behaviours
//! data-race free and deadlock free, preserves a happens-before order built
//! from per-cown FIFO queues and spawn edges, and runs non-overlapping
//! behaviours in parallel.
//!
//! ```ignore
//! use bocage::{run, when, Cown};
//!
//! struct Account { balance: i64 }
//!
//! run(4, || {
//!     let src = Cown::new(Account { balance: 100 });
//!     let dst = Cown::new(Account { balance: 0 });
//!     when((src, dst)).run(|(mut src, mut dst)| {
//!         src.balance -= 50;
//!         dst.balance += 50;
//!     });
//! });
//! ```
//!
//! # Core Guarantees
//!
//! - **Exclusive writes, shared reads**: one writer at a time per cown, or
//!   any number of concurrent readers (a *read-group*)
//! - **Multi-cown atomicity**: a behaviour holds all of its cowns at once;
//!   no partial holds, so user code cannot deadlock through `when`
//! - **Happens-before**: per-cown FIFO plus spawner order; what you observe
//!   is consistent with some sequential interleaving of behaviours
//! - **Quiescence**: [`run`] returns exactly when every behaviour spawned
//!   (transitively) by the entry closure has completed
//! - **Deterministic testing**: [`run_systematic`] replays the whole
//!   schedule from a seed and records a trace
//!
//! # Module Structure
//!
//! - [`types`]: identifiers and access modes
//! - `cown`: handles, payload cells, per-cown queues (exported at the root)
//! - `behaviour`: behaviour records and the acquisition protocol
//! - `when`: the `when`/`schedule` combinators (exported at the root)
//! - [`runtime`]: the parallel work-stealing pool
//! - [`systematic`]: the deterministic runtime and its trace
//! - [`util`]: internal utilities (deterministic RNG)
//! - [`tracing_compat`]: feature-gated structured logging

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

mod behaviour;
mod channel;
mod cown;
mod promise;
pub mod runtime;
pub mod systematic;
pub mod tracing_compat;
pub mod types;
pub mod util;
mod when;

pub use behaviour::Request;
pub use channel::Channel;
pub use cown::{AcquiredCown, AcquiredRead, Cown, ReadCown, WeakCown};
pub use promise::Promise;
pub use runtime::{run, ConfigError, Runtime, RuntimeConfig};
pub use systematic::{
    run_systematic, SystematicConfig, SystematicReport, SystematicRuntime, TraceBuffer, TraceEvent,
};
pub use types::{Access, BehaviourId, CownId};
pub use when::{schedule, when, CownSet, CownSlot, When};
