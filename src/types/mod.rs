//! Core types shared across the runtime.
//!
//! - [`CownId`], [`BehaviourId`]: type-safe identifiers for runtime entities
//! - [`Access`]: the mode in which a behaviour requests a cown

mod access;
mod id;

pub use access::Access;
pub use id::{BehaviourId, CownId};
