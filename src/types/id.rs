//! Identifier types for runtime entities.
//!
//! Cown identifiers are allocated from a process-wide counter and double as
//! the canonical acquisition order: every behaviour enqueues on its cowns in
//! ascending [`CownId`] order. Behaviour identifiers are allocated per
//! runtime, so a deterministic run reproduces the same ids.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_COWN_ID: AtomicU64 = AtomicU64::new(1);

/// A unique identifier for a cown.
///
/// Ids are strictly increasing in creation order and never reused; the total
/// order over ids is the canonical acquisition order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CownId(u64);

impl CownId {
    /// Allocates a fresh id from the process-wide counter.
    pub(crate) fn fresh() -> Self {
        Self(NEXT_COWN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CownId({})", self.0)
    }
}

impl fmt::Display for CownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A unique identifier for a behaviour within one runtime.
///
/// Allocated sequentially by the runtime that registered the behaviour;
/// ids from different runtimes are unrelated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BehaviourId(u64);

impl BehaviourId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BehaviourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BehaviourId({})", self.0)
    }
}

impl fmt::Display for BehaviourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cown_ids_are_strictly_increasing() {
        let a = CownId::fresh();
        let b = CownId::fresh();
        let c = CownId::fresh();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(BehaviourId::new(7).to_string(), "B7");
    }
}
