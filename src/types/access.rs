//! Access modes for cown requests.

use serde::{Deserialize, Serialize};

/// The mode in which a behaviour requests a cown.
///
/// `Read` requests that arrive consecutively on a cown form a read-group and
/// execute concurrently; a `Write` request always has the cown to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    /// Shared access: an immutable view, possibly held by several behaviours.
    Read,
    /// Exclusive access: a mutable view, held by exactly one behaviour.
    Write,
}

impl Access {
    /// Returns true for shared access.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }

    /// Returns true for exclusive access.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}
