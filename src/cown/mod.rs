//! Cowns: concurrent owners of mutable state.
//!
//! A cown wraps a value and serialises access to it. The value itself is
//! never reachable through a handle; behaviours scheduled with `when`
//! receive [`AcquiredCown`] (exclusive) or [`AcquiredRead`] (shared) views
//! for the duration of their execution.
//!
//! Handles come in two strengths. [`Cown`] is a strong handle: it keeps the
//! payload alive and is freely cloneable. [`WeakCown`] observes a cown
//! without keeping it alive; [`WeakCown::upgrade`] succeeds only while some
//! strong handle (or in-flight behaviour, which holds strong references
//! through its requests) still exists. This is what breaks strong cycles in
//! observer patterns: observers hold weak handles and promote per behaviour.

pub(crate) mod queue;

use crate::types::CownId;
use core::fmt;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use queue::CownHeader;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

type WriteGuard<T> = ArcRwLockWriteGuard<RawRwLock, T>;
type ReadGuard<T> = ArcRwLockReadGuard<RawRwLock, T>;

/// The cown record: type-independent header plus the typed payload cell.
///
/// The scheduler only ever touches the header; payload access goes through
/// the cell, whose lock is uncontended by construction (the queue protocol
/// admits either one writer or only readers).
pub(crate) struct CownInner<T> {
    header: CownHeader,
    cell: Arc<RwLock<T>>,
}

/// Type-erased access to a cown's header.
///
/// Behaviour requests hold cowns through this trait so that one behaviour
/// can span cowns of different payload types.
pub(crate) trait HeaderRef: Send + Sync {
    fn header(&self) -> &CownHeader;
}

impl<T: Send + Sync + 'static> HeaderRef for CownInner<T> {
    fn header(&self) -> &CownHeader {
        &self.header
    }
}

/// A shared, type-erased strong reference to a cown.
pub(crate) type CownRef = Arc<dyn HeaderRef>;

/// A strong handle to a cown of `T`.
///
/// Cloning is cheap (reference counted). The payload is dropped when the
/// last strong handle goes away and no behaviour references the cown any
/// more.
pub struct Cown<T> {
    inner: Arc<CownInner<T>>,
}

impl<T: Send + Sync + 'static> Cown<T> {
    /// Creates a fresh, idle cown owning `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CownInner {
                header: CownHeader::new(),
                cell: Arc::new(RwLock::new(value)),
            }),
        }
    }

    /// Tags this cown for shared access in an upcoming `when`.
    ///
    /// Purely a marker: the returned handle requests the cown in read mode,
    /// so consecutive readers may run concurrently.
    #[must_use]
    pub fn read(&self) -> ReadCown<T> {
        ReadCown {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Creates a weak handle that does not keep the cown alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakCown<T> {
        WeakCown {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns this cown's identity.
    #[must_use]
    pub fn id(&self) -> CownId {
        self.inner.header.id()
    }

    pub(crate) fn cown_ref(&self) -> CownRef {
        Arc::clone(&self.inner) as CownRef
    }

    /// Takes the exclusive view. Called only once the scheduler has granted
    /// this cown to the running behaviour, so the lock must be free.
    pub(crate) fn write_view(&self) -> AcquiredCown<T> {
        let guard = self
            .inner
            .cell
            .try_write_arc()
            .expect("exclusive view contended: cown granted while still held");
        AcquiredCown { guard }
    }
}

impl<T> Clone for Cown<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Cown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cown({})", self.inner.header.id())
    }
}

/// A strong handle tagged for shared (read) access.
///
/// Produced by [`Cown::read`]; otherwise behaves like a strong handle.
pub struct ReadCown<T> {
    inner: Arc<CownInner<T>>,
}

impl<T: Send + Sync + 'static> ReadCown<T> {
    /// Returns the underlying cown's identity.
    #[must_use]
    pub fn id(&self) -> CownId {
        self.inner.header.id()
    }

    pub(crate) fn cown_ref(&self) -> CownRef {
        Arc::clone(&self.inner) as CownRef
    }

    pub(crate) fn read_view(&self) -> AcquiredRead<T> {
        let guard = self
            .inner
            .cell
            .try_read_arc()
            .expect("shared view contended: cown granted while a writer holds it");
        AcquiredRead { guard }
    }
}

impl<T> Clone for ReadCown<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ReadCown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadCown({})", self.inner.header.id())
    }
}

/// A weak handle to a cown of `T`.
///
/// Does not keep the cown alive. After the last strong reference drops the
/// cown is a zombie: weak handles still exist but can no longer be promoted.
pub struct WeakCown<T> {
    inner: Weak<CownInner<T>>,
}

impl<T: Send + Sync + 'static> WeakCown<T> {
    /// Promotes to a strong handle if the cown is still live.
    #[must_use]
    pub fn upgrade(&self) -> Option<Cown<T>> {
        self.inner.upgrade().map(|inner| Cown { inner })
    }

    /// Returns true while the cown can still be promoted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakCown<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakCown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakCown")
    }
}

/// An exclusive view of a cown's payload.
///
/// Handed to a behaviour's closure for every cown it requested in write
/// mode. Dereferences mutably; intended to live only inside the closure.
/// Keeping a view beyond the behaviour blocks every successor on that cown
/// and trips the grant assertion.
pub struct AcquiredCown<T> {
    guard: WriteGuard<T>,
}

impl<T> Deref for AcquiredCown<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for AcquiredCown<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for AcquiredCown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AcquiredCown").field(&**self).finish()
    }
}

/// A shared view of a cown's payload.
///
/// Handed to a behaviour's closure for every cown it requested in read mode;
/// members of the same read-group hold these concurrently.
pub struct AcquiredRead<T> {
    guard: ReadGuard<T>,
}

impl<T> Deref for AcquiredRead<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for AcquiredRead<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AcquiredRead").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_read_back_what_they_wrote() {
        let cown = Cown::new(10_u64);
        {
            let mut view = cown.write_view();
            *view += 32;
        }
        let read = cown.read();
        assert_eq!(*read.read_view(), 42);
    }

    #[test]
    fn read_views_coexist() {
        let cown = Cown::new(String::from("shared"));
        let tag = cown.read();
        let a = tag.read_view();
        let b = tag.read_view();
        assert_eq!(*a, "shared");
        assert_eq!(*b, "shared");
    }

    #[test]
    #[should_panic(expected = "exclusive view contended")]
    fn write_view_asserts_on_contention() {
        let cown = Cown::new(0_u8);
        let _held = cown.read().read_view();
        let _ = cown.write_view();
    }

    #[test]
    fn weak_handles_do_not_keep_the_cown_alive() {
        let cown = Cown::new(5_i32);
        let weak = cown.downgrade();
        assert!(weak.is_live());
        assert_eq!(*weak.upgrade().expect("still live").write_view(), 5);

        drop(cown);
        assert!(!weak.is_live());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn clones_share_identity() {
        let cown = Cown::new(0_u32);
        let other = cown.clone();
        assert_eq!(cown.id(), other.id());
        assert_ne!(cown.id(), Cown::new(0_u32).id());
    }
}
