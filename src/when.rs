//! The `when` combinator: schedule a behaviour over a set of cowns.
//!
//! ```ignore
//! when((src.clone(), dst.clone())).run(|(mut src, mut dst)| {
//!     if src.balance >= 50 {
//!         src.balance -= 50;
//!         dst.balance += 50;
//!     }
//! });
//! ```
//!
//! The cown set is a single handle, a tuple of handles (mixed write and
//! read), or a `Vec` of same-typed handles. The closure receives the
//! matching shape of acquired views and runs once every cown is granted.
//! `when` never blocks the caller: it appends the behaviour to the cown
//! queues and returns.

use crate::behaviour::{Behaviour, Request};
use crate::cown::{AcquiredCown, AcquiredRead, Cown, ReadCown};
use crate::types::Access;

/// One element of a cown set: a strong handle (write mode) or a read-tagged
/// handle (read mode).
pub trait CownSlot: Send + 'static {
    /// The view this slot contributes to the closure.
    type View;

    /// The request this slot adds to the behaviour record.
    fn request(&self) -> Request;

    /// Takes the view. Runtime-internal: called on the executing worker
    /// after every requested cown has been granted.
    fn acquire(&self) -> Self::View;
}

impl<T: Send + Sync + 'static> CownSlot for Cown<T> {
    type View = AcquiredCown<T>;

    fn request(&self) -> Request {
        Request::new(self.cown_ref(), Access::Write)
    }

    fn acquire(&self) -> AcquiredCown<T> {
        self.write_view()
    }
}

impl<T: Send + Sync + 'static> CownSlot for ReadCown<T> {
    type View = AcquiredRead<T>;

    fn request(&self) -> Request {
        Request::new(self.cown_ref(), Access::Read)
    }

    fn acquire(&self) -> AcquiredRead<T> {
        self.read_view()
    }
}

/// A full cown set for one `when`: a slot, a tuple of slots, or a `Vec` of
/// same-typed slots.
pub trait CownSet: Send + 'static {
    /// The views handed to the closure, shaped like the set.
    type Views;

    /// Appends this set's requests to the behaviour record.
    fn append_requests(&self, requests: &mut Vec<Request>);

    /// Takes all views. Runtime-internal.
    fn acquire_all(&self) -> Self::Views;
}

impl<T: Send + Sync + 'static> CownSet for Cown<T> {
    type Views = AcquiredCown<T>;

    fn append_requests(&self, requests: &mut Vec<Request>) {
        requests.push(self.request());
    }

    fn acquire_all(&self) -> AcquiredCown<T> {
        self.acquire()
    }
}

impl<T: Send + Sync + 'static> CownSet for ReadCown<T> {
    type Views = AcquiredRead<T>;

    fn append_requests(&self, requests: &mut Vec<Request>) {
        requests.push(self.request());
    }

    fn acquire_all(&self) -> AcquiredRead<T> {
        self.acquire()
    }
}

impl<C: CownSlot> CownSet for Vec<C> {
    type Views = Vec<C::View>;

    fn append_requests(&self, requests: &mut Vec<Request>) {
        for slot in self {
            requests.push(slot.request());
        }
    }

    fn acquire_all(&self) -> Vec<C::View> {
        self.iter().map(CownSlot::acquire).collect()
    }
}

macro_rules! tuple_cown_set {
    ($( ($($name:ident $idx:tt),+) )+) => {$(
        impl<$($name: CownSlot),+> CownSet for ($($name,)+) {
            type Views = ($($name::View,)+);

            fn append_requests(&self, requests: &mut Vec<Request>) {
                $(requests.push(self.$idx.request());)+
            }

            fn acquire_all(&self) -> Self::Views {
                ($(self.$idx.acquire(),)+)
            }
        }
    )+};
}

tuple_cown_set! {
    (A 0)
    (A 0, B 1)
    (A 0, B 1, C 2)
    (A 0, B 1, C 2, D 3)
    (A 0, B 1, C 2, D 3, E 4)
    (A 0, B 1, C 2, D 3, E 4, F 5)
    (A 0, B 1, C 2, D 3, E 4, F 5, G 6)
    (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7)
}

/// A pending `when`: holds the cown set until a closure is attached.
#[must_use = "a `when` does nothing until `.run()` is called"]
pub struct When<S> {
    cowns: S,
}

/// Starts a behaviour over `cowns`.
///
/// Pass strong handles for exclusive access and [`Cown::read`] tags for
/// shared access. The behaviour is scheduled by [`When::run`].
pub fn when<S: CownSet>(cowns: S) -> When<S> {
    When { cowns }
}

impl<S: CownSet> When<S> {
    /// Schedules `body` to run once every cown in the set is granted.
    ///
    /// # Panics
    ///
    /// Panics if no runtime is active on this thread, or if the set names
    /// the same cown twice.
    pub fn run<F>(self, body: F)
    where
        F: FnOnce(S::Views) + Send + 'static,
    {
        let cowns = self.cowns;
        let mut requests = Vec::new();
        cowns.append_requests(&mut requests);
        Behaviour::schedule(requests, Box::new(move || body(cowns.acquire_all())));
    }
}

/// Schedules a behaviour over no cowns: plain asynchronous work.
///
/// This is also how a program's root work is expressed; `run` and
/// `run_systematic` boot their entry closure through it.
///
/// # Panics
///
/// Panics if no runtime is active on this thread.
pub fn schedule<F>(body: F)
where
    F: FnOnce() + Send + 'static,
{
    Behaviour::schedule(Vec::new(), Box::new(body));
}
