//! Write-once promises built on a cown.
//!
//! A [`Promise`] pairs an optional value with a queue of waiting callbacks,
//! all inside one cown. `then` and `fulfill` are behaviours on that cown, so
//! callbacks never race the value and run exactly once each.

use crate::cown::Cown;
use crate::when::when;

type Waiter<T> = Box<dyn FnOnce(&T) + Send + Sync>;

struct PromiseState<T> {
    value: Option<T>,
    waiters: Vec<Waiter<T>>,
}

/// A clonable write-once cell; readers subscribe with [`Promise::then`].
pub struct Promise<T> {
    state: Cown<PromiseState<T>>,
}

impl<T: Send + Sync + 'static> Promise<T> {
    /// Creates an unfulfilled promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Cown::new(PromiseState {
                value: None,
                waiters: Vec::new(),
            }),
        }
    }

    /// Runs `callback` with the value: immediately (in a fresh behaviour) if
    /// the promise is already fulfilled, otherwise once it is.
    pub fn then<F>(&self, callback: F)
    where
        F: FnOnce(&T) + Send + Sync + 'static,
    {
        when(self.state.clone()).run(move |mut state| {
            if let Some(value) = &state.value {
                callback(value);
            } else {
                state.waiters.push(Box::new(callback));
            }
        });
    }

    /// Fulfils the promise and drains the waiters. The first fulfilment
    /// wins; later ones are ignored.
    pub fn fulfill(&self, value: T) {
        when(self.state.clone()).run(move |mut state| {
            if state.value.is_some() {
                return;
            }
            state.value = Some(value);
            let waiters = std::mem::take(&mut state.waiters);
            let value = state.value.as_ref().expect("value just set");
            for waiter in waiters {
                waiter(value);
            }
        });
    }
}

impl<T: Send + Sync + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> core::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Promise({:?})", self.state)
    }
}
