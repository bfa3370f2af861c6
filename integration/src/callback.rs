//! A typed multi-subscriber callback registry.
//!
//! spec.md §9 ("Callback sets everywhere"): strategies, subscribers and
//! clients all expose `add_*_callback` hooks returning a registration handle.
//! Rather than scatter `Vec<Box<dyn Fn(..)>>` through every component, every
//! one of those hooks is backed by this single [`CallbackRegistry`].

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Opaque handle returned by [`CallbackRegistry::register`]; pass back to
/// [`CallbackRegistry::remove`] to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

/// A set of subscribers to a single event kind, invoked in registration order.
///
/// `Event` is typically `Clone` since every subscriber sees the same value;
/// callers needing cheap fan-out should use `Arc<T>` as `Event`.
pub struct CallbackRegistry<Event> {
    next_id: AtomicU64,
    subscribers: Vec<(CallbackHandle, Arc<dyn Fn(&Event) + Send + Sync>)>,
}

impl<Event> std::fmt::Debug for CallbackRegistry<Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl<Event> Default for CallbackRegistry<Event> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: Vec::new(),
        }
    }
}

impl<Event> CallbackRegistry<Event> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new callback, returning a handle that can later be passed
    /// to [`Self::remove`].
    pub fn register<F>(&mut self, callback: F) -> CallbackHandle
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let handle = CallbackHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.push((handle, Arc::new(callback)));
        handle
    }

    pub fn remove(&mut self, handle: CallbackHandle) {
        self.subscribers.retain(|(h, _)| *h != handle);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Invokes every registered subscriber with `event`, in registration order.
    ///
    /// Per spec.md §4.2/§7, a panic inside one callback must not take down
    /// the loop calling `fire`; callers run this from a context where a panic
    /// would already be caught at the task boundary, so `fire` itself simply
    /// calls through — isolation is the caller's job via `tokio::spawn` or
    /// `std::panic::catch_unwind` at the outer edge.
    pub fn fire(&self, event: &Event) {
        for (_, callback) in &self.subscribers {
            callback(event);
        }
    }
}
