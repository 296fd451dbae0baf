//! Ordered registry of eviction listeners.
//!
//! The registry has its own lock so that listeners can be snapshotted and then
//! invoked with no lock held at all. A listener may therefore call back into
//! the allocator that is notifying it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use poolspace_core::listener::SpaceRequestListener;

#[derive(Default)]
pub struct EvictionNotifier {
    listeners: RwLock<Vec<Arc<dyn SpaceRequestListener>>>,
}

impl EvictionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn SpaceRequestListener>) {
        self.listeners.write().push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Ask every listener, in registration order, to free space.
    ///
    /// `shortfall` is consulted before each call: it yields the bytes still
    /// missing, or `None` once the request no longer needs help, which stops
    /// the iteration. Errors and panics from a listener are logged and
    /// skipped. Returns how many listeners were called.
    pub fn notify<F>(&self, mut shortfall: F) -> usize
    where
        F: FnMut() -> Option<u64>,
    {
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        let mut called = 0;
        for listener in listeners {
            let Some(missing) = shortfall() else {
                break;
            };
            called += 1;
            match catch_unwind(AssertUnwindSafe(|| listener.space_needed(missing))) {
                Ok(Ok(())) => {}
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(listener = listener.name(), shortfall = missing, error = %_e, "space request listener failed");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(listener = listener.name(), shortfall = missing, "space request listener panicked");
                }
            }
        }
        called
    }
}
