//! Eviction listener contract.
//!
//! The allocator calls these when a request is about to block. Only the
//! callback shape is defined here; what gets evicted is the policy's business.

/// Error type a listener may report. It never reaches the allocating caller.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A collaborator asked to free pool space under allocation pressure.
///
/// Invoked synchronously on the thread that is about to block, without any
/// allocator lock held, so an implementation may call back into the same
/// allocator (`free`, `reallocate`). `shortfall` is the number of bytes the
/// pending request still lacks at the time of the call.
pub trait SpaceRequestListener: Send + Sync {
    fn space_needed(&self, shortfall: u64) -> Result<(), ListenerError>;

    /// Name used when logging listener failures.
    fn name(&self) -> &str {
        "listener"
    }
}

impl<F> SpaceRequestListener for F
where
    F: Fn(u64) -> Result<(), ListenerError> + Send + Sync,
{
    fn space_needed(&self, shortfall: u64) -> Result<(), ListenerError> {
        self(shortfall)
    }
}
