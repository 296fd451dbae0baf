#![forbid(unsafe_code)]
//! poolspace-alloc: fair, blocking admission of pool space.
//!
//! Writers reserve bytes here before they commit data to disk. Requests are
//! admitted strictly in arrival order; a request that does not fit asks the
//! registered eviction listeners for room and then waits until enough space
//! is released, its wait expires, or it is cancelled.
//!
//! Layering, leaves first: [`account`] keeps the totals, [`table`] the
//! per-entry reservations, [`notifier`] the eviction listeners, [`queue`] the
//! pending requests and the admission rule, [`allocator`] the public facade.

pub mod account;
pub mod allocator;
pub mod cancel;
pub mod error;
pub mod notifier;
pub mod queue;
pub mod stream;
pub mod table;
pub mod tracking;

pub use allocator::{FairQueueAllocator, WeakAllocator};
pub use cancel::CancelToken;
pub use error::{Error, Result, Shortage};
pub use queue::Wait;
pub use stream::{StatusProbe, StreamReservation, StreamStatus};
pub use tracking::AllocatorStats;
