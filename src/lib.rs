#![forbid(unsafe_code)]
//! poolspace: fair, blocking space admission for storage pools.
//!
//! Umbrella crate. The allocator lives in [`alloc`], shared types in [`core`].

pub use poolspace_alloc as alloc;
pub use poolspace_core as core;

pub use poolspace_alloc::{
    CancelToken, Error, FairQueueAllocator, Result, StreamReservation, Wait, WeakAllocator,
};
pub use poolspace_core::config::PoolConfig;
