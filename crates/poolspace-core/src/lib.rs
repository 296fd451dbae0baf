#![forbid(unsafe_code)]
//! poolspace-core: shared vocabulary for the pool space allocator.
//!
//! Only plain data and traits live here: the error type, configuration, byte
//! units, identifiers and the eviction listener contract. The allocator itself
//! is in `poolspace-alloc`.

pub mod config;
pub mod error;
pub mod id;
pub mod listener;
pub mod prelude;
pub mod size;

pub use error::{Error, Result};
