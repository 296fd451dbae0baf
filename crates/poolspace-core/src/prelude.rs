//! Convenient re-exports for downstream crates.

pub use crate::config::PoolConfig;
pub use crate::error::{Error, Result};
pub use crate::id::StreamId;
pub use crate::listener::{ListenerError, SpaceRequestListener};
pub use crate::size::{format_size, parse_size, ByteUnit};
