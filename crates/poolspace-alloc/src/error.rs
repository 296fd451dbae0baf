use std::fmt;

use thiserror::Error;

/// Result type local to poolspace-alloc.
pub type Result<T> = std::result::Result<T, Error>;

/// Why space could not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortage {
    /// A non-blocking request found no room (or an earlier request queued).
    Immediate,
    /// The request waited for its whole timeout.
    Timeout,
    /// The pool cannot shrink below what is already reserved.
    BelowUsed,
    /// `reallocate` growth does not fit into the free space.
    Growth,
}

impl fmt::Display for Shortage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Shortage::Immediate => "no space available",
            Shortage::Timeout => "timed out waiting for space",
            Shortage::BelowUsed => "capacity below used space",
            Shortage::Growth => "not enough free space to grow",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown entry: {0}")]
    UnknownEntry(String),

    #[error("{reason}: requested {requested} bytes, {free} free")]
    ResourceUnavailable {
        reason: Shortage,
        requested: u64,
        free: u64,
    },

    #[error("allocation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn unknown<K: fmt::Debug>(entry: &K) -> Self {
        Error::UnknownEntry(format!("{:?}", entry))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::ResourceUnavailable { .. })
    }
}
