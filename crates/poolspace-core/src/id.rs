//! Strongly-typed identifiers for allocation entries.
//!
//! The allocator is generic over its entry key; these are the keys the CLI
//! and the write path use when they have nothing more specific.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key of one write stream in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(u64);

impl StreamId {
    pub const fn new(raw: u64) -> Self {
        StreamId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Hands out process-unique stream ids.
#[derive(Debug, Default)]
pub struct StreamIdGen {
    next: AtomicU64,
}

impl StreamIdGen {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> StreamId {
        StreamId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_display() {
        let gen = StreamIdGen::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "stream-0");
        assert_eq!(b.raw(), 1);
        assert_eq!(serde_json::to_string(&b).unwrap(), "1");
    }
}
