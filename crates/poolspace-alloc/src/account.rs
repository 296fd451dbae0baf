//! Total/used/free bookkeeping for one pool.
//!
//! Not synchronized on its own: the allocator owns it behind its mutex, so
//! every method runs inside one critical section.

use crate::error::{Error, Result, Shortage};

#[derive(Debug, Clone, Default)]
pub struct SpaceAccount {
    total: u64,
    used: u64,
    /// Highest `used` ever seen.
    high_water: u64,
}

impl SpaceAccount {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            used: 0,
            high_water: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn free(&self) -> u64 {
        self.total - self.used
    }

    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    /// Change the capacity. Returns `true` when free space grew.
    ///
    /// Shrinking below the reserved bytes is refused and leaves the total as it was.
    pub fn set_total(&mut self, new_total: u64) -> Result<bool> {
        if new_total < self.used {
            return Err(Error::ResourceUnavailable {
                reason: Shortage::BelowUsed,
                requested: new_total,
                free: self.free(),
            });
        }
        let grew = new_total > self.total;
        self.total = new_total;
        Ok(grew)
    }

    /// Account for `bytes` more. Caller checked `bytes <= free()`.
    pub fn reserve(&mut self, bytes: u64) {
        debug_assert!(bytes <= self.free(), "reserve beyond free space");
        self.used += bytes;
        if self.used > self.high_water {
            self.high_water = self.used;
            #[cfg(feature = "tracing")]
            tracing::trace!(used = self.used, total = self.total, "new pool high-water mark");
        }
    }

    pub fn release(&mut self, bytes: u64) {
        debug_assert!(bytes <= self.used, "release more than used");
        self.used -= bytes;
    }
}
