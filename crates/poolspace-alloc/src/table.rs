//! Per-entry reservation ledger on top of [`SpaceAccount`].
//!
//! Every live record holds more than zero bytes, and the sum of all records
//! always equals `account.used()`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::account::SpaceAccount;
use crate::error::{Error, Result, Shortage};

#[derive(Debug)]
pub struct AllocationTable<K> {
    account: SpaceAccount,
    records: HashMap<K, u64>,
}

impl<K> AllocationTable<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(total: u64) -> Self {
        Self {
            account: SpaceAccount::new(total),
            records: HashMap::new(),
        }
    }

    pub fn account(&self) -> &SpaceAccount {
        &self.account
    }

    pub fn account_mut(&mut self) -> &mut SpaceAccount {
        &mut self.account
    }

    pub fn free(&self) -> u64 {
        self.account.free()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add `delta` bytes to `entry`, creating the record if needed.
    /// The caller has already checked `delta <= free()`.
    pub fn increase(&mut self, entry: &K, delta: u64) {
        if delta == 0 {
            return;
        }
        self.account.reserve(delta);
        *self.records.entry(entry.clone()).or_insert(0) += delta;
    }

    /// Set the reservation of an existing entry to exactly `new_size`.
    ///
    /// Growth must fit into the free space and never waits. Shrinking always
    /// succeeds; shrinking to zero drops the record. Returns the number of
    /// bytes released.
    pub fn set_absolute(&mut self, entry: &K, new_size: u64) -> Result<u64> {
        let current = *self
            .records
            .get(entry)
            .ok_or_else(|| Error::unknown(entry))?;

        if new_size > current {
            let delta = new_size - current;
            if delta > self.account.free() {
                return Err(Error::ResourceUnavailable {
                    reason: Shortage::Growth,
                    requested: delta,
                    free: self.account.free(),
                });
            }
            self.account.reserve(delta);
            self.records.insert(entry.clone(), new_size);
            return Ok(0);
        }

        let released = current - new_size;
        self.account.release(released);
        if new_size == 0 {
            self.records.remove(entry);
        } else {
            self.records.insert(entry.clone(), new_size);
        }
        Ok(released)
    }

    /// Drop the whole reservation of `entry`. Returns the bytes released.
    pub fn remove(&mut self, entry: &K) -> Result<u64> {
        let bytes = self
            .records
            .remove(entry)
            .ok_or_else(|| Error::unknown(entry))?;
        self.account.release(bytes);
        Ok(bytes)
    }

    pub fn used(&self, entry: &K) -> Result<u64> {
        self.records
            .get(entry)
            .copied()
            .ok_or_else(|| Error::unknown(entry))
    }

    /// Point-in-time copy of all reservations.
    pub fn snapshot(&self) -> HashMap<K, u64> {
        self.records.clone()
    }
}
