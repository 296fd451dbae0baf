//! Space reservation for one incoming write stream.
//!
//! A receiver calls [`StreamReservation::preallocate`] with the end offset of
//! the data it is about to write. The reservation grows in steps of at least
//! `min_increment` bytes, so a stream arriving in small packets does not hit
//! the allocator lock for every packet. On commit, [`trim`] gives back the
//! slack; dropping the handle frees the whole reservation.
//!
//! [`trim`]: StreamReservation::trim

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::allocator::FairQueueAllocator;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::queue::Wait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    /// Blocked in the allocator for this many bytes.
    WaitingForSpace(u64),
}

/// Read-only view of a stream's status, usable from other threads.
#[derive(Debug, Clone)]
pub struct StatusProbe(Arc<AtomicU64>);

impl StatusProbe {
    pub fn get(&self) -> StreamStatus {
        match self.0.load(Ordering::Acquire) {
            0 => StreamStatus::Idle,
            n => StreamStatus::WaitingForSpace(n),
        }
    }
}

pub struct StreamReservation<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    allocator: FairQueueAllocator<K>,
    entry: K,
    min_increment: u64,
    wait: Wait,
    cancel: Option<CancelToken>,
    reserved: u64,
    written: u64,
    waiting_for: Arc<AtomicU64>,
}

impl<K> StreamReservation<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(allocator: FairQueueAllocator<K>, entry: K, min_increment: u64, wait: Wait) -> Self {
        Self {
            allocator,
            entry,
            min_increment,
            wait,
            cancel: None,
            reserved: 0,
            written: 0,
            waiting_for: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Abort blocked preallocations when `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bytes reserved in the pool for this stream.
    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    /// Highest offset passed to `preallocate`.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn status(&self) -> StreamStatus {
        self.probe().get()
    }

    pub fn probe(&self) -> StatusProbe {
        StatusProbe(Arc::clone(&self.waiting_for))
    }

    /// Make sure the pool holds room for data up to `position`.
    pub fn preallocate(&mut self, position: u64) -> Result<()> {
        if position > self.reserved {
            let additional = (position - self.reserved).max(self.min_increment);
            self.waiting_for.store(additional, Ordering::Release);
            let result = match &self.cancel {
                Some(token) => {
                    self.allocator
                        .allocate_cancellable(&self.entry, additional, self.wait, token)
                }
                None => self.allocator.allocate(&self.entry, additional, self.wait),
            };
            self.waiting_for.store(0, Ordering::Release);
            result?;
            self.reserved += additional;
        }
        self.written = self.written.max(position);
        Ok(())
    }

    /// Shrink the reservation to the bytes actually written.
    pub fn trim(&mut self) -> Result<()> {
        if self.reserved > self.written {
            self.allocator.reallocate(&self.entry, self.written)?;
            self.reserved = self.written;
        }
        Ok(())
    }

    /// Trim and hand the reservation over to whoever now owns the data.
    /// The entry stays allocated in the pool; returns its size.
    pub fn commit(mut self) -> Result<u64> {
        self.trim()?;
        Ok(std::mem::take(&mut self.reserved))
    }

    /// Free the reservation now instead of on drop.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.reserved == 0 {
            return Ok(());
        }
        self.reserved = 0;
        self.allocator.free(&self.entry)
    }
}

impl<K> Drop for StreamReservation<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn drop(&mut self) {
        if let Err(_e) = self.release_inner() {
            #[cfg(feature = "tracing")]
            tracing::warn!(entry = ?self.entry, error = %_e, "failed to free stream reservation");
        }
    }
}
