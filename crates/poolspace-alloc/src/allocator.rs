//! The public allocator.
//!
//! One mutex guards the reservation table and the wait queue; one condition
//! variable wakes blocked requests. `allocate` is the only call that can block.
//! Everything else finishes in a single pass under the lock and, when it frees
//! space, grants as many head requests as now fit before returning.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use poolspace_core::config::PoolConfig;
use poolspace_core::listener::SpaceRequestListener;

use crate::cancel::{CancelToken, Wake};
use crate::error::{Error, Result, Shortage};
use crate::notifier::EvictionNotifier;
use crate::queue::{Wait, WaitQueue};
use crate::table::AllocationTable;
use crate::tracking::AllocatorStats;

struct State<K> {
    table: AllocationTable<K>,
    queue: WaitQueue<K>,
}

impl<K> State<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn admit_head(&mut self) -> usize {
        let State { table, queue } = self;
        queue.admit_head(table)
    }
}

struct Shared<K> {
    state: Mutex<State<K>>,
    cond: Condvar,
    notifier: EvictionNotifier,
}

impl<K> Shared<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Grant what fits at the head of the queue and wake the waiters if
    /// anything was granted.
    fn reevaluate(&self, state: &mut State<K>) {
        if state.admit_head() > 0 {
            self.cond.notify_all();
        }
    }
}

impl<K: Send> Wake for Shared<K> {
    fn wake(&self) {
        // Taking the lock orders the wake-up after any waiter's flag check.
        let _state = self.state.lock();
        self.cond.notify_all();
    }
}

/// Fair, blocking space allocator keyed by entry `K`.
///
/// Cloning yields another handle to the same pool.
pub struct FairQueueAllocator<K> {
    shared: Arc<Shared<K>>,
}

impl<K> Clone for FairQueueAllocator<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Non-owning handle, for listeners that need to call back into the
/// allocator that notifies them without keeping it alive.
pub struct WeakAllocator<K> {
    shared: Weak<Shared<K>>,
}

impl<K> Clone for WeakAllocator<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<K> WeakAllocator<K> {
    pub fn upgrade(&self) -> Option<FairQueueAllocator<K>> {
        self.shared
            .upgrade()
            .map(|shared| FairQueueAllocator { shared })
    }
}

impl<K> FairQueueAllocator<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(total_bytes: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    table: AllocationTable::new(total_bytes),
                    queue: WaitQueue::new(),
                }),
                cond: Condvar::new(),
                notifier: EvictionNotifier::new(),
            }),
        }
    }

    pub fn from_config(cfg: &PoolConfig) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(config = %cfg.describe(), "creating pool allocator");
        Self::new(cfg.total_bytes)
    }

    pub fn downgrade(&self) -> WeakAllocator<K> {
        WeakAllocator {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Reserve `bytes` more for `entry`, blocking according to `wait`.
    ///
    /// Reservations on the same entry add up. Zero bytes always succeeds.
    pub fn allocate(&self, entry: &K, bytes: u64, wait: Wait) -> Result<()> {
        self.allocate_inner(entry, bytes, wait, None)
    }

    /// Like [`allocate`](Self::allocate), but gives up with
    /// [`Error::Cancelled`] once `token` is cancelled.
    pub fn allocate_cancellable(
        &self,
        entry: &K,
        bytes: u64,
        wait: Wait,
        token: &CancelToken,
    ) -> Result<()> {
        self.allocate_inner(entry, bytes, wait, Some(token))
    }

    fn allocate_inner(
        &self,
        entry: &K,
        bytes: u64,
        wait: Wait,
        token: Option<&CancelToken>,
    ) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        let wait = match wait {
            Wait::For(d) if d.is_zero() => Wait::Immediate,
            w => w,
        };
        if let Some(token) = token {
            if wait != Wait::Immediate {
                let shared: Arc<dyn Wake> = self.shared.clone();
                token.register(Arc::downgrade(&shared));
            }
        }

        let start = Instant::now();
        let seq = {
            let mut state = self.shared.state.lock();
            let seq = state.queue.arrive();

            if state.queue.admissible(&state.table, bytes) {
                state.table.increase(entry, bytes);
                #[cfg(feature = "tracing")]
                tracing::trace!(?entry, bytes, seq, "granted on arrival");
                return Ok(());
            }
            if wait == Wait::Immediate {
                return Err(Error::ResourceUnavailable {
                    reason: Shortage::Immediate,
                    requested: bytes,
                    free: state.table.free(),
                });
            }
            if token.is_some_and(CancelToken::is_cancelled) {
                return Err(Error::Cancelled);
            }

            state.queue.push(seq, entry.clone(), bytes);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                ?entry,
                bytes,
                seq,
                free = state.table.free(),
                waiting = state.queue.len(),
                "request queued"
            );
            seq
        };

        // Listeners run without the lock so they can free space reentrantly.
        // A request held back only by earlier arrivals has nothing to ask for.
        self.shared.notifier.notify(|| {
            let state = self.shared.state.lock();
            state
                .queue
                .shortfall(&state.table, seq)
                .filter(|&missing| missing > 0)
        });

        let deadline = wait.deadline(start);
        let mut state = self.shared.state.lock();
        loop {
            if state.queue.take_grant(seq) {
                return Ok(());
            }
            if token.is_some_and(CancelToken::is_cancelled) {
                state.queue.withdraw(seq);
                self.shared.reevaluate(&mut state);
                #[cfg(feature = "tracing")]
                tracing::debug!(?entry, bytes, seq, "queued request cancelled");
                return Err(Error::Cancelled);
            }
            match deadline {
                None => self.shared.cond.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        state.queue.withdraw(seq);
                        self.shared.reevaluate(&mut state);
                        #[cfg(feature = "tracing")]
                        tracing::debug!(?entry, bytes, seq, waited = ?start.elapsed(), "queued request timed out");
                        return Err(Error::ResourceUnavailable {
                            reason: Shortage::Timeout,
                            requested: bytes,
                            free: state.table.free(),
                        });
                    }
                    let _ = self.shared.cond.wait_until(&mut state, deadline);
                }
            }
        }
    }

    /// Release the whole reservation of `entry`.
    pub fn free(&self, entry: &K) -> Result<()> {
        let mut state = self.shared.state.lock();
        let _released = state.table.remove(entry)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(?entry, bytes = _released, "freed");
        self.shared.reevaluate(&mut state);
        Ok(())
    }

    /// Set the reservation of `entry` to exactly `new_size` bytes.
    ///
    /// Never blocks: growth that does not fit fails with no effect. Shrinking
    /// always succeeds; shrinking to zero drops the entry.
    pub fn reallocate(&self, entry: &K, new_size: u64) -> Result<()> {
        let mut state = self.shared.state.lock();
        let released = state.table.set_absolute(entry, new_size)?;
        if released > 0 {
            self.shared.reevaluate(&mut state);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(?entry, new_size, released, "reallocated");
        Ok(())
    }

    /// Resize the pool. Shrinking below the reserved bytes fails and keeps
    /// the old total; growing may admit queued requests.
    pub fn set_total_space(&self, total_bytes: u64) -> Result<()> {
        let mut state = self.shared.state.lock();
        let grew = state.table.account_mut().set_total(total_bytes)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(total_bytes, grew, "pool capacity changed");
        if grew {
            self.shared.reevaluate(&mut state);
        }
        Ok(())
    }

    pub fn total_space(&self) -> u64 {
        self.shared.state.lock().table.account().total()
    }

    pub fn free_space(&self) -> u64 {
        self.shared.state.lock().table.free()
    }

    pub fn used_space(&self) -> u64 {
        self.shared.state.lock().table.account().used()
    }

    /// Bytes currently reserved for `entry`.
    pub fn used_space_of(&self, entry: &K) -> Result<u64> {
        self.shared.state.lock().table.used(entry)
    }

    /// Snapshot of every live reservation.
    pub fn allocations(&self) -> HashMap<K, u64> {
        self.shared.state.lock().table.snapshot()
    }

    /// Number of requests currently blocked.
    pub fn waiting(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn add_space_request_listener(&self, listener: Arc<dyn SpaceRequestListener>) {
        self.shared.notifier.add_listener(listener);
    }

    pub fn stats(&self) -> AllocatorStats {
        let state = self.shared.state.lock();
        let account = state.table.account();
        AllocatorStats {
            total_bytes: account.total(),
            used_bytes: account.used(),
            free_bytes: account.free(),
            entries: state.table.len(),
            waiting: state.queue.len(),
            listeners: self.shared.notifier.len(),
            peak_used_bytes: account.high_water(),
        }
    }
}
