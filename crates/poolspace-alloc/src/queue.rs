//! Pending requests and the admission rule.
//!
//! A request is admissible only when nothing that arrived before it is still
//! pending and the free space covers it. Grants are always taken from the head
//! of the queue, so a small late request can never overtake a large early one.
//!
//! Grants are applied by whoever releases space: the releasing thread reserves
//! the bytes for the head request, records the grant and wakes the waiters.
//! The waiter only has to collect it. This makes several partial releases add
//! up for one large head request.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::table::AllocationTable;

/// How long `allocate` may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Fail at once if the request is not admissible.
    Immediate,
    /// Block for at most this long. A zero duration never blocks.
    For(Duration),
    /// Block until granted or cancelled.
    Forever,
}

impl Wait {
    /// Classic millisecond encoding: `0` immediate, negative forever.
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            0 => Wait::Immediate,
            ms if ms < 0 => Wait::Forever,
            ms => Wait::For(Duration::from_millis(ms as u64)),
        }
    }

    /// Absolute deadline for a request that starts waiting at `start`.
    /// `None` means no deadline.
    pub(crate) fn deadline(self, start: Instant) -> Option<Instant> {
        match self {
            Wait::Immediate => Some(start),
            // Durations too large for `Instant` behave like `Forever`.
            Wait::For(d) => start.checked_add(d),
            Wait::Forever => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pending<K> {
    pub seq: u64,
    pub entry: K,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct WaitQueue<K> {
    next_seq: u64,
    pending: VecDeque<Pending<K>>,
    /// Sequence numbers granted by a releaser but not yet collected.
    granted: HashSet<u64>,
}

impl<K> Default for WaitQueue<K> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            pending: VecDeque::new(),
            granted: HashSet::new(),
        }
    }
}

impl<K> WaitQueue<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next arrival sequence number.
    pub fn arrive(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// A fresh arrival is admissible only behind an empty queue.
    pub fn admissible(&self, table: &AllocationTable<K>, bytes: u64) -> bool {
        self.pending.is_empty() && table.free() >= bytes
    }

    pub fn push(&mut self, seq: u64, entry: K, bytes: u64) {
        debug_assert!(self.pending.back().map_or(true, |p| p.seq < seq));
        self.pending.push_back(Pending { seq, entry, bytes });
    }

    /// Bytes the pending request `seq` is still missing, or `None` if it is
    /// no longer pending (granted or withdrawn).
    pub fn shortfall(&self, table: &AllocationTable<K>, seq: u64) -> Option<u64> {
        self.pending
            .iter()
            .find(|p| p.seq == seq)
            .map(|p| p.bytes.saturating_sub(table.free()))
    }

    /// Collect a grant made on behalf of `seq`.
    pub fn take_grant(&mut self, seq: u64) -> bool {
        self.granted.remove(&seq)
    }

    /// Withdraw a request that timed out or was cancelled. Returns `true` if
    /// it was still pending; it may already have been granted instead.
    pub fn withdraw(&mut self, seq: u64) -> bool {
        match self.pending.iter().position(|p| p.seq == seq) {
            Some(i) => {
                self.pending.remove(i);
                true
            }
            None => false,
        }
    }

    /// Grant head requests while they fit, applying each to `table`.
    /// Returns how many were granted.
    pub fn admit_head(&mut self, table: &mut AllocationTable<K>) -> usize {
        let mut admitted = 0;
        while let Some(head) = self.pending.front() {
            if head.bytes > table.free() {
                break;
            }
            let Some(head) = self.pending.pop_front() else {
                break;
            };
            table.increase(&head.entry, head.bytes);
            self.granted.insert(head.seq);
            admitted += 1;
            #[cfg(feature = "tracing")]
            tracing::trace!(entry = ?head.entry, bytes = head.bytes, seq = head.seq, "granted queued request");
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_from_millis_follows_the_classic_encoding() {
        assert_eq!(Wait::from_millis(0), Wait::Immediate);
        assert_eq!(Wait::from_millis(-1), Wait::Forever);
        assert_eq!(
            Wait::from_millis(250),
            Wait::For(Duration::from_millis(250))
        );
    }

    #[test]
    fn fresh_arrivals_queue_behind_pending_requests() {
        let mut table = AllocationTable::new(100);
        let mut q = WaitQueue::new();
        let s0 = q.arrive();
        q.push(s0, "big", 200);
        assert!(!q.admissible(&table, 1));
        assert!(q.withdraw(s0));
        assert!(q.admissible(&table, 1));
        assert_eq!(q.admit_head(&mut table), 0);
    }

    #[test]
    fn admit_head_never_skips_a_large_head() {
        let mut table = AllocationTable::new(100);
        table.increase(&"held", 100);
        let mut q = WaitQueue::new();
        let big = q.arrive();
        q.push(big, "big", 80);
        let small = q.arrive();
        q.push(small, "small", 10);

        table.set_absolute(&"held", 50).unwrap();
        assert_eq!(q.admit_head(&mut table), 0);
        assert_eq!(q.shortfall(&table, big), Some(30));

        table.set_absolute(&"held", 10).unwrap();
        assert_eq!(q.admit_head(&mut table), 2);
        assert!(q.take_grant(big));
        assert!(q.take_grant(small));
        assert!(!q.take_grant(small));
        assert_eq!(table.used(&"big").unwrap(), 80);
        assert_eq!(table.free(), 0);
        assert_eq!(q.shortfall(&table, big), None);
    }
}
