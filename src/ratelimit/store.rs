//! Counter storage.
//!
//! The limiter only needs one primitive from its store: an atomic
//! read-modify-write of a single key. Everything else is housekeeping.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::counter::CounterEntry;
use super::key::CounterKey;

/// Backing store for fixed-window counters.
pub trait CounterStore: Send + Sync {
    /// Atomically replace the entry for `key` with the entry returned by `f`.
    ///
    /// `f` sees the current entry (dead or alive) or `None`. No other update
    /// of the same key may interleave with the call.
    fn update<T, F>(&self, key: &CounterKey, f: F) -> T
    where
        F: FnOnce(Option<CounterEntry>) -> (CounterEntry, T);

    /// Read the stored entry for `key`, dead or alive.
    fn get(&self, key: &CounterKey) -> Option<CounterEntry>;

    /// Drop every entry whose window ended at or before `now`.
    ///
    /// Returns the number of entries removed.
    fn purge_expired(&self, now: u64) -> usize;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    fn clear(&self);
}

/// Process-local store backed by a sharded concurrent map.
///
/// Updates hold the shard write lock for the duration of the closure, so
/// updates to one key are serialized while keys on other shards proceed
/// in parallel.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    entries: DashMap<CounterKey, CounterEntry>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn update<T, F>(&self, key: &CounterKey, f: F) -> T
    where
        F: FnOnce(Option<CounterEntry>) -> (CounterEntry, T),
    {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let (next, out) = f(Some(*occupied.get()));
                *occupied.get_mut() = next;
                out
            }
            Entry::Vacant(vacant) => {
                let (next, out) = f(None);
                vacant.insert(next);
                out
            }
        }
    }

    fn get(&self, key: &CounterKey) -> Option<CounterEntry> {
        self.entries.get(key).map(|entry| *entry)
    }

    fn purge_expired(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        // Concurrent inserts can make `len` grow during the sweep.
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
