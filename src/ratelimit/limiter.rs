//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::clock::Clock;
use super::counter::CounterEntry;
use super::decision::Decision;
use super::key::CounterKey;
use super::policy::RateLimitPolicy;
use super::schedule::{PeriodicTask, Scheduler, TaskHandle};
use super::store::{CounterStore, InMemoryCounterStore};

/// Fixed-window admission controller.
///
/// This struct is thread-safe and can be shared across multiple tasks. Each
/// check is a single atomic read-modify-write on one key of the store.
pub struct RateLimiter<S: CounterStore = InMemoryCounterStore> {
    /// Counters indexed by scope and identifier
    store: Arc<S>,
    /// Source of "now" for every window computation
    clock: Arc<dyn Clock>,
    /// The running periodic sweep, if any
    sweeper: Mutex<Option<Box<dyn TaskHandle>>>,
}

impl RateLimiter<InMemoryCounterStore> {
    /// Create a rate limiter with an in-memory store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_store(clock, Arc::new(InMemoryCounterStore::new()))
    }
}

impl<S: CounterStore + 'static> RateLimiter<S> {
    /// Create a rate limiter over an existing store.
    pub fn with_store(clock: Arc<dyn Clock>, store: Arc<S>) -> Self {
        Self {
            store,
            clock,
            sweeper: Mutex::new(None),
        }
    }

    /// Decide whether to admit one event for `identifier` under `policy`.
    ///
    /// The identifier is an opaque key; empty or malformed values are
    /// counted like any other.
    pub fn check(&self, identifier: &str, policy: &RateLimitPolicy) -> Decision {
        let key = CounterKey::new(policy, identifier);
        let now = self.clock.now_millis();

        let decision = self.store.update(&key, |existing| {
            if !existing.is_some_and(|entry| entry.is_live(now)) {
                debug!(
                    key = %key,
                    limit = policy.limit(),
                    window_secs = policy.window_seconds(),
                    "Opening rate limit window"
                );
            }
            CounterEntry::admit(existing, policy, now)
        });

        trace!(
            key = %key,
            admitted = decision.admitted,
            remaining = decision.remaining,
            "Checked rate limit"
        );

        if decision.is_rejected() {
            debug!(
                key = %key,
                retry_after_secs = ?decision.retry_after_secs,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// The live counter for `identifier` under `policy`, without counting an event.
    pub fn peek(&self, identifier: &str, policy: &RateLimitPolicy) -> Option<CounterEntry> {
        let key = CounterKey::new(policy, identifier);
        let now = self.clock.now_millis();
        self.store.get(&key).filter(|entry| entry.is_live(now))
    }

    /// Remove counters whose window has ended. Returns how many were removed.
    ///
    /// Only reclaims memory; decisions are the same whether or not it runs.
    pub fn sweep(&self) -> usize {
        sweep_store(self.store.as_ref(), self.clock.as_ref())
    }

    /// Run [`sweep`](Self::sweep) every `interval` on `scheduler`.
    ///
    /// Replaces any sweep started earlier.
    pub fn start_sweeper(&self, scheduler: &dyn Scheduler, interval: Duration) {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let task: PeriodicTask = Arc::new(move || {
            sweep_store(store.as_ref(), clock.as_ref());
        });

        let handle = scheduler.schedule_every(interval, task);
        if let Some(previous) = self.sweeper.lock().replace(handle) {
            previous.cancel();
        }

        info!(interval_secs = interval.as_secs(), "Counter sweeper started");
    }

    /// Stop the periodic sweep. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.cancel();
            info!("Counter sweeper stopped");
        }
    }

    /// Whether a periodic sweep is installed.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    /// Number of stored counters, including expired ones not yet swept.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl<S: CounterStore> Drop for RateLimiter<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.cancel();
        }
    }
}

fn sweep_store<S: CounterStore>(store: &S, clock: &dyn Clock) -> usize {
    let removed = store.purge_expired(clock.now_millis());
    if removed > 0 {
        debug!(removed, remaining = store.len(), "Swept expired rate limit counters");
    }
    removed
}

impl<S: CounterStore> std::fmt::Debug for RateLimiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_keys", &self.store.len())
            .field("clock", &self.clock)
            .finish()
    }
}
