//! Fixed-window counter state and its transition function.

use super::decision::Decision;
use super::policy::RateLimitPolicy;

/// Per-key counter for the current fixed window.
///
/// `count` only ever grows within a window; a new window replaces the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// Events admitted in the current window (always at least 1)
    pub count: u32,
    /// When this window ends, in milliseconds since the Unix epoch
    pub window_reset_at: u64,
}

impl CounterEntry {
    /// Open a new window at `now` with one admitted event.
    pub fn open(policy: &RateLimitPolicy, now: u64) -> Self {
        Self {
            count: 1,
            window_reset_at: now.saturating_add(policy.window_millis()),
        }
    }

    /// Whether this entry still describes the window containing `now`.
    ///
    /// Dead entries are equivalent to absent ones.
    pub fn is_live(&self, now: u64) -> bool {
        now < self.window_reset_at
    }

    /// Apply one admission attempt at `now` to an optional existing entry.
    ///
    /// Returns the entry to store and the decision. On rejection the returned
    /// entry is the existing one, untouched.
    pub fn admit(
        existing: Option<CounterEntry>,
        policy: &RateLimitPolicy,
        now: u64,
    ) -> (CounterEntry, Decision) {
        let limit = policy.limit();

        match existing {
            Some(entry) if entry.is_live(now) => {
                if entry.count >= limit {
                    (entry, Decision::rejected(limit, entry.window_reset_at, now))
                } else {
                    let next = CounterEntry {
                        count: entry.count + 1,
                        ..entry
                    };
                    let decision =
                        Decision::admitted(limit, limit - next.count, next.window_reset_at);
                    (next, decision)
                }
            }
            _ => {
                let fresh = CounterEntry::open(policy, now);
                let decision = Decision::admitted(limit, limit - 1, fresh.window_reset_at);
                (fresh, decision)
            }
        }
    }
}
