//! The outcome of an admission check.

use serde::Serialize;

/// Result of [`RateLimiter::check`](super::RateLimiter::check).
///
/// Carries enough state for callers to build `X-RateLimit-*` and
/// `Retry-After` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the event was admitted
    pub admitted: bool,
    /// The policy limit the decision was made against
    pub limit: u32,
    /// Events still admissible in the current window
    pub remaining: u32,
    /// When the current window ends, in milliseconds since the Unix epoch
    pub window_reset_at: u64,
    /// Seconds until the caller may retry; present only on rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl Decision {
    pub(crate) fn admitted(limit: u32, remaining: u32, window_reset_at: u64) -> Self {
        Self {
            admitted: true,
            limit,
            remaining,
            window_reset_at,
            retry_after_secs: None,
        }
    }

    pub(crate) fn rejected(limit: u32, window_reset_at: u64, now: u64) -> Self {
        let wait_millis = window_reset_at.saturating_sub(now);
        Self {
            admitted: false,
            limit,
            remaining: 0,
            window_reset_at,
            retry_after_secs: Some(wait_millis.div_ceil(1000)),
        }
    }

    /// Convenience inverse of `admitted`.
    pub fn is_rejected(&self) -> bool {
        !self.admitted
    }
}
