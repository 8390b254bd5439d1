//! Standard rate limit response headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::ratelimit::Decision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Build `X-RateLimit-*` headers for a decision, plus `Retry-After` when it
/// was a rejection.
///
/// `X-RateLimit-Reset` is the absolute end of the window as an RFC 3339 UTC
/// timestamp.
pub fn rate_limit_headers(decision: &Decision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));

    if let Some(reset) = reset_timestamp(decision.window_reset_at) {
        if let Ok(value) = HeaderValue::from_str(&reset) {
            headers.insert(X_RATELIMIT_RESET, value);
        }
    }

    if let Some(retry_after) = decision.retry_after_secs.filter(|_| !decision.admitted) {
        headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
    }

    headers
}

fn reset_timestamp(millis: u64) -> Option<String> {
    let millis = i64::try_from(millis).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
}
