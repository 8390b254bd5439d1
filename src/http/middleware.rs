//! Admission control as axum middleware.
//!
//! ```ignore
//! let guard = PolicyGuard::new(limiter, RateLimitPolicy::ai_generation());
//! let app = Router::new()
//!     .route("/api/generate", post(generate))
//!     .route_layer(axum::middleware::from_fn_with_state(guard, enforce::<InMemoryCounterStore>));
//! ```
//!
//! A limiter over another [`CounterStore`] names that store instead.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use super::headers::rate_limit_headers;
use super::identity::client_identifier;
use crate::ratelimit::{CounterStore, InMemoryCounterStore, RateLimitPolicy, RateLimiter};

/// Middleware state: which limiter and policy guard the wrapped routes.
pub struct PolicyGuard<S: CounterStore = InMemoryCounterStore> {
    limiter: Arc<RateLimiter<S>>,
    policy: RateLimitPolicy,
}

impl<S: CounterStore> PolicyGuard<S> {
    /// Guard routes with `policy`, counting in `limiter`.
    pub fn new(limiter: Arc<RateLimiter<S>>, policy: RateLimitPolicy) -> Self {
        Self { limiter, policy }
    }
}

// Manual impl: cloning the guard clones the `Arc`, not the store.
impl<S: CounterStore> Clone for PolicyGuard<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            policy: self.policy.clone(),
        }
    }
}

impl<S: CounterStore> std::fmt::Debug for PolicyGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyGuard")
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Admit or reject a request before it reaches the inner handler.
///
/// Rejected requests get a 429 and never reach `next`. Admitted requests
/// carry the `X-RateLimit-*` headers on the inner handler's response.
pub async fn enforce<S: CounterStore + 'static>(
    State(guard): State<PolicyGuard<S>>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(request.headers());
    let decision = guard.limiter.check(&identifier, &guard.policy);
    let headers = rate_limit_headers(&decision);

    if decision.is_rejected() {
        warn!(
            scope = guard.policy.scope(),
            identifier = %identifier,
            path = %request.uri().path(),
            "Rejected request over rate limit"
        );
        let body = json!({
            "error": "rate_limited",
            "scope": guard.policy.scope(),
            "retry_after": decision.retry_after_secs,
        });
        return (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response();
    }

    let mut response = next.run(request).await;
    response.headers_mut().extend(headers);
    response
}
