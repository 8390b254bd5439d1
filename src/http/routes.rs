//! HTTP routes of the admission sidecar.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::headers::rate_limit_headers;
use super::identity::client_identifier;
use super::middleware::{enforce, PolicyGuard};
use crate::ratelimit::{
    CounterStore, InMemoryCounterStore, PolicyCatalog, RateLimitPolicy, RateLimiter,
};

/// Shared state for all routes.
pub struct AppState<S: CounterStore = InMemoryCounterStore> {
    pub limiter: Arc<RateLimiter<S>>,
    pub catalog: Arc<PolicyCatalog>,
}

impl<S: CounterStore> AppState<S> {
    pub fn new(limiter: Arc<RateLimiter<S>>, catalog: PolicyCatalog) -> Self {
        Self {
            limiter,
            catalog: Arc::new(catalog),
        }
    }
}

impl<S: CounterStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<S: CounterStore> std::fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("limiter", &self.limiter)
            .field("catalog", &self.catalog)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AdmissionParams {
    identifier: Option<String>,
}

/// Build the router.
///
/// - `GET /health`
/// - `GET /v1/policies`, itself guarded by the `api-general` policy when the
///   catalog defines one
/// - `POST /v1/admission/{scope}?identifier=...`
pub fn router<S: CounterStore + 'static>(state: AppState<S>) -> Router {
    let mut read_routes = Router::new().route("/v1/policies", get(list_policies::<S>));
    if let Some(policy) = state.catalog.get(RateLimitPolicy::api_general().scope()) {
        let guard = PolicyGuard::new(Arc::clone(&state.limiter), policy.clone());
        read_routes =
            read_routes.route_layer(axum::middleware::from_fn_with_state(guard, enforce::<S>));
    }

    Router::new()
        .route("/health", get(health))
        .route("/v1/admission/{scope}", post(admit::<S>))
        .merge(read_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_policies<S: CounterStore + 'static>(
    State(state): State<AppState<S>>,
) -> Json<Vec<RateLimitPolicy>> {
    Json(state.catalog.iter().cloned().collect())
}

/// Count one event for the caller under `scope` and report the decision.
///
/// The identifier comes from the query string or, when absent, from the
/// request's address headers.
#[instrument(skip(state, params, headers))]
async fn admit<S: CounterStore + 'static>(
    State(state): State<AppState<S>>,
    Path(scope): Path<String>,
    Query(params): Query<AdmissionParams>,
    headers: HeaderMap,
) -> Response {
    let Some(policy) = state.catalog.get(&scope) else {
        debug!("Admission requested for unknown scope");
        let body = json!({ "error": "unknown_scope", "scope": scope });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    };

    let identifier = params
        .identifier
        .unwrap_or_else(|| client_identifier(&headers));
    let decision = state.limiter.check(&identifier, policy);

    let status = if decision.admitted {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };
    (status, rate_limit_headers(&decision), Json(decision)).into_response()
}
