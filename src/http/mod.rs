//! HTTP surface: caller identification, response headers, middleware and
//! the admission sidecar's routes.

mod headers;
mod identity;
mod middleware;
mod routes;
mod server;

pub use headers::{rate_limit_headers, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};
pub use identity::{client_identifier, LOOPBACK_IDENTIFIER};
pub use middleware::{enforce, PolicyGuard};
pub use routes::{router, AppState};
pub use server::HttpServer;
