//! Counter key generation.

use super::policy::RateLimitPolicy;

/// A key that uniquely identifies one caller's counter within one policy scope.
///
/// Scope and identifier are kept apart rather than joined into a single
/// string, so `("a:b", "c")` and `("a", "b:c")` never share a counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// The policy scope this counter belongs to
    pub scope: String,
    /// Opaque caller identifier (usually a client address)
    pub identifier: String,
}

impl CounterKey {
    /// Create a counter key for `identifier` under `policy`.
    pub fn new(policy: &RateLimitPolicy, identifier: &str) -> Self {
        Self {
            scope: policy.scope().to_string(),
            identifier: identifier.to_string(),
        }
    }
}

/// Displays as `scope:identifier`, the form used in logs.
impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scope, self.identifier)
    }
}
