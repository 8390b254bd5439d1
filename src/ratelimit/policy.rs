//! Rate limit policies and the named policy catalog.
//!
//! Policies are validated when they are built or loaded. A policy that exists
//! is always enforceable, so `check` has nothing left to reject at request time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::{GatekeeperError, Result};

/// An immutable fixed-window policy: at most `limit` events per `window_seconds`
/// for each identifier within `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyConfig")]
pub struct RateLimitPolicy {
    scope: String,
    limit: u32,
    window_seconds: u64,
}

/// Unvalidated policy as it appears in configuration files.
#[derive(Debug, Clone, Deserialize)]
struct PolicyConfig {
    scope: String,
    limit: u32,
    window_seconds: u64,
}

impl TryFrom<PolicyConfig> for RateLimitPolicy {
    type Error = GatekeeperError;

    fn try_from(raw: PolicyConfig) -> Result<Self> {
        RateLimitPolicy::new(raw.scope, raw.limit, raw.window_seconds)
    }
}

impl RateLimitPolicy {
    /// Build a policy, rejecting ones that could never admit anything.
    pub fn new(scope: impl Into<String>, limit: u32, window_seconds: u64) -> Result<Self> {
        let scope = scope.into();
        let invalid = |reason: &str| GatekeeperError::InvalidPolicy {
            scope: scope.clone(),
            reason: reason.to_string(),
        };

        if scope.is_empty() {
            return Err(invalid("scope must not be empty"));
        }
        if limit == 0 {
            return Err(invalid("limit must be positive"));
        }
        if window_seconds == 0 {
            return Err(invalid("window_seconds must be positive"));
        }

        Ok(Self {
            scope,
            limit,
            window_seconds,
        })
    }

    /// Namespace separating this policy's counters from other policies.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Maximum admitted events per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Window length in seconds.
    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    /// Window length in milliseconds, the unit of the limiter's clock.
    pub fn window_millis(&self) -> u64 {
        self.window_seconds.saturating_mul(1000)
    }

    /// AI content generation: 10 per minute.
    pub fn ai_generation() -> Self {
        Self::builtin("ai-generation", 10, 60)
    }

    /// Virtual try-on image generation: 5 per minute.
    pub fn try_on() -> Self {
        Self::builtin("try-on", 5, 60)
    }

    /// Chat assistant: 20 per minute.
    pub fn chat() -> Self {
        Self::builtin("chat", 20, 60)
    }

    /// Analytics ingestion: 100 per minute.
    pub fn analytics() -> Self {
        Self::builtin("analytics", 100, 60)
    }

    /// Outbound email: 5 per five minutes.
    pub fn email() -> Self {
        Self::builtin("email", 5, 300)
    }

    /// Everything else: 60 per minute.
    pub fn api_general() -> Self {
        Self::builtin("api-general", 60, 60)
    }

    // Built-ins are known-valid constants.
    fn builtin(scope: &str, limit: u32, window_seconds: u64) -> Self {
        Self {
            scope: scope.to_string(),
            limit,
            window_seconds,
        }
    }
}

/// A set of policies addressable by scope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PolicyCatalog {
    policies: BTreeMap<String, RateLimitPolicy>,
}

/// On-disk layout of a policy file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    policies: Vec<RateLimitPolicy>,
}

impl PolicyCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in policies guarding the storefront's endpoints.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for policy in [
            RateLimitPolicy::ai_generation(),
            RateLimitPolicy::try_on(),
            RateLimitPolicy::chat(),
            RateLimitPolicy::analytics(),
            RateLimitPolicy::email(),
            RateLimitPolicy::api_general(),
        ] {
            catalog.insert(policy);
        }
        catalog
    }

    /// Load policies from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load policies from a YAML string.
    ///
    /// ```yaml
    /// policies:
    ///   - scope: chat
    ///     limit: 20
    ///     window_seconds: 60
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml).map_err(|e| {
            GatekeeperError::Config(format!("Failed to parse policy file: {}", e))
        })?;

        let mut catalog = Self::new();
        for policy in file.policies {
            if let Some(previous) = catalog.insert(policy) {
                return Err(GatekeeperError::Config(format!(
                    "duplicate policy scope '{}'",
                    previous.scope()
                )));
            }
        }
        Ok(catalog)
    }

    /// Add a policy, returning the one it replaced.
    pub fn insert(&mut self, policy: RateLimitPolicy) -> Option<RateLimitPolicy> {
        self.policies.insert(policy.scope().to_string(), policy)
    }

    /// Overlay `other` on top of this catalog; its policies win by scope.
    pub fn merge(mut self, other: PolicyCatalog) -> Self {
        self.policies.extend(other.policies);
        self
    }

    /// Look up a policy by scope.
    pub fn get(&self, scope: &str) -> Option<&RateLimitPolicy> {
        self.policies.get(scope)
    }

    /// Iterate over policies in scope order.
    pub fn iter(&self) -> impl Iterator<Item = &RateLimitPolicy> {
        self.policies.values()
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the catalog has no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
