//! Error types for the Gatekeeper service.

use thiserror::Error;

/// Main error type for Gatekeeper operations.
///
/// Admission rejections are not errors; they are reported through
/// [`Decision`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rate limit policy that can never be enforced
    #[error("Invalid policy '{scope}': {reason}")]
    InvalidPolicy {
        /// Scope of the offending policy
        scope: String,
        /// What is wrong with it
        reason: String,
    },

    /// Async runtime errors (e.g. scheduling outside a tokio runtime)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GatekeeperError {
    fn from(err: config::ConfigError) -> Self {
        GatekeeperError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for GatekeeperError {
    fn from(err: serde_yaml::Error) -> Self {
        GatekeeperError::Config(err.to_string())
    }
}

/// Result type alias for Gatekeeper operations.
pub type Result<T> = std::result::Result<T, GatekeeperError>;
