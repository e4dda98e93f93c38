//! Error types for the RateGuard service.

use thiserror::Error;

/// Main error type for RateGuard operations.
#[derive(Error, Debug)]
pub enum RateguardError {
    /// The counter store could not be reached or a batch failed
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// A limiter was constructed with a zero limit or window
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RateguardError {
    /// Whether this error signals an unreachable dependency rather than a bad request.
    pub fn is_dependency_unavailable(&self) -> bool {
        matches!(self, RateguardError::DependencyUnavailable(_))
    }
}

impl From<redis::RedisError> for RateguardError {
    fn from(err: redis::RedisError) -> Self {
        RateguardError::DependencyUnavailable(err.to_string())
    }
}

impl From<config::ConfigError> for RateguardError {
    fn from(err: config::ConfigError) -> Self {
        RateguardError::Config(err.to_string())
    }
}

/// Result type alias for RateGuard operations.
pub type Result<T> = std::result::Result<T, RateguardError>;
