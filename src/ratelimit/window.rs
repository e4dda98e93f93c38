//! Limiter configuration and per-evaluation decisions.

use std::time::Duration;

use crate::error::{RateguardError, Result};

/// Immutable limit and window length shared by every evaluation of one limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    limit: u64,
    window: Duration,
}

impl LimiterConfig {
    /// Create a validated configuration.
    ///
    /// Rejects a zero limit and any window shorter than one millisecond.
    pub fn new(limit: u64, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(RateguardError::InvalidConfiguration(
                "limit must be a positive integer".to_string(),
            ));
        }
        if window.as_millis() == 0 {
            return Err(RateguardError::InvalidConfiguration(
                "window length must be at least one millisecond".to_string(),
            ));
        }
        Ok(Self { limit, window })
    }

    /// Convenience constructor for a window expressed in whole seconds.
    pub fn per_secs(limit: u64, window_secs: u64) -> Result<Self> {
        Self::new(limit, Duration::from_secs(window_secs))
    }

    /// Maximum requests allowed within one window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in milliseconds, saturating at `i64::MAX`.
    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Build the decision for a window that now holds `count` entries.
    pub fn decide(&self, count: u64) -> Decision {
        Decision {
            allowed: count <= self.limit,
            remaining: self.limit.saturating_sub(count),
        }
    }
}

/// Outcome of one limiter evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request fits within the limit
    pub allowed: bool,
    /// Quota left in the current window, never negative
    pub remaining: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_rejected() {
        let err = LimiterConfig::per_secs(0, 60).unwrap_err();
        assert!(matches!(err, RateguardError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = LimiterConfig::new(10, Duration::ZERO).unwrap_err();
        assert!(matches!(err, RateguardError::InvalidConfiguration(_)));

        let err = LimiterConfig::new(10, Duration::from_micros(500)).unwrap_err();
        assert!(matches!(err, RateguardError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_window_ms() {
        let config = LimiterConfig::per_secs(5, 60).unwrap();
        assert_eq!(config.window_ms(), 60_000);
        assert_eq!(config.limit(), 5);
    }

    #[test]
    fn test_decide_within_and_over_limit() {
        let config = LimiterConfig::per_secs(2, 60).unwrap();

        assert_eq!(config.decide(1), Decision { allowed: true, remaining: 1 });
        assert_eq!(config.decide(2), Decision { allowed: true, remaining: 0 });
        assert_eq!(config.decide(3), Decision { allowed: false, remaining: 0 });
        assert_eq!(config.decide(100), Decision { allowed: false, remaining: 0 });
    }
}
