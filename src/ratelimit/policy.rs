//! Multi-key admission policy.
//!
//! Every request is charged against two independent dimensions, the
//! caller identity and the network origin. Both counters are updated on
//! every request, even when the first one already denies, so a blocked
//! identity cannot be used to make requests that skip the origin counter.

use futures::future;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::key::RateKey;
use super::limiter::SlidingWindowLimiter;
use super::window::{Decision, LimiterConfig};
use crate::error::Result;
use crate::store::CounterStore;

/// Joined decision across the identity and origin dimensions.
///
/// It does not record which dimension caused a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionOutcome {
    /// True only when both dimensions allow the request
    pub allowed: bool,
    /// Remaining quota of the more restrictive dimension
    pub remaining: u64,
}

impl AdmissionOutcome {
    /// Combine the identity and origin decisions.
    pub fn combine(identity: Decision, origin: Decision) -> Self {
        Self {
            allowed: identity.allowed && origin.allowed,
            remaining: identity.remaining.min(origin.remaining),
        }
    }
}

/// Evaluates an identity limiter and an origin limiter for every request.
#[derive(Clone)]
pub struct AdmissionPolicy {
    identity: SlidingWindowLimiter,
    origin: SlidingWindowLimiter,
}

impl AdmissionPolicy {
    /// Create a policy applying the same configuration to both dimensions.
    pub fn new(store: Arc<dyn CounterStore>, config: LimiterConfig) -> Self {
        let limiter = SlidingWindowLimiter::new(store, config);
        Self {
            identity: limiter.clone(),
            origin: limiter,
        }
    }

    /// Create a policy from separately configured limiters.
    pub fn with_limiters(identity: SlidingWindowLimiter, origin: SlidingWindowLimiter) -> Self {
        Self { identity, origin }
    }

    /// Charge one request to `identity` and `origin` and decide admission.
    ///
    /// Both evaluations are issued concurrently and both run to completion
    /// before any error is reported.
    ///
    /// # Errors
    /// Returns `DependencyUnavailable` if either evaluation fails.
    #[instrument(skip(self, identity), level = "debug")]
    pub async fn check(&self, identity: &str, origin: &str) -> Result<AdmissionOutcome> {
        let identity_key = RateKey::identity(identity);
        let origin_key = RateKey::origin(origin);

        let (identity_decision, origin_decision) = future::join(
            self.identity.allow(&identity_key),
            self.origin.allow(&origin_key),
        )
        .await;

        let outcome = AdmissionOutcome::combine(identity_decision?, origin_decision?);

        debug!(
            allowed = outcome.allowed,
            remaining = outcome.remaining,
            "Admission decision made"
        );

        Ok(outcome)
    }
}
