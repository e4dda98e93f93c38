//! Sliding window rate limiter.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::key::RateKey;
use super::window::{Decision, LimiterConfig};
use crate::error::{RateguardError, Result};
use crate::store::{CounterStore, StoreOp, StoreReply};

/// Default upper bound on one store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// Position of the cardinality reply within an evaluation batch.
const CARDINALITY_REPLY: usize = 2;

/// Rolling-window limiter over a shared counter store.
///
/// The limiter holds no mutable state; every evaluation is a single batch
/// against the store, so one instance can serve any number of concurrent
/// requests.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    config: LimiterConfig,
    timeout: Duration,
}

impl SlidingWindowLimiter {
    /// Create a limiter using the system clock and the default store timeout.
    pub fn new(store: Arc<dyn CounterStore>, config: LimiterConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock::new()),
            config,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Replace the clock used to timestamp window entries.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound how long one evaluation may wait on the store.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The limit and window this limiter enforces.
    pub fn config(&self) -> LimiterConfig {
        self.config
    }

    /// Record a request against `key` and decide whether it is allowed.
    ///
    /// Entries scored at or before `now - window` are expired, the new entry
    /// is inserted, the remaining entries are counted and the key's expiry
    /// is refreshed, all in one store batch. The count includes the new
    /// entry, so the `limit + 1`-th request in a window is denied.
    ///
    /// # Errors
    /// Returns `DependencyUnavailable` if the store fails or does not answer
    /// within the configured timeout.
    pub async fn allow(&self, key: &RateKey) -> Result<Decision> {
        let now_ms = self.clock.now_ms();
        let window_start = now_ms.saturating_sub(self.config.window_ms());
        let key_str = key.to_string_key();

        // Same-millisecond requests must not collapse into one member.
        let member = format!("{}-{}", now_ms, Uuid::new_v4().simple());

        let ops = vec![
            StoreOp::RemoveRange {
                key: key_str.clone(),
                min: 0,
                max: window_start,
            },
            StoreOp::Add {
                key: key_str.clone(),
                member,
                score: now_ms,
            },
            StoreOp::Cardinality {
                key: key_str.clone(),
            },
            StoreOp::Expire {
                key: key_str.clone(),
                ttl: self.config.window(),
            },
        ];

        trace!(key = %key_str, now_ms, window_start, "Evaluating sliding window");

        let replies = self.execute(ops).await?;
        let count = match replies.get(CARDINALITY_REPLY) {
            Some(StoreReply::Cardinality(count)) => *count,
            other => {
                warn!(key = %key_str, reply = ?other, "Unexpected counter store reply");
                return Err(RateguardError::DependencyUnavailable(
                    "counter store returned no cardinality".to_string(),
                ));
            }
        };

        let decision = self.config.decide(count);
        if !decision.allowed {
            debug!(
                key = %key_str,
                count,
                limit = self.config.limit(),
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// Run a batch to completion, giving up on waiting after the timeout.
    ///
    /// The batch runs on its own task, so an elapsed timeout stops the wait
    /// but never interrupts an insert that has already been issued.
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>> {
        let store = Arc::clone(&self.store);
        let batch = tokio::spawn(async move { store.execute(ops).await });

        match tokio::time::timeout(self.timeout, batch).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(RateguardError::DependencyUnavailable(format!(
                "counter store task failed: {}",
                join_err
            ))),
            Err(_) => {
                warn!(timeout = ?self.timeout, "Counter store timed out");
                Err(RateguardError::DependencyUnavailable(format!(
                    "counter store did not respond within {:?}",
                    self.timeout
                )))
            }
        }
    }
}
