//! Shared state injected into every handler.

use std::sync::Arc;
use tracing::info;

use super::auth::ApiKeys;
use crate::audit::{AuditLog, JsonLinesAuditLog, MemoryAuditLog};
use crate::config::{FailurePolicy, RateguardConfig, StoreBackend};
use crate::error::Result;
use crate::ratelimit::{AdmissionPolicy, SlidingWindowLimiter};
use crate::store::{CounterStore, MemoryStore, RedisStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Identity and origin admission policy
    pub policy: Arc<AdmissionPolicy>,
    /// Counter store, also probed by readiness
    pub store: Arc<dyn CounterStore>,
    /// Destination of audit records
    pub audit: Arc<dyn AuditLog>,
    /// Allow-listed API keys
    pub api_keys: Arc<ApiKeys>,
    /// Behaviour when the counter store is unavailable
    pub failure_policy: FailurePolicy,
}

impl AppState {
    /// Assemble state from already constructed collaborators.
    pub fn new(
        policy: AdmissionPolicy,
        store: Arc<dyn CounterStore>,
        audit: Arc<dyn AuditLog>,
        api_keys: ApiKeys,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            store,
            audit,
            api_keys: Arc::new(api_keys),
            failure_policy,
        }
    }

    /// Connect the configured store and audit log and build the policy.
    pub async fn from_config(config: &RateguardConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn CounterStore> = match config.store.backend {
            StoreBackend::Memory => {
                info!("Using in-memory counter store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Redis => {
                info!(url = %config.store.redis_url, "Connecting to Redis counter store");
                Arc::new(
                    RedisStore::connect_with_prefix(
                        &config.store.redis_url,
                        &config.store.key_prefix,
                    )
                    .await?,
                )
            }
        };

        let audit: Arc<dyn AuditLog> = match &config.audit.path {
            Some(path) => {
                let log = JsonLinesAuditLog::open(path).await?;
                info!(path = %log.path().display(), "Writing audit records");
                Arc::new(log)
            }
            None => {
                info!("Keeping audit records in memory");
                Arc::new(MemoryAuditLog::new())
            }
        };

        let limits = &config.rate_limiting;
        let identity = SlidingWindowLimiter::new(store.clone(), limits.identity_limiter_config()?)
            .with_timeout(limits.store_timeout());
        let origin = SlidingWindowLimiter::new(store.clone(), limits.origin_limiter_config()?)
            .with_timeout(limits.store_timeout());

        info!(
            identity_limit = identity.config().limit(),
            identity_window = ?identity.config().window(),
            origin_limit = origin.config().limit(),
            origin_window = ?origin.config().window(),
            "Configured admission policy"
        );

        Ok(Self::new(
            AdmissionPolicy::with_limiters(identity, origin),
            store,
            audit,
            ApiKeys::from_config(&config.auth),
            limits.failure_policy,
        ))
    }
}
