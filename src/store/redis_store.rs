//! Redis-backed counter store.
//!
//! Each key maps to a Redis sorted set. A batch is sent as one
//! `MULTI`/`EXEC` pipeline over a multiplexed `ConnectionManager`, so
//! other clients never observe a half-applied batch and no client-side
//! lock is needed.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Value};
use std::fmt;
use tracing::{debug, warn};

use super::{CounterStore, StoreOp, StoreReply};
use crate::error::{RateguardError, Result};

/// Default prefix applied to every key written to Redis.
pub const DEFAULT_KEY_PREFIX: &str = "rl:";

/// Counter store shared across processes through Redis.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis with the default key prefix.
    ///
    /// # Errors
    /// Returns `DependencyUnavailable` if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_prefix(url, DEFAULT_KEY_PREFIX).await
    }

    /// Connect to Redis, namespacing every key with `key_prefix`.
    pub async fn connect_with_prefix(url: &str, key_prefix: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        debug!(key_prefix = %key_prefix, "Connected to Redis counter store");

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn pipeline(&self, ops: &[StoreOp]) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for op in ops {
            match op {
                StoreOp::RemoveRange { key, min, max } => {
                    pipe.zrembyscore(self.key(key), *min, *max);
                }
                StoreOp::Add { key, member, score } => {
                    pipe.zadd(self.key(key), member, *score);
                }
                StoreOp::Cardinality { key } => {
                    pipe.zcard(self.key(key));
                }
                StoreOp::Expire { key, ttl } => {
                    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                    pipe.pexpire(self.key(key), ttl_ms);
                }
            }
        }

        pipe
    }
}

/// Interpret the raw reply to `op`.
fn decode_reply(op: &StoreOp, value: &Value) -> Result<StoreReply> {
    let reply = match op {
        StoreOp::RemoveRange { .. } => StoreReply::Removed(redis::from_redis_value(value)?),
        StoreOp::Add { .. } => {
            let added: u64 = redis::from_redis_value(value)?;
            StoreReply::Added(added > 0)
        }
        StoreOp::Cardinality { .. } => StoreReply::Cardinality(redis::from_redis_value(value)?),
        StoreOp::Expire { .. } => StoreReply::ExpirySet(redis::from_redis_value(value)?),
    };
    Ok(reply)
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>> {
        let pipe = self.pipeline(&ops);
        let mut conn = self.connection.clone();

        let values: Vec<Value> = pipe.query_async(&mut conn).await.map_err(|e| {
            warn!(error = %e, "Redis batch failed");
            RateguardError::from(e)
        })?;

        if values.len() != ops.len() {
            warn!(
                expected = ops.len(),
                received = values.len(),
                "Redis batch returned a partial reply"
            );
            return Err(RateguardError::DependencyUnavailable(format!(
                "expected {} replies from Redis, received {}",
                ops.len(),
                values.len()
            )));
        }

        ops.iter()
            .zip(values.iter())
            .map(|(op, value)| decode_reply(op, value))
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
