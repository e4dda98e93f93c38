//! Counter store abstraction shared by every limiter instance.
//!
//! A store keeps one ordered set of window entries per key. The limiter
//! submits its operations as a single batch and the store applies them
//! in order, returning one reply per operation.

mod memory;
mod redis_store;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis_store::{RedisStore, DEFAULT_KEY_PREFIX};

/// One operation within a store batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Remove entries whose score lies in `[min, max]`.
    RemoveRange { key: String, min: i64, max: i64 },
    /// Insert `member` with `score`, replacing the score of an equal member.
    Add { key: String, member: String, score: i64 },
    /// Count the entries under `key`.
    Cardinality { key: String },
    /// Expire the whole key after `ttl` without further writes.
    Expire { key: String, ttl: Duration },
}

/// Reply to a single [`StoreOp`], in the same position as its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreReply {
    /// Number of entries removed
    Removed(u64),
    /// Whether the member was newly inserted
    Added(bool),
    /// Number of entries under the key
    Cardinality(u64),
    /// Whether an expiry was applied
    ExpirySet(bool),
}

/// Trait for counter store implementations.
///
/// This abstracts over the in-memory store used by single-process
/// deployments and the Redis store shared across processes.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Apply `ops` as one batch and return their replies in call order.
    ///
    /// No other batch touching the same key may observe a partially
    /// applied state. Any failure fails the whole call.
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;
}
