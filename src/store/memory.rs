//! In-process counter store for single-instance deployments and tests.

use async_trait::async_trait;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{CounterStore, StoreOp, StoreReply};
use crate::error::Result;
use crate::ratelimit::{Clock, SystemClock};

/// Entries and expiry deadline for one key.
#[derive(Debug, Default)]
struct KeySet {
    /// Member to score
    members: HashMap<String, i64>,
    /// Unix millis after which the key no longer exists
    expires_at_ms: Option<i64>,
}

impl KeySet {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|deadline| deadline <= now_ms)
    }
}

/// Minimum time between two sweeps of expired keys.
const SWEEP_INTERVAL_MS: i64 = 1_000;

/// A counter store held in a sharded concurrent map.
///
/// Consecutive operations on the same key are applied while holding that
/// key's shard lock, so a single-key batch is atomic with respect to
/// every other batch. Keys past their expiry are dropped by the batches
/// that touch them and by a sweep run at most once per
/// [`SWEEP_INTERVAL_MS`].
pub struct MemoryStore {
    entries: DashMap<String, KeySet>,
    clock: Arc<dyn Clock>,
    last_sweep_ms: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create an empty store whose expiry uses `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now_ms = clock.now_ms();
        Self {
            entries: DashMap::new(),
            clock,
            last_sweep_ms: AtomicI64::new(now_ms),
        }
    }

    /// Drop every key whose expiry has passed.
    pub fn purge_expired(&self) {
        let now_ms = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, set| !set.is_expired(now_ms));

        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Purged expired in-memory keys");
        }
    }

    /// Sweep expired keys if the last sweep is older than the interval.
    fn maybe_sweep(&self, now_ms: i64) {
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < SWEEP_INTERVAL_MS {
            return;
        }
        // Only the batch that wins the exchange sweeps.
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.purge_expired();
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.purge_expired();
        self.entries.len()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scores currently stored under `key`, ascending.
    pub fn scores(&self, key: &str) -> Vec<i64> {
        let now_ms = self.clock.now_ms();
        let mut scores: Vec<i64> = self
            .entries
            .get(key)
            .filter(|set| !set.is_expired(now_ms))
            .map(|set| set.members.values().copied().collect())
            .unwrap_or_default();
        scores.sort_unstable();
        scores
    }

    fn lock_key(&self, key: &str, now_ms: i64) -> RefMut<'_, String, KeySet> {
        let mut set = self.entries.entry(key.to_string()).or_default();
        if set.is_expired(now_ms) {
            *set = KeySet::default();
        }
        set
    }

    fn apply(set: &mut KeySet, op: &StoreOp, now_ms: i64) -> StoreReply {
        match op {
            StoreOp::RemoveRange { min, max, .. } => {
                let before = set.members.len();
                set.members.retain(|_, score| *score < *min || *score > *max);
                StoreReply::Removed((before - set.members.len()) as u64)
            }
            StoreOp::Add { member, score, .. } => {
                StoreReply::Added(set.members.insert(member.clone(), *score).is_none())
            }
            StoreOp::Cardinality { .. } => StoreReply::Cardinality(set.members.len() as u64),
            StoreOp::Expire { ttl, .. } => {
                if set.members.is_empty() {
                    return StoreReply::ExpirySet(false);
                }
                let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                set.expires_at_ms = Some(now_ms.saturating_add(ttl_ms));
                StoreReply::ExpirySet(true)
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn op_key(op: &StoreOp) -> &str {
    match op {
        StoreOp::RemoveRange { key, .. }
        | StoreOp::Add { key, .. }
        | StoreOp::Cardinality { key }
        | StoreOp::Expire { key, .. } => key,
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>> {
        let now_ms = self.clock.now_ms();
        self.maybe_sweep(now_ms);

        let mut replies = Vec::with_capacity(ops.len());
        let mut touched: Vec<String> = Vec::new();

        {
            let mut current: Option<RefMut<'_, String, KeySet>> = None;

            for op in &ops {
                let key = op_key(op);
                let same_key = current.as_ref().is_some_and(|set| set.key() == key);
                if !same_key {
                    // Release the previous shard before locking the next one.
                    drop(current.take());
                    current = Some(self.lock_key(key, now_ms));
                    touched.push(key.to_string());
                }
                if let Some(set) = current.as_mut() {
                    replies.push(Self::apply(set, op, now_ms));
                }
            }
        }

        // Sorted sets disappear once their last member is removed or they expire.
        for key in touched {
            self.entries
                .remove_if(&key, |_, set| set.members.is_empty() || set.is_expired(now_ms));
        }

        trace!(ops = ops.len(), "Applied in-memory store batch");
        Ok(replies)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
