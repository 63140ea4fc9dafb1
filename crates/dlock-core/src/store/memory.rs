// In-process lock store
// Per-key atomicity comes from DashMap's shard locking; expiry is checked on
// every access and swept periodically by an optional reaper task.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{LockStore, StoreError, ttl_millis};
use crate::model::{LockKey, LockToken};

/// A lock record held by the in-process store
#[derive(Debug, Clone)]
struct MemoryRecord {
    token: String,
    expires_at: Instant,
}

impl MemoryRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Lock store kept in process memory.
///
/// Only coordinates callers sharing this instance, so it stands in for the
/// shared store in tests and single-node deployments.
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    records: Arc<DashMap<String, MemoryRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a background task that drops expired records every `interval`.
    ///
    /// Must be called from within a tokio runtime. The task stops once every
    /// clone of the store has been dropped. A zero interval starts no reaper;
    /// expired records are then only replaced when their key is reused.
    pub fn with_reaper(self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!("MemoryLockStore reaper interval is zero, expired records will not be swept");
            return self;
        }

        let records: Weak<DashMap<String, MemoryRecord>> = Arc::downgrade(&self.records);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(records) = records.upgrade() else {
                    break;
                };
                let purged = purge(&records);
                if purged > 0 {
                    debug!(count = purged, "Cleaned up expired lock records");
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "MemoryLockStore reaper started");
        self
    }

    /// Token currently holding `key`, ignoring expired records
    pub fn current_token(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.records
            .get(key)
            .filter(|r| !r.is_expired(now))
            .map(|r| r.token.clone())
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.records.iter().filter(|r| !r.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired records now, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        purge(&self.records)
    }
}

fn purge(records: &DashMap<String, MemoryRecord>) -> usize {
    let now = Instant::now();
    let before = records.len();
    records.retain(|_, r| !r.is_expired(now));
    before.saturating_sub(records.len())
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &LockKey,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let ttl = Duration::from_millis(ttl_millis(ttl)?);
        let now = Instant::now();
        let record = MemoryRecord {
            token: token.as_str().to_string(),
            expires_at: now + ttl,
        };

        match self.records.entry(key.as_str().to_string()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_expired(now) {
                    existing.insert(record);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(
        &self,
        key: &LockKey,
        token: &LockToken,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = self
            .records
            .remove_if(key.as_str(), |_, r| r.token == token.as_str());

        // An expired record no longer exists as far as callers are concerned.
        Ok(removed.is_some_and(|(_, r)| !r.is_expired(now)))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
