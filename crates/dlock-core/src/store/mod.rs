//! Store adapters
//!
//! The lock protocol needs exactly two primitives from the shared store, and
//! both must be atomic on the store side:
//! - conditional set: write a token only if the key is absent, with the
//!   expiry applied in the same operation
//! - compare-and-delete: delete the key only if it still holds the given
//!   token, evaluated in one step (never GET then DEL from the client)

mod memory;
mod redis;

pub use self::memory::MemoryLockStore;
pub use self::redis::RedisLockStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::model::{LockKey, LockToken};

/// Error raised by a store adapter
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("invalid lease {0:?}: must be at least one millisecond")]
    InvalidLease(Duration),

    #[error("unexpected store reply: {0}")]
    UnexpectedReply(String),
}

/// Minimal capability interface over the shared key-value store
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Stores `token` under `key` with expiry `ttl` only if `key` is absent.
    ///
    /// Returns `Ok(true)` when the record was created.
    async fn set_if_absent(
        &self,
        key: &LockKey,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Deletes `key` only if it currently holds `token`.
    ///
    /// Returns `Ok(true)` when the record was deleted, `Ok(false)` when it was
    /// absent or held by another token.
    async fn compare_and_delete(&self, key: &LockKey, token: &LockToken)
    -> Result<bool, StoreError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// Converts a lease to whole milliseconds, rounding sub-millisecond leases up.
pub(crate) fn ttl_millis(ttl: Duration) -> Result<u64, StoreError> {
    if ttl.is_zero() {
        return Err(StoreError::InvalidLease(ttl));
    }
    let millis = ttl.as_millis().max(1);
    u64::try_from(millis).map_err(|_| StoreError::InvalidLease(ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(5)).unwrap(), 5000);
        assert_eq!(ttl_millis(Duration::from_micros(10)).unwrap(), 1);
        assert!(matches!(
            ttl_millis(Duration::ZERO),
            Err(StoreError::InvalidLease(_))
        ));
    }
}
