//! Lock Coordinator
//!
//! Owns acquire/release on top of a [`LockStore`]. Ownership is proven by
//! token equality rather than key presence: if holder A's lease expires and
//! B acquires the key, A's late release must not delete B's record. The store
//! evaluates the comparison and the delete in one atomic step.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::metrics::{record_acquire, record_release};
use crate::model::{LockKey, LockToken};
use crate::store::LockStore;

/// Acquire/release primitives over the shared store
#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn LockStore>,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    /// Single conditional write of a fresh token under `key`.
    ///
    /// Returns the winning token, or `None` when another holder owns the key
    /// or the store could not be reached (fail closed). Never retries and
    /// never waits; callers wanting a retry policy build it above this.
    pub async fn acquire(&self, key: &LockKey, lease: Duration) -> Option<LockToken> {
        if lease.is_zero() {
            warn!(key = %key, "Refusing to acquire lock with a zero lease");
            record_acquire("error");
            return None;
        }

        let token = LockToken::generate();
        match self.store.set_if_absent(key, &token, lease).await {
            Ok(true) => {
                debug!(
                    key = %key,
                    token = %token,
                    lease_ms = lease.as_millis() as u64,
                    backend = self.store.backend(),
                    "Lock acquired"
                );
                record_acquire("acquired");
                Some(token)
            }
            Ok(false) => {
                debug!(key = %key, backend = self.store.backend(), "Lock held by another owner");
                record_acquire("contended");
                None
            }
            Err(e) => {
                warn!(
                    key = %key,
                    backend = self.store.backend(),
                    error = %e,
                    "Failed to get distributed lock"
                );
                record_acquire("error");
                None
            }
        }
    }

    /// Deletes the record for `key` only if it still holds `token`.
    ///
    /// `false` is expected when the lease already expired (and possibly went
    /// to someone else); it is logged, never raised.
    pub async fn release(&self, key: &LockKey, token: &LockToken) -> bool {
        match self.store.compare_and_delete(key, token).await {
            Ok(true) => {
                debug!(key = %key, token = %token, "Lock released");
                record_release("released");
                true
            }
            Ok(false) => {
                debug!(
                    key = %key,
                    token = %token,
                    "Lock no longer owned (expired or taken over), nothing released"
                );
                record_release("not_owner");
                false
            }
            Err(e) => {
                error!(
                    key = %key,
                    backend = self.store.backend(),
                    error = %e,
                    "Failed to unlock the distributed lock, unlock it manually or wait until the lease expires"
                );
                record_release("error");
                false
            }
        }
    }
}
