// Lock store selection from configuration

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use dlock_common::DlockError;
use dlock_core::{LockStore, MemoryLockStore, RedisLockStore};

use crate::model::{Configuration, StoreMode};

/// Builds the store named by `dlock.store`.
///
/// The memory store starts its expiry reaper here, so this must run inside
/// the server's runtime.
pub async fn build_store(configuration: &Configuration) -> anyhow::Result<Arc<dyn LockStore>> {
    match configuration.store_mode()? {
        StoreMode::Memory => {
            let interval = configuration.reap_interval();
            if interval.is_zero() {
                return Err(DlockError::ConfigError(
                    "dlock.memory.reap-interval-ms must be greater than zero".to_string(),
                )
                .into());
            }
            info!(
                reap_interval_ms = interval.as_millis() as u64,
                "Using in-process lock store"
            );
            Ok(Arc::new(MemoryLockStore::new().with_reaper(interval)))
        }
        StoreMode::Redis => {
            let url = configuration.redis_url();
            let store = RedisLockStore::connect(&url)
                .await
                .with_context(|| format!("Failed to connect to redis at {}", url))?;
            info!(url = %url, "Using redis lock store");
            Ok(Arc::new(store))
        }
    }
}
