// Store doubles shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::model::{LockKey, LockToken};
use crate::store::{LockStore, MemoryLockStore, StoreError};

/// Memory store that counts calls and remembers released tokens
#[derive(Default)]
pub(crate) struct CountingStore {
    inner: MemoryLockStore,
    set_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    released: std::sync::Mutex<Vec<String>>,
}

impl CountingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &MemoryLockStore {
        &self.inner
    }

    pub(crate) fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn released_tokens(&self) -> Vec<String> {
        self.released.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LockStore for CountingStore {
    async fn set_if_absent(
        &self,
        key: &LockKey,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_if_absent(key, token, ttl).await
    }

    async fn compare_and_delete(
        &self,
        key: &LockKey,
        token: &LockToken,
    ) -> Result<bool, StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut released) = self.released.lock() {
            released.push(token.as_str().to_string());
        }
        self.inner.compare_and_delete(key, token).await
    }

    fn backend(&self) -> &'static str {
        "counting"
    }
}

/// Store whose every operation fails
pub(crate) struct FailingStore;

#[async_trait]
impl LockStore for FailingStore {
    async fn set_if_absent(
        &self,
        _key: &LockKey,
        _token: &LockToken,
        _ttl: Duration,
    ) -> Result<bool, StoreError> {
        Err(StoreError::UnexpectedReply("connection refused".to_string()))
    }

    async fn compare_and_delete(
        &self,
        _key: &LockKey,
        _token: &LockToken,
    ) -> Result<bool, StoreError> {
        Err(StoreError::UnexpectedReply("connection refused".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
