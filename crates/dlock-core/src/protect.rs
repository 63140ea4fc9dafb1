//! Caller-facing wrapper
//!
//! `idle → acquiring → acquired → executing → releasing → idle`, or
//! `idle → acquiring → rejected → idle`. Every path ends back at idle with
//! one of the four [`Protected`] variants, so a protector is reused freely
//! across calls and tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::coordinator::LockCoordinator;
use crate::fingerprint::FingerprintResolver;
use crate::guard::{BoundedExecutionGuard, CancelSignal, HeldLease};
use crate::metrics::record_protect;
use crate::model::{LockKey, LockSpec, Protected};
use crate::store::LockStore;

/// Composes key resolution, acquisition, bounded execution and release
#[derive(Clone)]
pub struct LockProtector {
    coordinator: Arc<LockCoordinator>,
    resolver: FingerprintResolver,
    guard: BoundedExecutionGuard,
}

impl LockProtector {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            coordinator: Arc::new(LockCoordinator::new(store)),
            resolver: FingerprintResolver::default(),
            guard: BoundedExecutionGuard::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: FingerprintResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_guard(mut self, guard: BoundedExecutionGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn coordinator(&self) -> &Arc<LockCoordinator> {
        &self.coordinator
    }

    pub fn resolver(&self) -> &FingerprintResolver {
        &self.resolver
    }

    /// Runs async `work` under the lock described by `spec` and `args`.
    pub async fn protect<A, T, E, F, Fut>(&self, spec: &LockSpec, args: &A, work: F) -> Protected<T, E>
    where
        A: Serialize + ?Sized,
        F: FnOnce(CancelSignal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let key = self
            .resolver
            .resolve(&spec.operation, args, spec.explicit_key());
        self.protect_key(&key, spec.lease, work).await
    }

    /// Runs async `work` under an already derived `key`.
    pub async fn protect_key<T, E, F, Fut>(
        &self,
        key: &LockKey,
        lease: Duration,
        work: F,
    ) -> Protected<T, E>
    where
        F: FnOnce(CancelSignal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let Some(held) = self.acquire(key, lease).await else {
            return report(key, Protected::Rejected);
        };

        debug!(key = %key, "Executing protected work");
        let outcome = self.guard.run(lease, held, work).await;
        report(key, outcome.into())
    }

    /// Runs synchronous `work` under the lock described by `spec` and `args`.
    pub async fn protect_blocking<A, T, E, F>(
        &self,
        spec: &LockSpec,
        args: &A,
        work: F,
    ) -> Protected<T, E>
    where
        A: Serialize + ?Sized,
        F: FnOnce(CancelSignal) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let key = self
            .resolver
            .resolve(&spec.operation, args, spec.explicit_key());

        let Some(held) = self.acquire(&key, spec.lease).await else {
            return report(&key, Protected::Rejected);
        };

        debug!(key = %key, "Executing protected blocking work");
        let outcome = self.guard.run_blocking(spec.lease, held, work).await;
        report(&key, outcome.into())
    }

    /// Decorator form: binds `f` to `spec`, then `protected.call(args)`
    /// derives the key from `args` on every call.
    pub fn wrap<F>(&self, spec: LockSpec, f: F) -> ProtectedFn<F> {
        ProtectedFn {
            protector: self.clone(),
            spec,
            f,
        }
    }

    async fn acquire(&self, key: &LockKey, lease: Duration) -> Option<HeldLease> {
        let token = self.coordinator.acquire(key, lease).await?;
        Some(HeldLease::new(self.coordinator.clone(), key.clone(), token))
    }
}

fn report<T, E>(key: &LockKey, result: Protected<T, E>) -> Protected<T, E> {
    match &result {
        Protected::Value(_) => debug!(key = %key, "Protected work completed"),
        Protected::Rejected => info!(key = %key, "Lock is held elsewhere, operation rejected"),
        Protected::DeclaredFailure(_) => warn!(key = %key, "Protected work failed"),
        Protected::TimedOut => warn!(key = %key, "Protected work timed out, lock left to expire"),
    }
    record_protect(result.kind());
    result
}

/// A function bound to a lock declaration
pub struct ProtectedFn<F> {
    protector: LockProtector,
    spec: LockSpec,
    f: F,
}

impl<F> ProtectedFn<F> {
    pub fn spec(&self) -> &LockSpec {
        &self.spec
    }

    /// Calls the wrapped function with `args` under the lock.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Protected<T, E>
    where
        A: Serialize + Send + 'static,
        F: Fn(A, CancelSignal) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let key = self
            .protector
            .resolver
            .resolve(&self.spec.operation, &args, self.spec.explicit_key());
        let f = self.f.clone();

        self.protector
            .protect_key(&key, self.spec.lease, move |cancel| f(args, cancel))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OperationId, WorkFailure};
    use crate::store::MemoryLockStore;
    use crate::testing::{CountingStore, FailingStore};

    fn spec(name: &str) -> LockSpec {
        LockSpec::new(OperationId::new("dlock::tests", name)).with_lease(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_protect_returns_value() {
        let store = MemoryLockStore::new();
        let protector = LockProtector::new(Arc::new(store.clone()));

        let result: Protected<String, String> = protector
            .protect(&spec("greet"), &"alice", |_| async { Ok("hello".to_string()) })
            .await;

        assert_eq!(result, Protected::Value("hello".to_string()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_protect_rejects_when_held() {
        let store = MemoryLockStore::new();
        let protector = LockProtector::new(Arc::new(store.clone()));
        let spec = spec("greet").with_key("R");

        let key = LockKey::from("R");
        let token = protector
            .coordinator()
            .acquire(&key, Duration::from_secs(5))
            .await
            .unwrap();

        let result: Protected<(), String> = protector
            .protect(&spec, &(), |_| async { Err("must not run".to_string()) })
            .await;

        assert_eq!(result, Protected::Rejected);
        assert_eq!(store.current_token("R"), Some(token.as_str().to_string()));
    }

    #[tokio::test]
    async fn test_store_outage_is_rejected() {
        let protector = LockProtector::new(Arc::new(FailingStore));

        let result: Protected<(), String> = protector
            .protect(&spec("op"), &(), |_| async { Ok(()) })
            .await;

        assert_eq!(result, Protected::Rejected);
    }

    #[tokio::test]
    async fn test_declared_failure_releases_lock() {
        let store = Arc::new(CountingStore::new());
        let protector = LockProtector::new(store.clone());

        let result: Protected<(), String> = protector
            .protect(&spec("op"), &1, |_| async { Err("invalid".to_string()) })
            .await;

        assert_eq!(
            result,
            Protected::DeclaredFailure(WorkFailure::Declared("invalid".to_string()))
        );
        assert_eq!(store.delete_calls(), 1);
        assert!(store.inner().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_timed_out() {
        let store = MemoryLockStore::new();
        let protector = LockProtector::new(Arc::new(store.clone()));
        let spec = spec("slow").with_lease(Duration::from_secs(1));

        let result: Protected<(), String> = protector
            .protect(&spec, &(), |_| async {
                tokio::time::sleep(Duration::from_secs(20)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Protected::TimedOut);
    }

    #[tokio::test]
    async fn test_protector_is_reusable() {
        let store = MemoryLockStore::new();
        let protector = LockProtector::new(Arc::new(store.clone()));
        let spec = spec("count");

        for i in 0..5 {
            let result: Protected<i32, String> =
                protector.protect(&spec, &(), move |_| async move { Ok(i) }).await;
            assert_eq!(result, Protected::Value(i));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_protect_blocking() {
        let store = MemoryLockStore::new();
        let protector = LockProtector::new(Arc::new(store.clone()));

        let result: Protected<usize, String> = protector
            .protect_blocking(&spec("len"), &"payload", |_| Ok("payload".len()))
            .await;

        assert_eq!(result, Protected::Value(7));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_wrapped_function_derives_key_from_args() {
        let store = Arc::new(CountingStore::new());
        let protector = LockProtector::new(store.clone());

        let double = protector.wrap(spec("double"), |n: u64, _cancel: CancelSignal| async move {
            Ok::<_, String>(n * 2)
        });

        assert_eq!(double.call(21).await, Protected::Value(42));
        assert_eq!(double.call(5).await, Protected::Value(10));
        assert_eq!(store.set_calls(), 2);
        assert_eq!(double.spec().lease, Duration::from_secs(5));
    }
}
