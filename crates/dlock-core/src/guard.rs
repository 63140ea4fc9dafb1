//! Bounded Execution Guard
//!
//! Runs protected work on its own tokio task so the caller keeps control of
//! the deadline even if the work never yields a result. The worker releases
//! the lease in its own completion path before reporting, so on the normal
//! path release happens-before the caller sees the outcome.
//!
//! When the deadline elapses first the guard fires the [`CancelSignal`] and
//! returns [`Outcome::DeadlineExceeded`] at once, without waiting for the
//! worker. Cancellation is cooperative: work that never checks the signal
//! keeps running, and its record stays in the store until the work finishes
//! and releases it or the lease expires. Nothing here attempts to kill a
//! running task or thread.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, warn};

use crate::coordinator::LockCoordinator;
use crate::model::{LockKey, LockToken, Outcome, WorkFailure};

/// Cooperative cancellation signal handed to protected work
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    fn pair() -> (watch::Sender<bool>, Self) {
        let (sender, receiver) = watch::channel(false);
        (sender, Self { receiver })
    }

    /// Whether the deadline has passed and the caller gave up on this work
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation fires, or once the waiting caller is gone.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// A lease that has been acquired and must be released exactly once.
///
/// `release` consumes the lease, so the worker cannot release it twice.
pub struct HeldLease {
    coordinator: Arc<LockCoordinator>,
    key: LockKey,
    token: LockToken,
}

impl HeldLease {
    pub fn new(coordinator: Arc<LockCoordinator>, key: LockKey, token: LockToken) -> Self {
        Self {
            coordinator,
            key,
            token,
        }
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    pub async fn release(self) -> bool {
        self.coordinator.release(&self.key, &self.token).await
    }
}

/// Executes work under a wall-clock deadline on an isolated task.
///
/// Every call spawns its own task, so a slow call never queues behind
/// another and the deadline wait is never blocked by unrelated work.
#[derive(Debug, Clone, Default)]
pub struct BoundedExecutionGuard {
    runtime: Option<Handle>,
}

impl BoundedExecutionGuard {
    /// Spawns workers on the runtime the caller is running on
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns workers on a dedicated runtime
    pub fn on_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
        }
    }

    fn runtime(&self) -> Handle {
        self.runtime.clone().unwrap_or_else(Handle::current)
    }

    /// Runs async `work`, waiting at most `deadline` for its outcome.
    pub async fn run<T, E, F, Fut>(
        &self,
        deadline: Duration,
        lease: HeldLease,
        work: F,
    ) -> Outcome<T, E>
    where
        F: FnOnce(CancelSignal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (cancel, signal) = CancelSignal::pair();
        let (reply, outcome) = oneshot::channel();

        self.runtime().spawn(async move {
            let result = AssertUnwindSafe(async move { work(signal).await })
                .catch_unwind()
                .await
                .map_err(panic_message);
            settle(result, lease, reply).await;
        });

        self.await_outcome(deadline, cancel, outcome).await
    }

    /// Runs synchronous `work` on the blocking pool, waiting at most
    /// `deadline` for its outcome.
    pub async fn run_blocking<T, E, F>(
        &self,
        deadline: Duration,
        lease: HeldLease,
        work: F,
    ) -> Outcome<T, E>
    where
        F: FnOnce(CancelSignal) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (cancel, signal) = CancelSignal::pair();
        let (reply, outcome) = oneshot::channel();
        let runtime = self.runtime();

        runtime.clone().spawn(async move {
            let result = runtime
                .spawn_blocking(move || work(signal))
                .await
                .map_err(|e| {
                    if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        "blocking worker was cancelled".to_string()
                    }
                });
            settle(result, lease, reply).await;
        });

        self.await_outcome(deadline, cancel, outcome).await
    }

    async fn await_outcome<T, E>(
        &self,
        deadline: Duration,
        cancel: watch::Sender<bool>,
        outcome: oneshot::Receiver<Outcome<T, E>>,
    ) -> Outcome<T, E> {
        match tokio::time::timeout(deadline, outcome).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                error!("Worker task dropped before reporting, lock record lingers until lease expiry");
                Outcome::Failed(WorkFailure::Panicked(
                    "worker task dropped before completing".to_string(),
                ))
            }
            Err(_) => {
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Deadline exceeded, cancelling protected work"
                );
                let _ = cancel.send(true);
                Outcome::DeadlineExceeded
            }
        }
    }
}

/// Worker completion path: release first, then report.
async fn settle<T, E>(
    result: Result<Result<T, E>, String>,
    lease: HeldLease,
    reply: oneshot::Sender<Outcome<T, E>>,
) {
    let outcome = match result {
        Ok(Ok(value)) => Outcome::Completed(value),
        Ok(Err(e)) => Outcome::Failed(WorkFailure::Declared(e)),
        Err(message) => {
            warn!(key = %lease.key(), panic = %message, "Failed to execute protected work");
            Outcome::Failed(WorkFailure::Panicked(message))
        }
    };

    let key = lease.key().clone();
    let released = lease.release().await;

    if reply.send(outcome).is_err() {
        // The caller already reported a timeout.
        debug!(key = %key, released, "Late worker finished after deadline");
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::testing::CountingStore;

    async fn held(store: &Arc<CountingStore>, key: &str, lease: Duration) -> HeldLease {
        let coordinator = Arc::new(LockCoordinator::new(store.clone()));
        let key = LockKey::from(key);
        let token = coordinator.acquire(&key, lease).await.unwrap();
        HeldLease::new(coordinator, key, token)
    }

    #[tokio::test]
    async fn test_completed_work_releases_before_reporting() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(5)).await;
        let token = lease.token().as_str().to_string();

        let outcome: Outcome<u32, String> = BoundedExecutionGuard::new()
            .run(Duration::from_secs(5), lease, |_| async { Ok(42) })
            .await;

        assert_eq!(outcome, Outcome::Completed(42));
        // Release already happened by the time the outcome is observed.
        assert_eq!(store.released_tokens(), vec![token]);
        assert!(store.inner().is_empty());
    }

    #[tokio::test]
    async fn test_declared_failure_is_captured_and_released() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(5)).await;

        let outcome: Outcome<u32, String> = BoundedExecutionGuard::new()
            .run(Duration::from_secs(5), lease, |_| async {
                Err("insufficient funds".to_string())
            })
            .await;

        assert_eq!(
            outcome,
            Outcome::Failed(WorkFailure::Declared("insufficient funds".to_string()))
        );
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained_and_released() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(5)).await;

        let outcome: Outcome<u32, String> = BoundedExecutionGuard::new()
            .run(Duration::from_secs(5), lease, |_| async {
                let divisor: Option<u32> = None;
                match divisor {
                    Some(d) => Ok(84 / d),
                    None => panic!("worker exploded"),
                }
            })
            .await;

        assert_eq!(
            outcome,
            Outcome::Failed(WorkFailure::Panicked("worker exploded".to_string()))
        );
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_never_returning_work() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(1)).await;

        let started = Instant::now();
        let outcome: Outcome<(), String> = BoundedExecutionGuard::new()
            .run(Duration::from_secs(1), lease, |_| async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .await;

        assert_eq!(outcome, Outcome::DeadlineExceeded);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1100));
        // The worker never finished, so nothing was released yet.
        assert_eq!(store.delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_worker_still_releases_once() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(30)).await;
        let token = lease.token().as_str().to_string();

        let outcome: Outcome<(), String> = BoundedExecutionGuard::new()
            .run(Duration::from_secs(1), lease, |_| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok(())
            })
            .await;
        assert_eq!(outcome, Outcome::DeadlineExceeded);
        assert_eq!(store.delete_calls(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.released_tokens(), vec![token]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_signal_fires_on_deadline() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(30)).await;
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();

        let outcome: Outcome<(), String> = BoundedExecutionGuard::new()
            .run(Duration::from_millis(500), lease, move |cancel| async move {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        flag.store(cancel.is_cancelled(), Ordering::SeqCst);
                        Err("cancelled".to_string())
                    }
                    _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(()),
                }
            })
            .await;
        assert_eq!(outcome, Outcome::DeadlineExceeded);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(observed.load(Ordering::SeqCst));
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_work_completes() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(5)).await;

        let outcome: Outcome<String, String> = BoundedExecutionGuard::new()
            .run_blocking(Duration::from_secs(5), lease, |_| {
                std::thread::sleep(Duration::from_millis(20));
                Ok("done".to_string())
            })
            .await;

        assert_eq!(outcome, Outcome::Completed("done".to_string()));
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_work_times_out_and_releases_later() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(5)).await;

        let started = std::time::Instant::now();
        let outcome: Outcome<(), String> = BoundedExecutionGuard::new()
            .run_blocking(Duration::from_millis(100), lease, |cancel| {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err("stopped".to_string())
            })
            .await;

        assert_eq!(outcome, Outcome::DeadlineExceeded);
        assert!(started.elapsed() < Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.delete_calls(), 1);
        assert!(store.inner().is_empty());
    }

    #[tokio::test]
    async fn test_blocking_panic_is_contained() {
        let store = Arc::new(CountingStore::new());
        let lease = held(&store, "R", Duration::from_secs(5)).await;

        let outcome: Outcome<(), String> = BoundedExecutionGuard::new()
            .run_blocking(Duration::from_secs(5), lease, |_| panic!("bad input"))
            .await;

        assert_eq!(
            outcome,
            Outcome::Failed(WorkFailure::Panicked("bad input".to_string()))
        );
        assert_eq!(store.delete_calls(), 1);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new("owned".to_string())), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic payload");
    }
}
