//! Distributed lock protocol over a shared key-value store
//!
//! A protected operation derives a lock key from its identity and arguments,
//! takes an owner-tokened lease with a single conditional write, runs under a
//! wall-clock deadline equal to the lease, and releases only its own lease
//! through an atomic compare-and-delete.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dlock_core::{LockProtector, LockSpec, MemoryLockStore, Protected, operation_id};
//!
//! # async fn demo() {
//! let protector = LockProtector::new(Arc::new(MemoryLockStore::new()));
//! let spec = LockSpec::new(operation_id!("transfer"));
//!
//! let result: Protected<u64, String> = protector
//!     .protect(&spec, &("alice", 10), |_cancel| async { Ok(10) })
//!     .await;
//! assert!(result.is_value());
//! # }
//! ```

pub mod coordinator;
pub mod fingerprint;
pub mod guard;
pub mod metrics;
pub mod model;
pub mod protect;
pub mod store;

#[cfg(test)]
mod testing;

pub use coordinator::LockCoordinator;
pub use fingerprint::FingerprintResolver;
pub use guard::{BoundedExecutionGuard, CancelSignal, HeldLease};
pub use model::{LockKey, LockSpec, LockToken, OperationId, Outcome, Protected, WorkFailure};
pub use protect::{LockProtector, ProtectedFn};
pub use store::{LockStore, MemoryLockStore, RedisLockStore, StoreError};
