//! Lock coordination data model
//!
//! Keys and tokens are thin newtypes so the compiler keeps a resource name
//! from ever being passed where an ownership proof is expected.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dlock_common::DEFAULT_LEASE_MS;

/// String identifying the contended resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LockKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LockKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LockKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Single-use random value proving one acquisition owns the current record.
///
/// 128 random bits rendered as 32 lowercase hex characters. A fresh token is
/// generated for every acquisition attempt and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(const_hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LockToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully qualified identity of a protected operation (`module::path::name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(module_path: &str, name: &str) -> Self {
        Self(format!("{}::{}", module_path, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds an [`OperationId`] qualified by the calling module's path.
///
/// ```
/// let op = dlock_core::operation_id!("transfer");
/// assert!(op.as_str().ends_with("::transfer"));
/// ```
#[macro_export]
macro_rules! operation_id {
    ($name:expr) => {
        $crate::OperationId::new(module_path!(), $name)
    };
}

/// Lock declaration attached to a protected operation.
///
/// An absent or empty `key` means the key is derived from the operation
/// identity and its arguments; an explicit key must be globally unique.
/// The lease is both the store-side expiry and the execution deadline, so
/// the protected work must be able to finish within it.
#[derive(Debug, Clone)]
pub struct LockSpec {
    pub operation: OperationId,
    pub key: Option<String>,
    pub lease: Duration,
}

impl LockSpec {
    pub fn new(operation: OperationId) -> Self {
        Self {
            operation,
            key: None,
            lease: Duration::from_millis(DEFAULT_LEASE_MS),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn explicit_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Why a unit of protected work did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkFailure<E> {
    /// The work returned its own error
    Declared(E),
    /// The work panicked or its task was torn down
    Panicked(String),
}

impl<E: Display> Display for WorkFailure<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkFailure::Declared(e) => write!(f, "{}", e),
            WorkFailure::Panicked(msg) => write!(f, "protected work panicked: {}", msg),
        }
    }
}

/// Result of running one unit of work under a deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Completed(T),
    Failed(WorkFailure<E>),
    DeadlineExceeded,
}

/// Caller-visible result of a protected call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protected<T, E> {
    Value(T),
    /// Another holder owns the lock (or the store could not be reached)
    Rejected,
    DeclaredFailure(WorkFailure<E>),
    TimedOut,
}

impl<T, E> Protected<T, E> {
    /// Stable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Protected::Value(_) => "value",
            Protected::Rejected => "rejected",
            Protected::DeclaredFailure(_) => "declared_failure",
            Protected::TimedOut => "timed_out",
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Protected::Value(_))
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Protected::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Protected<T, E> {
    fn from(outcome: Outcome<T, E>) -> Self {
        match outcome {
            Outcome::Completed(v) => Protected::Value(v),
            Outcome::Failed(failure) => Protected::DeclaredFailure(failure),
            Outcome::DeadlineExceeded => Protected::TimedOut,
        }
    }
}
