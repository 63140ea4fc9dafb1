//! dlock Common - Shared types and error codes
//!
//! This crate provides the foundational types used across all dlock components:
//! - Error types and error codes
//! - Common constants

pub mod error;

// Re-exports for convenience
pub use error::{DlockError, ErrorCode};

/// Default lease (and deadline) of a protected operation, in milliseconds
pub const DEFAULT_LEASE_MS: u64 = 300_000;

/// Encoded arguments longer than this are digested when building a lock key
pub const DEFAULT_MAX_INLINE_ARGS: usize = 256;

/// Interval of the in-process store's expiry reaper, in milliseconds
pub const DEFAULT_REAP_INTERVAL_MS: u64 = 5_000;
