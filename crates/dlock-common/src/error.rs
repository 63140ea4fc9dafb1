//! Error types and error codes for dlock
//!
//! This module defines:
//! - `DlockError`: Application-specific error enum
//! - `ErrorCode`: Structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum DlockError {
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

/// The protected operation is currently held by another caller.
pub const OPERATE_FAILED: ErrorCode<'static> = ErrorCode {
    code: 40001,
    message: "operation rejected, please do not operate frequently",
};

/// The protected operation itself failed.
pub const SYSTEM_ERROR: ErrorCode<'static> = ErrorCode {
    code: 50000,
    message: "system error",
};

/// The protected operation outlived its lease and was abandoned.
pub const LOCK_EXPIRED: ErrorCode<'static> = ErrorCode {
    code: 50001,
    message: "system error: lock expired",
};
