//! HTTP response types for the dlock server
//!
//! Every protected endpoint answers `200 OK` with the `{code, message, data}`
//! envelope; the lock outcome is carried in `code`.

use std::fmt::Display;

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use tracing::warn;

use dlock_common::error::{self, ErrorCode};
use dlock_core::{Protected, WorkFailure};

/// Generic result wrapper for API responses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Result<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> Result<T> {
    pub fn new(code: i32, message: String, data: T) -> Self {
        Result::<T> {
            code,
            message,
            data,
        }
    }

    pub fn success(data: T) -> Result<T> {
        Result::<T> {
            code: error::SUCCESS.code,
            message: error::SUCCESS.message.to_string(),
            data,
        }
    }

    pub fn http_success(data: impl Serialize) -> HttpResponse {
        HttpResponse::Ok().json(Result::success(data))
    }

    pub fn http_error(code: &ErrorCode<'_>) -> HttpResponse {
        HttpResponse::Ok().json(Result::new(code.code, code.message.to_string(), ()))
    }
}

/// Maps a protected call's result onto the response envelope.
pub fn protected_response<T, E>(result: Protected<T, E>) -> HttpResponse
where
    T: Serialize,
    E: Display,
{
    match result {
        Protected::Value(data) => Result::<T>::http_success(data),
        Protected::Rejected => Result::<()>::http_error(&error::OPERATE_FAILED),
        Protected::DeclaredFailure(failure) => {
            match &failure {
                WorkFailure::Declared(e) => warn!(error = %e, "Failed to execute protected work"),
                WorkFailure::Panicked(msg) => warn!(panic = %msg, "Protected work panicked"),
            }
            Result::<()>::http_error(&error::SYSTEM_ERROR)
        }
        Protected::TimedOut => Result::<()>::http_error(&error::LOCK_EXPIRED),
    }
}
