//! Lock protected demo endpoints

use actix_web::{Responder, route, web};
use tracing::info;

use dlock_core::{LockSpec, operation_id};

use crate::model::{AppState, response::protected_response};

/// Explicit key shared by every caller of the timed endpoint
pub const TIMED_LOCK_KEY: &str = "asdfasmmm";

/// Locked under the default key: operation identity plus (empty) arguments.
#[route("/test", method = "GET", method = "POST")]
async fn lock_test(data: web::Data<AppState>) -> impl Responder {
    let spec = LockSpec::new(operation_id!("lock_test")).with_lease(data.default_lease);

    let result = data
        .protector
        .protect(&spec, &(), |_cancel| async {
            Ok::<_, String>(" cc-dd d lock test.")
        })
        .await;

    protected_response(result)
}

/// Locked under an explicit key with a short lease; the work takes a while,
/// so concurrent callers are rejected until it finishes.
#[route("/t", method = "GET", method = "POST")]
async fn timed_lock_test(data: web::Data<AppState>) -> impl Responder {
    let spec = LockSpec::new(operation_id!("timed_lock_test"))
        .with_key(TIMED_LOCK_KEY)
        .with_lease(data.demo.lease);
    let work = data.demo.work;

    let result = data
        .protector
        .protect(&spec, &(), move |cancel| async move {
            info!(work_ms = work.as_millis() as u64, "Start running protected method");
            tokio::select! {
                _ = tokio::time::sleep(work) => {}
                _ = cancel.cancelled() => {
                    return Err("abandoned after the lease expired".to_string());
                }
            }
            info!("End running protected method");
            Ok(" X: timeout supported d lock test.")
        })
        .await;

    protected_response(result)
}
