// Metrics for the lock protocol
// Recorded through the `metrics` facade; the host process installs a recorder.

use metrics::{counter, describe_counter};

pub const ACQUIRE_TOTAL: &str = "dlock_acquire_total";
pub const RELEASE_TOTAL: &str = "dlock_release_total";
pub const PROTECT_TOTAL: &str = "dlock_protect_total";

/// Register metric descriptions, called once at startup
pub fn describe_metrics() {
    describe_counter!(
        ACQUIRE_TOTAL,
        "Lock acquisition attempts by result (acquired, contended, error)"
    );
    describe_counter!(
        RELEASE_TOTAL,
        "Lock release attempts by result (released, not_owner, error)"
    );
    describe_counter!(
        PROTECT_TOTAL,
        "Protected calls by caller-visible result"
    );
}

pub fn record_acquire(result: &'static str) {
    counter!(ACQUIRE_TOTAL, "result" => result).increment(1);
}

pub fn record_release(result: &'static str) {
    counter!(RELEASE_TOTAL, "result" => result).increment(1);
}

pub fn record_protect(result: &'static str) {
    counter!(PROTECT_TOTAL, "result" => result).increment(1);
}
