pub mod http;
pub mod logging;
pub mod store;

pub use http::dlock_server;
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use store::build_store;
