// Shared state injected into every handler

use std::sync::Arc;
use std::time::Duration;

use dlock_core::{FingerprintResolver, LockProtector, LockStore};

use super::config::Configuration;

/// Lease and work duration of the timed demo endpoint
#[derive(Debug, Clone, Copy)]
pub struct DemoSettings {
    pub lease: Duration,
    pub work: Duration,
}

pub struct AppState {
    pub configuration: Configuration,
    pub protector: LockProtector,
    pub default_lease: Duration,
    pub demo: DemoSettings,
}

impl AppState {
    pub fn new(configuration: Configuration, store: Arc<dyn LockStore>) -> Self {
        let resolver = FingerprintResolver::new()
            .with_prefix(configuration.key_prefix())
            .with_max_inline_args(configuration.max_inline_args());
        let protector = LockProtector::new(store).with_resolver(resolver);

        AppState {
            default_lease: configuration.default_lease(),
            demo: DemoSettings {
                lease: configuration.demo_lease(),
                work: configuration.demo_work(),
            },
            configuration,
            protector,
        }
    }
}
