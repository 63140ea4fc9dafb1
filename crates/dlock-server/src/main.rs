//! Main entry point for the dlock demo server.

use std::sync::Arc;

use dlock_server::{
    model::{AppState, Configuration},
    startup,
};
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    dlock_core::metrics::describe_metrics();

    let store = startup::build_store(&configuration).await?;

    let server_address = configuration.server_address();
    let server_port = configuration.server_port();
    let app_state = Arc::new(AppState::new(configuration, store));

    info!(
        address = %server_address,
        port = server_port,
        backend = app_state.protector.coordinator().store().backend(),
        default_lease_ms = app_state.default_lease.as_millis() as u64,
        "Starting dlock server"
    );

    startup::dlock_server(app_state, server_address, server_port)?.await?;

    info!("dlock server stopped");
    Ok(())
}
