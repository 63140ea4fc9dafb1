pub mod app_state;
pub mod config;
pub mod response;

pub use app_state::{AppState, DemoSettings};
pub use config::{Cli, Configuration, StoreMode};
