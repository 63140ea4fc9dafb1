//! Configuration management for the dlock server
//!
//! Sources, lowest priority first: `conf/application.yml`, `DLOCK_`-prefixed
//! environment variables (`DLOCK_DLOCK.STORE=redis`), then command line flags.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment};

use dlock_common::{
    DEFAULT_LEASE_MS, DEFAULT_MAX_INLINE_ARGS, DEFAULT_REAP_INTERVAL_MS, DlockError,
};

use crate::startup::LoggingConfig;

pub const SERVER_ADDRESS_PROPERTY: &str = "server.address";
pub const SERVER_PORT_PROPERTY: &str = "server.port";
pub const STORE_PROPERTY: &str = "dlock.store";
pub const REDIS_URL_PROPERTY: &str = "dlock.redis.url";

pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_DEMO_LEASE_MS: u64 = 15_000;
pub const DEFAULT_DEMO_WORK_MS: u64 = 3_000;

/// Command line arguments for the server
#[derive(Debug, Default, Parser)]
#[command(version, about = "dlock demo server")]
pub struct Cli {
    /// Lock store backend: memory or redis
    #[arg(short = 's', long = "store")]
    pub store: Option<String>,
    #[arg(long = "redis-url", env = "REDIS_URL")]
    pub redis_url: Option<String>,
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    #[arg(short = 'c', long = "config", default_value = "conf/application.yml")]
    pub config_file: String,
}

/// Backend holding the lock records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Memory,
    Redis,
}

impl FromStr for StoreMode {
    type Err = DlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreMode::Memory),
            "redis" => Ok(StoreMode::Redis),
            other => Err(DlockError::ConfigError(format!(
                "unknown {} '{}', expected memory or redis",
                STORE_PROPERTY, other
            ))),
        }
    }
}

impl Display for StoreMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreMode::Memory => write!(f, "memory"),
            StoreMode::Redis => write!(f, "redis"),
        }
    }
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Parses the process arguments and loads every source.
    pub fn new() -> Result<Self, DlockError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> Result<Self, DlockError> {
        let mut config_builder = Config::builder()
            .add_source(config::File::with_name(&args.config_file).required(false))
            .add_source(
                Environment::with_prefix("dlock")
                    .separator(".")
                    .try_parsing(true),
            );

        if let Some(v) = args.store {
            config_builder = config_builder
                .set_override(STORE_PROPERTY, v)
                .map_err(|e| DlockError::ConfigError(e.to_string()))?;
        }
        if let Some(v) = args.redis_url {
            config_builder = config_builder
                .set_override(REDIS_URL_PROPERTY, v)
                .map_err(|e| DlockError::ConfigError(e.to_string()))?;
        }
        if let Some(v) = args.port {
            config_builder = config_builder
                .set_override(SERVER_PORT_PROPERTY, v as i64)
                .map_err(|e| DlockError::ConfigError(e.to_string()))?;
        }

        let app_config = config_builder.build().map_err(|e| {
            DlockError::ConfigError(format!("failed to build configuration: {}", e))
        })?;

        Ok(Configuration { config: app_config })
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS_PROPERTY)
            .unwrap_or("0.0.0.0".to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int(SERVER_PORT_PROPERTY)
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn store_mode(&self) -> Result<StoreMode, DlockError> {
        self.config
            .get_string(STORE_PROPERTY)
            .unwrap_or("memory".to_string())
            .parse()
    }

    pub fn redis_url(&self) -> String {
        self.config
            .get_string(REDIS_URL_PROPERTY)
            .unwrap_or(DEFAULT_REDIS_URL.to_string())
    }

    pub fn key_prefix(&self) -> String {
        self.config
            .get_string("dlock.key.prefix")
            .unwrap_or_default()
    }

    pub fn max_inline_args(&self) -> usize {
        self.config
            .get_int("dlock.key.max-inline-args")
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_MAX_INLINE_ARGS)
    }

    pub fn default_lease(&self) -> Duration {
        self.millis("dlock.lease.default-ms", DEFAULT_LEASE_MS)
    }

    pub fn reap_interval(&self) -> Duration {
        self.millis("dlock.memory.reap-interval-ms", DEFAULT_REAP_INTERVAL_MS)
    }

    pub fn demo_lease(&self) -> Duration {
        self.millis("dlock.demo.lease-ms", DEFAULT_DEMO_LEASE_MS)
    }

    pub fn demo_work(&self) -> Duration {
        self.millis("dlock.demo.work-ms", DEFAULT_DEMO_WORK_MS)
    }

    fn millis(&self, key: &str, default: u64) -> Duration {
        let ms = self
            .config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default);
        Duration::from_millis(ms)
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    /// Config file values win; anything unset falls back to `DLOCK_LOG_*`.
    pub fn logging_config(&self) -> LoggingConfig {
        let env = LoggingConfig::from_env();

        LoggingConfig::from_config(
            self.config
                .get_string("dlock.log.dir")
                .ok()
                .or_else(|| Some(env.log_dir.to_string_lossy().into_owned())),
            self.config
                .get_bool("dlock.log.console")
                .unwrap_or(env.console_output),
            self.config
                .get_bool("dlock.log.file")
                .unwrap_or(env.file_logging),
            self.config
                .get_string("dlock.log.level")
                .unwrap_or(env.level.to_string()),
            self.config
                .get_string("dlock.log.rotation")
                .unwrap_or(format!("{:?}", env.rotation)),
        )
    }
}
