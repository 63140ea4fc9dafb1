//! File-based logging for the dlock server.
//!
//! | Log File   | Component                      | Target Prefixes                  |
//! |------------|--------------------------------|----------------------------------|
//! | dlock.log  | Root logger (all components)   | (all)                            |
//! | lock.log   | Lock protocol                  | dlock_core                       |
//! | http.log   | HTTP endpoints                 | dlock_server::api, actix_web     |
//!
//! Log files are stored in `~/dlock/logs` by default.
//! Override with `DLOCK_LOG_DIR` environment variable or `dlock.log.dir` config.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "lock.log",
        targets: &["dlock_core"],
    },
    ComponentLogDef {
        file_name: "http.log",
        targets: &["dlock_server::api", "actix_web"],
    },
];

/// Log rotation policy
#[derive(Debug, Clone, Copy)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    /// Parses `daily`, `hourly` or `never`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Some(LogRotation::Daily),
            "hourly" => Some(LogRotation::Hourly),
            "never" => Some(LogRotation::Never),
            _ => None,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/dlock/logs", home))
}

/// Logging configuration for the server.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Base log directory (default: `~/dlock/logs`)
    pub log_dir: PathBuf,
    pub console_output: bool,
    /// Write `dlock.log` and the component files
    pub file_logging: bool,
    pub level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            file_logging: false,
            level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from `DLOCK_LOG_*` environment variables.
    pub fn from_env() -> Self {
        let log_dir = std::env::var("DLOCK_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_log_dir());

        let console_output = std::env::var("DLOCK_LOG_CONSOLE")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let file_logging = std::env::var("DLOCK_LOG_FILE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let level = std::env::var("DLOCK_LOG_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Level::INFO);

        let rotation = std::env::var("DLOCK_LOG_ROTATION")
            .ok()
            .and_then(|v| LogRotation::parse(&v))
            .unwrap_or(LogRotation::Daily);

        Self {
            log_dir,
            console_output,
            file_logging,
            level,
            rotation,
        }
    }

    /// Create from application configuration.
    pub fn from_config(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: String,
        rotation: String,
    ) -> Self {
        Self {
            log_dir: log_dir.map(PathBuf::from).unwrap_or_else(default_log_dir),
            console_output,
            file_logging,
            level: level.parse().unwrap_or(Level::INFO),
            rotation: LogRotation::parse(&rotation).unwrap_or(LogRotation::Daily),
        }
    }
}

/// Keeps the non-blocking file writers alive; dropping it flushes them.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Initialize console and rolling file logging.
///
/// `RUST_LOG` overrides the configured level for the console and root file.
/// Component files route events by target at every level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, "dlock.log");
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(root_filter);
        layers.push(Box::new(root_layer));

        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let mut targets = Targets::new();
            for target in component.targets {
                targets = targets.with_target(*target, LevelFilter::TRACE);
            }

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_filter(targets);
            layers.push(Box::new(layer));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            "File logging initialized: dlock.log (root) + {} component log files",
            COMPONENT_LOGS.len()
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
