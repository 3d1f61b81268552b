//! Structured logging for Thermae
//!
//! Tracing-based console and rotating-file output, plus the small
//! per-component logger handle used throughout the crate.

use crate::config::LoggingConfig;
use crate::error::{Result, ThermaeError};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Once;
use tracing::{Level, Subscriber, debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// The non-blocking worker guard must outlive the process, or buffered log
// lines are lost on drop.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INIT_ONCE: Once = Once::new();
static INIT_ERROR: OnceCell<String> = OnceCell::new();

/// Initialize the global subscriber from configuration. Idempotent: only the
/// first call installs anything, later calls return the first outcome.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        if let Err(e) = try_init(config) {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    match INIT_ERROR.get() {
        Some(err) => Err(ThermaeError::config(err.clone())),
        None => Ok(()),
    }
}

fn try_init(config: &LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter = build_env_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    if console_only() {
        registry
            .with(fmt_layer(std::io::stdout, config.json_format, level))
            .init();
        info!("Logging initialized - level: {:?}, console-only", level);
        return Ok(());
    }

    let appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("thermae")
        .filename_suffix("log")
        .max_log_files(config.backup_count as usize)
        .build(log_directory(&config.file))
        .map_err(|e| ThermaeError::io(format!("Failed to create log file appender: {}", e)))?;
    let (writer, guard) = non_blocking(appender);
    let _ = LOG_GUARD.set(guard);

    let with_file = registry.with(fmt_layer(writer, config.json_format, level));
    if config.console_output {
        with_file
            .with(fmt_layer(std::io::stdout, config.json_format, level))
            .init();
    } else {
        with_file.init();
    }

    info!(
        "Logging initialized - level: {:?}, file: {}",
        level, config.file
    );
    Ok(())
}

/// One formatted output layer, console or file, text or JSON
fn fmt_layer<S, W>(writer: W, json: bool, level: Level) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("thermae={},hyper=warn,reqwest=warn", level).into())
}

// File output makes no sense in unit tests or throwaway runs
fn console_only() -> bool {
    cfg!(test) || std::env::var_os("THERMAE_DISABLE_FILE_LOG").is_some()
}

/// The rotation directory: `file` itself if it names a directory, its parent
/// if it names a file
fn log_directory(file: &str) -> &Path {
    let p = Path::new(file);
    if p.extension().is_some() {
        p.parent().unwrap_or(p)
    } else {
        p
    }
}

fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(ThermaeError::config(format!(
            "Invalid log level: {}",
            level_str
        ))),
    }
}

/// Logger handle that tags every message with its component
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn info(&self, message: &str) {
        info!(component = %self.component, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(component = %self.component, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(component = %self.component, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        debug!(component = %self.component, "{}", message);
    }
}

/// Create a logger for a component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger {
        component: component.to_string(),
    }
}
