//! Observability and structured logging infrastructure.
//!
//! Logging uses the tracing framework with key-value fields, so the rate
//! limiter's decisions (`user`, `evicted`, `remaining`) can be filtered and
//! aggregated.
//!
//! # Usage
//!
//! Initialize tracing at process start and keep the returned guard alive:
//!
//! ```no_run
//! use front_proxy::observability;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _guard = observability::init_tracing(None, None, false)?;
//!
//!     // Run the proxy...
//!     Ok(())
//! }
//! ```
//!
//! # Environment Configuration
//!
//! ```bash
//! # Set log level for all modules
//! RUST_LOG=debug front-proxy
//!
//! # See every limiter creation and denial
//! RUST_LOG=front_proxy::limiter=debug,front_proxy::api=debug front-proxy
//!
//! # Enable JSON output for production
//! LOG_JSON=true front-proxy
//!
//! # Write logs to file with daily rotation
//! LOG_FILE=./logs/front-proxy.log front-proxy
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber with configurable output formats.
///
/// # Arguments
///
/// * `log_level` - Optional filter directive (e.g., "debug", "info").
///   `RUST_LOG` takes precedence when set.
/// * `log_file` - Optional file path for log output with daily rotation.
/// * `json_output` - JSON console output when true, pretty-printed otherwise.
///
/// # Defaults
///
/// `info` for this crate, `warn` for dependencies, pretty console output,
/// no file.
///
/// Returns the file writer's guard when `log_file` is set. Buffered lines are
/// flushed when it is dropped, so hold it until the process exits.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else if let Some(level) = log_level {
        EnvFilter::new(level)
    } else {
        // Default: info for our app, warn for dependencies
        EnvFilter::new("front_proxy=info,warn")
    };

    let (subscriber, guard) = build_subscriber(env_filter, log_file.as_deref(), json_output)?;
    subscriber.try_init()?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized successfully"
    );

    Ok(guard)
}

/// Assemble the subscriber without installing it.
fn build_subscriber(
    env_filter: EnvFilter,
    log_file: Option<&Path>,
    json_output: bool,
) -> std::io::Result<(impl Subscriber + Send + Sync, Option<WorkerGuard>)> {
    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("front-proxy.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // File always uses JSON for structured log analysis
        let layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    Ok((subscriber, guard))
}
