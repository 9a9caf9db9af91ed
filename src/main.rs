//! CLI entry point for the front proxy.
//!
//! # Architecture Flow
//!
//! ```text
//! main.rs (Runtime + tracing initialization)
//!     ↓
//! CLI Layer (src/cli.rs)
//!     ↓
//! 1. Config Layer (src/config.rs)        → Parse and validate options
//! 2. Delegate (src/delegate)             → Build the wrapped proxy
//! 3. Assembly (src/api/server.rs)        → Layer rate limiting around it
//! 4. Run                                 → Cleanup task + serve until signal
//! ```
//!
//! All errors bubble up via `ProxyResult<T>`.

use front_proxy::{cli, observability};
use tracing::error;

/// Entry point for the front proxy.
///
/// Logging is controlled via environment variables:
/// - `RUST_LOG`: Set log level (e.g., "debug", "info", "trace")
/// - `LOG_JSON`: Enable JSON output for production ("true" or "false")
/// - `LOG_FILE`: Write logs to file with daily rotation
#[tokio::main]
async fn main() {
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let _log_guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
