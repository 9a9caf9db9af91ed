//! Command-line interface for the front proxy.
//!
//! Parses flags (falling back to `FRONT_PROXY_*` environment variables and a
//! `.env` file), validates them, then builds, prepares and runs the server
//! until Ctrl-C or SIGTERM.
//!
//! # Example
//!
//! ```bash
//! # Forward to a local proxy, 10 requests/s per user, bursts of 20,
//! # service accounts exempt
//! front-proxy \
//!     --upstream-url http://127.0.0.1:6443 \
//!     --ratelimit-request-limit 10 \
//!     --ratelimit-burst-limit 20 \
//!     --ratelimit-exclude-pattern '^system:serviceaccount:'
//! ```

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::server::Server;
use crate::config::Options;
use crate::delegate::ProxyServer;
use crate::error::ProxyResult;

/// Front proxy adding per-user rate limiting
#[derive(Parser, Debug)]
#[command(name = "front-proxy")]
#[command(about = "Front proxy adding per-user rate limiting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    options: Options,
}

/// Parse CLI arguments and run the proxy until shutdown.
///
/// # Errors
///
/// Returns an error if:
/// - Any option is invalid (reported before anything starts)
/// - The listen address cannot be bound
/// - Serving fails
pub async fn run() -> ProxyResult<()> {
    // Load .env file if present (ignore error if file doesn't exist)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.options.complete()?;

    let delegate = ProxyServer::new(&config.delegate)?;
    let prepared = Server::new(config, delegate).prepare_run();

    let shutdown = CancellationToken::new();
    tokio::spawn(forward_signals(shutdown.clone()));

    prepared.run(shutdown).await?;
    info!("Shutdown complete");
    Ok(())
}

/// Cancel `shutdown` on the first Ctrl-C or SIGTERM.
async fn forward_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, stopping");
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["front-proxy"]);
        assert!(cli.is_ok());

        if let Ok(Cli { options }) = cli {
            assert!(!options.rate_limit.enabled());
            assert_eq!(options.rate_limit.burst_limit, 5);
            assert!(options.rate_limit.exclude_pattern.is_empty());
            assert_eq!(options.delegate.username_header, "X-Remote-User");
            assert!(!options.user_gate.enabled);
        }
    }

    #[test]
    fn test_rate_limit_flags() {
        let args = [
            "front-proxy",
            "--ratelimit-request-limit",
            "2.5",
            "--ratelimit-burst-limit",
            "10",
            "--ratelimit-exclude-pattern",
            "^system:",
        ];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());

        if let Ok(Cli { options }) = cli {
            assert!((options.rate_limit.request_limit - 2.5).abs() < f64::EPSILON);
            assert_eq!(options.rate_limit.burst_limit, 10);
            assert_eq!(options.rate_limit.exclude_pattern, "^system:");
        }
    }

    #[test]
    fn test_user_gating_flags() {
        let args = [
            "front-proxy",
            "--enable-user-gating",
            "--user-gating-rules",
            "/etc/front-proxy/rules",
        ];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());

        if let Ok(Cli { options }) = cli {
            assert!(options.user_gate.enabled);
            assert_eq!(options.user_gate.rules_file, "/etc/front-proxy/rules");
        }
    }

    #[test]
    fn test_non_numeric_limit_rejected() {
        let cli = Cli::try_parse_from(["front-proxy", "--ratelimit-burst-limit", "lots"]);
        assert!(cli.is_err());
    }
}
