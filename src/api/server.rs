//! Server assembly and lifecycle.
//!
//! ```text
//! Options ──complete()──► CompletedConfig
//!                              │
//!                   Server::new(config, delegate)          Configured
//!                              │
//!                   Server::prepare_run()                  Prepared
//!                    (rate limit layered around the
//!                     delegate handler iff enabled)
//!                              │
//!                   PreparedServer::run(shutdown)          Running
//!                    (user gate layered outermost iff enabled,
//!                     cleanup task spawned, delegate serving)
//!                              │
//!                   shutdown.cancel()                      ShuttingDown
//!                              │
//!                   run() returns                          Stopped
//! ```

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::middleware::rate_limit::with_rate_limit;
use crate::api::middleware::user_gate::with_user_gate;
use crate::config::CompletedConfig;
use crate::delegate::ProxyServer;
use crate::error::ProxyResult;
use crate::gate::{ReloadableGate, RuleSet, UserGate};
use crate::limiter::{sweeper, RateLimitFilter};

/// Rate limit state of a running server, with its cleanup schedule.
#[derive(Debug, Clone)]
struct RateLimiting {
    filter: Arc<RateLimitFilter>,
    cleanup_interval: Duration,
    idle_timeout: Duration,
}

/// A configured front proxy wrapping `delegate`.
#[derive(Debug)]
pub struct Server {
    delegate: ProxyServer,
    rate_limiting: Option<RateLimiting>,
    user_gate: Option<Arc<dyn UserGate>>,
}

impl Server {
    /// Build the server. Creates the one filter and cache it will use, if
    /// rate limiting is enabled.
    #[must_use]
    pub fn new(config: CompletedConfig, delegate: ProxyServer) -> Self {
        let rate_limiting = config.rate_limit.map(|rate_limit| RateLimiting {
            filter: Arc::new(RateLimitFilter::new(rate_limit.quota, rate_limit.exclusion)),
            cleanup_interval: rate_limit.cleanup_interval,
            idle_timeout: rate_limit.idle_timeout,
        });

        let user_gate = config.user_gate.map(|gate| {
            if gate.rules.is_none() {
                warn!("User gating enabled without rules, all users admitted until rules are loaded");
            }
            let rules = gate.rules.map(|rules| rules as Arc<dyn RuleSet>);
            Arc::new(ReloadableGate::new(rules)) as Arc<dyn UserGate>
        });

        Self {
            delegate,
            rate_limiting,
            user_gate,
        }
    }

    /// Gate requests with `gate` instead of the rules from the configuration,
    /// enabling gating if it was off.
    #[must_use]
    pub fn with_user_gate(mut self, gate: Arc<dyn UserGate>) -> Self {
        self.user_gate = Some(gate);
        self
    }

    /// Compose the handler chain. Nothing is running yet.
    #[must_use]
    pub fn prepare_run(mut self) -> PreparedServer {
        if let Some(rate_limiting) = &self.rate_limiting {
            let handler = std::mem::take(&mut self.delegate.handler);
            self.delegate.handler = with_rate_limit(handler, Arc::clone(&rate_limiting.filter));

            info!(
                quota = ?rate_limiting.filter.cache().quota(),
                exclude_pattern = rate_limiting.filter.exclusion().as_str().unwrap_or(""),
                "Per-user rate limiting enabled"
            );
        } else {
            info!("Per-user rate limiting disabled");
        }

        PreparedServer {
            delegate: self.delegate,
            rate_limiting: self.rate_limiting,
            user_gate: self.user_gate,
        }
    }
}

/// A server whose handler chain is final. Only this can be run.
#[derive(Debug)]
pub struct PreparedServer {
    delegate: ProxyServer,
    rate_limiting: Option<RateLimiting>,
    user_gate: Option<Arc<dyn UserGate>>,
}

impl PreparedServer {
    /// The rate limit filter, when limiting is enabled.
    #[must_use]
    pub fn rate_limit_filter(&self) -> Option<&Arc<RateLimitFilter>> {
        self.rate_limiting.as_ref().map(|r| &r.filter)
    }

    /// The user gate, when gating is enabled.
    #[must_use]
    pub fn user_gate(&self) -> Option<&Arc<dyn UserGate>> {
        self.user_gate.as_ref()
    }

    /// The full handler chain, as [`run`](Self::run) would serve it.
    #[must_use]
    pub fn into_router(mut self) -> Router {
        self.install_user_gate();
        self.delegate.into_router()
    }

    /// Layer the user gate around the rate limited handler.
    fn install_user_gate(&mut self) {
        if let Some(gate) = self.user_gate.take() {
            let handler = std::mem::take(&mut self.delegate.handler);
            self.delegate.handler = with_user_gate(handler, gate);
            info!("User gating enabled");
        }
    }

    /// Start the cleanup task and serve until `shutdown` is cancelled.
    ///
    /// The cleanup task is stopped and joined before this returns, whether
    /// the delegate exits cleanly or with an error.
    ///
    /// # Errors
    ///
    /// Returns whatever error stopped the delegate.
    pub async fn run(mut self, shutdown: CancellationToken) -> ProxyResult<()> {
        self.install_user_gate();

        let cleanup_shutdown = shutdown.child_token();
        let cleanup = self.rate_limiting.map(|r| {
            sweeper::spawn_cleanup(
                Arc::clone(r.filter.cache()),
                r.cleanup_interval,
                r.idle_timeout,
                cleanup_shutdown.clone(),
            )
        });

        let result = self.delegate.run(shutdown).await;

        cleanup_shutdown.cancel();
        if let Some(cleanup) = cleanup {
            if let Err(e) = cleanup.await {
                error!(error = %e, "limiter cleanup task failed");
            }
        }

        result
    }
}
