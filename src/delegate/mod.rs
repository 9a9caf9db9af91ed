//! The wrapped proxy server.
//!
//! A deliberately small stand-in for a multi-cluster control-plane proxy. It
//! exposes the two things the front proxy composes against:
//!
//! - a mutable [`ProxyServer::handler`] that wrappers are layered around
//!   before the server starts, and
//! - [`ProxyServer::run`], which installs the default handler chain around
//!   whatever handler is in place and serves until cancelled.
//!
//! The default chain, outermost first:
//!
//! ```text
//! TraceLayer ─► authenticate (username header) ─► log_requests ─► handler
//! ```

pub mod auth;
pub mod forward;

use axum::{http::HeaderName, middleware, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::middleware::logging::log_requests;
use crate::config::DelegateConfig;
use crate::error::{ProxyError, ProxyResult};

/// The wrapped proxy.
#[derive(Debug)]
pub struct ProxyServer {
    /// Innermost handler. Replace it to wrap the proxy's routing.
    pub handler: Router,
    bind_address: SocketAddr,
    username_header: HeaderName,
}

impl ProxyServer {
    /// Create a proxy forwarding to the configured upstream.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the upstream client cannot be built.
    pub fn new(config: &DelegateConfig) -> ProxyResult<Self> {
        let upstream = forward::Upstream::new(config.upstream_url.clone())?;
        Ok(Self::with_handler(config, forward::router(upstream)))
    }

    /// Create a proxy serving `handler` instead of forwarding.
    #[must_use]
    pub fn with_handler(config: &DelegateConfig, handler: Router) -> Self {
        Self {
            handler,
            bind_address: config.bind_address,
            username_header: config.username_header.clone(),
        }
    }

    /// The handler with the default chain installed around it.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.handler
            .layer(middleware::from_fn(log_requests))
            .layer(middleware::from_fn_with_state(
                self.username_header,
                auth::authenticate,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns a server error if the address cannot be bound or serving fails.
    pub async fn run(self, shutdown: CancellationToken) -> ProxyResult<()> {
        let addr = self.bind_address;
        let app = self.into_router();

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            ProxyError::server(format!("failed to bind {addr}"), Some(Box::new(e)))
        })?;

        info!(addr = %addr, "Starting proxy server");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Proxy server stopped");
        Ok(())
    }
}
