//! # Front Proxy
//!
//! A front proxy that wraps a multi-cluster control-plane proxy and adds
//! per-user request throttling.
//!
//! ## Features
//!
//! - **Per-user token buckets** created lazily on a user's first request
//! - **Idle eviction** by a background task tied to the server's lifetime
//! - **Regex exemption** for users who must never be throttled
//! - **Optional user gating** turning away users a rule set does not admit
//! - **Zero overhead when disabled**: with a request limit of 0 the
//!   middleware is not part of the handler chain at all
//!
//! ## Architecture
//!
//! 1. **Config Layer** ([`config`]) - Flags, validation, completion
//! 2. **Limiter Layer** ([`limiter`]) - Token buckets, cache, exclusion, cleanup
//! 3. **Gate** ([`gate`]) - Admission rule sets
//! 4. **HTTP Layer** ([`api`]) - Middleware and server assembly
//! 5. **Delegate** ([`delegate`]) - The wrapped proxy: auth, forwarding, serving
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use front_proxy::{api::server::Server, config::Options, delegate::ProxyServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut options = Options::default();
//!     options.rate_limit.request_limit = 10.0;
//!     let config = options.complete()?;
//!
//!     let delegate = ProxyServer::new(&config.delegate)?;
//!     let prepared = Server::new(config, delegate).prepare_run();
//!     prepared.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`error::ProxyResult<T>`](error::ProxyResult).
//! Per-request failures become HTTP responses via
//! [`ApiError`](api::middleware::error::ApiError).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod delegate;
pub mod error;
pub mod gate;
pub mod limiter;
pub mod observability;
