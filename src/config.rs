//! Configuration management for the front proxy.
//!
//! Options are organized in a small tree mirroring the command line: the
//! rate limit options, the user gating options and the delegate (wrapped
//! proxy) options. Each group
//! can validate itself and be completed into the runtime configuration that
//! the server is built from.
//!
//! ```text
//! Options ──validate()──► Options ──complete()──► CompletedConfig
//!  (flags, env, .env)       (all errors reported)    (compiled regex, quota,
//!                                                     loaded gating rules,
//!                                                     parsed addresses)
//! ```
//!
//! ## Flags
//!
//! | Flag | Env | Default |
//! |------|-----|---------|
//! | `--ratelimit-request-limit` | `FRONT_PROXY_RATELIMIT_REQUEST_LIMIT` | `0` (disabled) |
//! | `--ratelimit-burst-limit` | `FRONT_PROXY_RATELIMIT_BURST_LIMIT` | `5` |
//! | `--ratelimit-exclude-pattern` | `FRONT_PROXY_RATELIMIT_EXCLUDE_PATTERN` | empty |
//! | `--ratelimit-cleanup-interval` | `FRONT_PROXY_RATELIMIT_CLEANUP_INTERVAL` | `60` seconds |
//! | `--ratelimit-idle-timeout` | `FRONT_PROXY_RATELIMIT_IDLE_TIMEOUT` | `60` seconds |
//! | `--enable-user-gating` | `FRONT_PROXY_ENABLE_USER_GATING` | `false` |
//! | `--user-gating-rules` | `FRONT_PROXY_USER_GATING_RULES` | empty (no rules) |
//! | `--bind-address` | `FRONT_PROXY_BIND_ADDRESS` | `0.0.0.0:8443` |
//! | `--upstream-url` | `FRONT_PROXY_UPSTREAM_URL` | `http://127.0.0.1:6443` |
//! | `--username-header` | `FRONT_PROXY_USERNAME_HEADER` | `X-Remote-User` |

use axum::http::{HeaderName, Uri};
use clap::Args;
use governor::Quota;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ProxyError, ProxyResult};
use crate::gate::PatternRules;
use crate::limiter::{bucket, ExclusionPolicy};

/// Default bucket size.
pub const DEFAULT_BURST_LIMIT: u32 = 5;

/// Default seconds between cleanup passes.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Default seconds of inactivity before a user's limiter is evicted.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Per-user rate limit flags.
#[derive(Debug, Clone, Args)]
pub struct RateLimitOptions {
    /// Rate limit requests (per user, per second) when non-zero.
    #[arg(
        long = "ratelimit-request-limit",
        env = "FRONT_PROXY_RATELIMIT_REQUEST_LIMIT",
        default_value_t = 0.0
    )]
    pub request_limit: f64,

    /// Rate limit burst limit (bucket size).
    #[arg(
        long = "ratelimit-burst-limit",
        env = "FRONT_PROXY_RATELIMIT_BURST_LIMIT",
        default_value_t = DEFAULT_BURST_LIMIT
    )]
    pub burst_limit: u32,

    /// Regex for usernames to exclude from rate limiting.
    #[arg(
        long = "ratelimit-exclude-pattern",
        env = "FRONT_PROXY_RATELIMIT_EXCLUDE_PATTERN",
        default_value = ""
    )]
    pub exclude_pattern: String,

    /// Seconds between passes evicting idle limiters.
    #[arg(
        long = "ratelimit-cleanup-interval",
        env = "FRONT_PROXY_RATELIMIT_CLEANUP_INTERVAL",
        value_name = "SECONDS",
        default_value_t = DEFAULT_CLEANUP_INTERVAL_SECS
    )]
    pub cleanup_interval_secs: u64,

    /// Seconds a user may stay idle before their limiter is evicted.
    #[arg(
        long = "ratelimit-idle-timeout",
        env = "FRONT_PROXY_RATELIMIT_IDLE_TIMEOUT",
        value_name = "SECONDS",
        default_value_t = DEFAULT_IDLE_TIMEOUT_SECS
    )]
    pub idle_timeout_secs: u64,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            request_limit: 0.0,
            burst_limit: DEFAULT_BURST_LIMIT,
            exclude_pattern: String::new(),
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

impl RateLimitOptions {
    /// Whether rate limiting is switched on.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.request_limit != 0.0
    }

    /// Collect every problem with these options.
    ///
    /// The exclude pattern is checked even when limiting is disabled, so a
    /// typo is caught before someone turns the limit on.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = ExclusionPolicy::new(&self.exclude_pattern) {
            errors.push(e.to_string());
        }

        if !self.request_limit.is_finite() || self.request_limit < 0.0 {
            errors.push(format!(
                "--ratelimit-request-limit must be zero or a positive number, got {}",
                self.request_limit
            ));
        } else if self.enabled() {
            if self.burst_limit == 0 {
                errors.push("--ratelimit-burst-limit must be at least 1".to_string());
            } else if let Err(e) = bucket::quota(self.request_limit, nonzero(self.burst_limit)) {
                errors.push(e.to_string());
            }
        }

        if self.cleanup_interval_secs == 0 {
            errors.push("--ratelimit-cleanup-interval must be at least 1 second".to_string());
        }

        errors
    }

    /// Build the runtime rate limit configuration.
    ///
    /// Returns `Ok(None)` when the request limit is zero: the middleware is
    /// then left out of the handler chain entirely.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern or rate is invalid.
    pub fn complete(&self) -> ProxyResult<Option<RateLimitConfig>> {
        if !self.enabled() {
            return Ok(None);
        }

        let burst = NonZeroU32::new(self.burst_limit)
            .ok_or_else(|| ProxyError::config("--ratelimit-burst-limit must be at least 1", None))?;

        Ok(Some(RateLimitConfig {
            quota: bucket::quota(self.request_limit, burst)?,
            exclusion: ExclusionPolicy::new(&self.exclude_pattern)?,
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }))
    }
}

/// User gating flags.
#[derive(Debug, Clone, Default, Args)]
pub struct UserGateOptions {
    /// Enable user gating.
    #[arg(
        long = "enable-user-gating",
        env = "FRONT_PROXY_ENABLE_USER_GATING",
        default_value_t = false
    )]
    pub enabled: bool,

    /// File of user name patterns admitted by the gate, one regex per line.
    #[arg(
        long = "user-gating-rules",
        env = "FRONT_PROXY_USER_GATING_RULES",
        value_name = "FILE",
        default_value = ""
    )]
    pub rules_file: String,
}

impl UserGateOptions {
    /// Load the rules when gating is enabled.
    ///
    /// Returns `Ok(None)` when gating is off. An enabled gate without a rules
    /// file starts with no rule set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the rules file cannot be read or
    /// holds an invalid pattern.
    pub fn complete(&self) -> ProxyResult<Option<UserGateConfig>> {
        if !self.enabled {
            return Ok(None);
        }

        let rules = if self.rules_file.is_empty() {
            None
        } else {
            let path = PathBuf::from(&self.rules_file);
            Some(Arc::new(PatternRules::from_file(&path)?))
        };

        Ok(Some(UserGateConfig { rules }))
    }
}

/// Flags for the wrapped proxy.
#[derive(Debug, Clone, Args)]
pub struct DelegateOptions {
    /// Address the proxy listens on.
    #[arg(
        long = "bind-address",
        env = "FRONT_PROXY_BIND_ADDRESS",
        default_value = "0.0.0.0:8443"
    )]
    pub bind_address: String,

    /// Base URL requests are forwarded to.
    #[arg(
        long = "upstream-url",
        env = "FRONT_PROXY_UPSTREAM_URL",
        default_value = "http://127.0.0.1:6443"
    )]
    pub upstream_url: String,

    /// Request header carrying the authenticated user name.
    #[arg(
        long = "username-header",
        env = "FRONT_PROXY_USERNAME_HEADER",
        default_value = "X-Remote-User"
    )]
    pub username_header: String,
}

impl Default for DelegateOptions {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            upstream_url: "http://127.0.0.1:6443".to_string(),
            username_header: "X-Remote-User".to_string(),
        }
    }
}

impl DelegateOptions {
    /// Collect every problem with these options.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.bind_address.parse::<SocketAddr>() {
            errors.push(format!("--bind-address {:?} is invalid: {e}", self.bind_address));
        }

        if let Err(e) = parse_upstream(&self.upstream_url) {
            errors.push(e.to_string());
        }

        if let Err(e) = HeaderName::from_bytes(self.username_header.as_bytes()) {
            errors.push(format!("--username-header {:?} is invalid: {e}", self.username_header));
        }

        errors
    }

    /// Parse into the runtime delegate configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any unparsable value.
    pub fn complete(&self) -> ProxyResult<DelegateConfig> {
        let bind_address = self.bind_address.parse::<SocketAddr>().map_err(|e| {
            ProxyError::config(
                format!("--bind-address {:?} is invalid", self.bind_address),
                Some(Box::new(e)),
            )
        })?;

        let username_header = HeaderName::from_bytes(self.username_header.as_bytes()).map_err(|e| {
            ProxyError::config(
                format!("--username-header {:?} is invalid", self.username_header),
                Some(Box::new(e)),
            )
        })?;

        Ok(DelegateConfig {
            bind_address,
            upstream_url: parse_upstream(&self.upstream_url)?,
            username_header,
        })
    }
}

fn parse_upstream(raw: &str) -> ProxyResult<Uri> {
    let uri = raw.parse::<Uri>().map_err(|e| {
        ProxyError::config(format!("--upstream-url {raw:?} is invalid"), Some(Box::new(e)))
    })?;

    if uri.scheme_str() != Some("http") || uri.authority().is_none() {
        return Err(ProxyError::config(
            format!("--upstream-url {raw:?} must be an absolute http:// URL"),
            None,
        ));
    }

    Ok(uri)
}

fn nonzero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

/// All options of the front proxy.
#[derive(Debug, Clone, Default, Args)]
pub struct Options {
    /// Rate limiting.
    #[command(flatten)]
    pub rate_limit: RateLimitOptions,

    /// User gating.
    #[command(flatten)]
    pub user_gate: UserGateOptions,

    /// Wrapped proxy.
    #[command(flatten)]
    pub delegate: DelegateOptions,
}

impl Options {
    /// Validate every option group, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ValidationError`] listing each invalid option.
    pub fn validate(&self) -> ProxyResult<()> {
        let mut errors = self.rate_limit.validate();
        errors.extend(self.delegate.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProxyError::validation(errors))
        }
    }

    /// Validate and complete into the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or a configuration error from completion.
    pub fn complete(self) -> ProxyResult<CompletedConfig> {
        self.validate()?;

        Ok(CompletedConfig {
            rate_limit: self.rate_limit.complete()?,
            user_gate: self.user_gate.complete()?,
            delegate: self.delegate.complete()?,
        })
    }
}

/// Runtime rate limit settings. Only exists when limiting is enabled.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Refill rate and bucket size.
    pub quota: Quota,
    /// Compiled exclusion pattern.
    pub exclusion: ExclusionPolicy,
    /// Time between cleanup passes.
    pub cleanup_interval: Duration,
    /// Idle time after which a user's limiter is evicted.
    pub idle_timeout: Duration,
}

/// Runtime user gating settings. Only exists when gating is enabled.
#[derive(Debug, Clone)]
pub struct UserGateConfig {
    /// Rules loaded at startup, if a file was given.
    pub rules: Option<Arc<PatternRules>>,
}

/// Runtime settings for the wrapped proxy.
#[derive(Debug, Clone)]
pub struct DelegateConfig {
    /// Listen address.
    pub bind_address: SocketAddr,
    /// Forwarding target.
    pub upstream_url: Uri,
    /// Header carrying the authenticated user.
    pub username_header: HeaderName,
}

/// Validated configuration the server is built from.
#[derive(Debug, Clone)]
pub struct CompletedConfig {
    /// `None` when rate limiting is disabled.
    pub rate_limit: Option<RateLimitConfig>,
    /// `None` when user gating is disabled.
    pub user_gate: Option<UserGateConfig>,
    /// Wrapped proxy settings.
    pub delegate: DelegateConfig,
}
