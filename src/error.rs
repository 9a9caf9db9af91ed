//! Error types for the front proxy.
//!
//! This module provides a unified error type [`ProxyError`] for everything that
//! can go wrong while configuring, assembling and running the proxy. Errors
//! raised while serving an individual request are expressed separately as
//! [`ApiError`](crate::api::middleware::error::ApiError), which renders an
//! HTTP response instead of bubbling up.
//!
//! # Design
//!
//! The error hierarchy is organized by phase:
//! - [`ProxyError::ConfigError`]: a single malformed option or value
//! - [`ProxyError::ValidationError`]: every problem found by option validation
//! - [`ProxyError::ServerError`]: binding or serving failures
//!
//! # Example
//!
//! ```
//! use front_proxy::error::{ProxyError, ProxyResult};
//!
//! fn validate_burst(burst: u32) -> ProxyResult<()> {
//!     if burst == 0 {
//!         return Err(ProxyError::config("burst limit must be at least 1", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`ProxyError`].
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Boxed source error carried by [`ProxyError`] variants.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the front proxy.
#[derive(Debug)]
pub enum ProxyError {
    /// A configuration value could not be parsed or is out of range.
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Option validation failed.
    ///
    /// Validation collects every problem before reporting, so operators can
    /// fix all flags in one go.
    ValidationError {
        /// One message per invalid option
        errors: Vec<String>,
    },

    /// The listener could not be bound or the serve loop failed.
    ServerError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },
}

impl ProxyError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use front_proxy::error::ProxyError;
    ///
    /// let err = ProxyError::config("invalid bind address", None);
    /// assert!(matches!(err, ProxyError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a validation error from the collected messages.
    #[must_use]
    pub const fn validation(errors: Vec<String>) -> Self {
        Self::ValidationError { errors }
    }

    /// Create a new server error.
    #[must_use]
    pub fn server(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ServerError {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::ValidationError { errors } => {
                write!(f, "Invalid options: {}", errors.join("; "))
            }
            Self::ServerError { message, .. } => write!(f, "Server error: {message}"),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. } | Self::ServerError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::ValidationError { .. } => None,
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::ServerError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
