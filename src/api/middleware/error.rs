//! Error responses produced by the proxy itself.
//!
//! Bodies are plain text, the way an API server's own errors look to
//! command-line clients.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Seconds a throttled client is asked to wait.
pub const RETRY_AFTER_SECS: &str = "1";

/// Request-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The user's token bucket is empty.
    TooManyRequests,
    /// No authenticated user reached a handler that requires one.
    MissingUser,
    /// The request carried no usable identity.
    Unauthorized,
    /// The upstream proxy could not be reached.
    BadGateway,
}

impl ApiError {
    /// Status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::MissingUser => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    const fn message(&self) -> &'static str {
        match self {
            Self::TooManyRequests => "Too many requests, please try again later.\n",
            Self::MissingUser => "Internal error: no user found for request.\n",
            Self::Unauthorized => "Unauthorized\n",
            Self::BadGateway => "Upstream unavailable\n",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.message()).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        if self == Self::TooManyRequests {
            headers.insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_requests_sets_retry_after() {
        let response = ApiError::TooManyRequests.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from_static("1"))
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain; charset=utf-8"))
        );
    }

    #[test]
    fn test_other_errors_have_no_retry_after() {
        for err in [ApiError::MissingUser, ApiError::Unauthorized, ApiError::BadGateway] {
            let status = err.status();
            let response = err.into_response();
            assert_eq!(response.status(), status);
            assert!(response.headers().get(header::RETRY_AFTER).is_none());
        }
    }
}
