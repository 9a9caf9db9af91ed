//! Authenticated user identity.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;

use crate::api::middleware::error::ApiError;

/// The principal an authentication layer attached to a request.
///
/// Stored in the request extensions. Everything downstream of
/// authentication treats it as read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// User name, opaque to the proxy.
    pub name: String,
}

impl UserInfo {
    /// Create an identity for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The identity attached to `request`, if any.
    #[must_use]
    pub fn from_request(request: &Request) -> Option<&Self> {
        request.extensions().get::<Self>()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserInfo
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(ApiError::MissingUser)
    }
}
