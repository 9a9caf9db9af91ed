//! Request-header authentication.
//!
//! Trusts a header set by the authenticating edge in front of the proxy and
//! turns it into a [`UserInfo`] extension.

use axum::{
    extract::{Request, State},
    http::HeaderName,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::middleware::error::ApiError;
use crate::api::user::UserInfo;

/// Attach the user named in `header`, or reject with 401.
pub async fn authenticate(
    State(header): State<HeaderName>,
    mut request: Request,
    next: Next,
) -> Response {
    let name = request
        .headers()
        .get(&header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned);

    let Some(name) = name else {
        debug!(header = %header, "request carries no user");
        return ApiError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(UserInfo::new(name));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|user: UserInfo| async move { user.name }))
            .layer(middleware::from_fn_with_state(
                HeaderName::from_static("x-remote-user"),
                authenticate,
            ))
    }

    #[tokio::test]
    async fn test_header_becomes_user() {
        let request = Request::builder()
            .uri("/")
            .header("X-Remote-User", "alice")
            .body(Body::empty())
            .unwrap_or_default();

        let response = app().oneshot(request).await;
        assert!(matches!(response, Ok(r) if r.status() == StatusCode::OK));
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_rejected() {
        for value in [None, Some("   ")] {
            let mut builder = Request::builder().uri("/");
            if let Some(value) = value {
                builder = builder.header("X-Remote-User", value);
            }
            let request = builder.body(Body::empty()).unwrap_or_default();

            let response = app().oneshot(request).await;
            assert!(matches!(response, Ok(r) if r.status() == StatusCode::UNAUTHORIZED));
        }
    }
}
