//! Per-user rate limiting middleware.
//!
//! Must sit inside the authentication layer, so the user is already known,
//! and outside the delegate's routing.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use governor::clock::Clock;
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::middleware::error::ApiError;
use crate::api::user::UserInfo;
use crate::limiter::{Decision, RateLimitFilter};

/// Wrap `handler` so every request is checked against `filter`.
pub fn with_rate_limit<C>(handler: Router, filter: Arc<RateLimitFilter<C>>) -> Router
where
    C: Clock + Send + Sync + 'static,
{
    handler.layer(middleware::from_fn_with_state(filter, rate_limit::<C>))
}

/// Rate limiting middleware.
///
/// Requests without an authenticated user are rejected with a 500: the
/// authentication layer guarantees one, so its absence is a wiring bug and
/// the request is not let through.
pub async fn rate_limit<C>(
    State(filter): State<Arc<RateLimitFilter<C>>>,
    request: Request,
    next: Next,
) -> Response
where
    C: Clock + Send + Sync + 'static,
{
    let Some(user) = UserInfo::from_request(&request) else {
        error!(proxy = "ratelimiter", "can't detect user from request");
        return ApiError::MissingUser.into_response();
    };

    match filter.check(&user.name) {
        Decision::Denied => {
            debug!(user = %user.name, "rate limit exceeded");
            ApiError::TooManyRequests.into_response()
        }
        Decision::Exempt | Decision::Allowed => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::ExclusionPolicy;
    use axum::{body::Body, http::StatusCode, routing::get};
    use governor::clock::FakeRelativeClock;
    use governor::Quota;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn app(
        pattern: &str,
        hits: Arc<AtomicUsize>,
    ) -> (Router, Arc<RateLimitFilter<FakeRelativeClock>>) {
        let quota = Quota::per_second(NonZeroU32::new(1).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(2).unwrap_or(NonZeroU32::MIN));
        let exclusion = ExclusionPolicy::new(pattern).unwrap_or_default();
        let filter = Arc::new(RateLimitFilter::with_clock(
            quota,
            exclusion,
            FakeRelativeClock::default(),
        ));

        let inner = Router::new().route(
            "/",
            get(move || {
                hits.fetch_add(1, Ordering::SeqCst);
                async { "ok" }
            }),
        );
        (with_rate_limit(inner, Arc::clone(&filter)), filter)
    }

    fn request(user: Option<&str>) -> Request {
        let mut request = Request::new(Body::empty());
        if let Some(user) = user {
            request.extensions_mut().insert(UserInfo::new(user));
        }
        request
    }

    #[tokio::test]
    async fn test_denies_after_burst() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (app, _) = app("", Arc::clone(&hits));

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let response = app.clone().oneshot(request(Some("alice"))).await;
            statuses.push(response.map(|r| r.status()).unwrap_or(StatusCode::IM_A_TEAPOT));
        }

        assert_eq!(
            statuses,
            [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_user_fails_closed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (app, filter) = app("", Arc::clone(&hits));

        let response = app.oneshot(request(None)).await;
        assert!(matches!(response, Ok(r) if r.status() == StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(filter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_exempt_user_bypasses_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (app, filter) = app("^system:", Arc::clone(&hits));

        for _ in 0..20 {
            let response = app.clone().oneshot(request(Some("system:admin"))).await;
            assert!(matches!(response, Ok(r) if r.status() == StatusCode::OK));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 20);
        assert!(filter.cache().is_empty());
    }
}
