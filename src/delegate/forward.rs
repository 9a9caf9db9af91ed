//! Forwarding handler: sends every request on to the upstream proxy.

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, uri::PathAndQuery, Uri},
    response::Response,
    Router,
};
use tracing::warn;

use crate::api::middleware::error::ApiError;
use crate::error::{ProxyError, ProxyResult};

/// HTTP client bound to one upstream base URL.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base: Uri,
}

impl Upstream {
    /// Create a client forwarding to `base`.
    ///
    /// Proxy settings from the environment are ignored: the upstream is
    /// always dialled directly.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(base: Uri) -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| ProxyError::config("cannot build upstream client", Some(Box::new(e))))?;

        Ok(Self { client, base })
    }

    /// Rewrite `original` onto the upstream base, keeping path and query.
    fn target(&self, original: &Uri) -> Option<Uri> {
        let prefix = self.base.path().trim_end_matches('/');
        let suffix = original.path_and_query().map_or("/", PathAndQuery::as_str);

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(format!("{prefix}{suffix}").parse().ok()?);
        Uri::from_parts(parts).ok()
    }
}

/// Router sending every path to `upstream`.
pub fn router(upstream: Upstream) -> Router {
    Router::new().fallback(forward).with_state(upstream)
}

async fn forward(
    State(upstream): State<Upstream>,
    request: Request,
) -> Result<Response, ApiError> {
    let target = upstream.target(request.uri()).ok_or_else(|| {
        warn!(uri = %request.uri(), "cannot map request onto upstream");
        ApiError::BadGateway
    })?;

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    headers.remove(header::HOST);

    let mut outgoing = upstream
        .client
        .request(parts.method, target.to_string())
        .headers(headers);
    // Bodiless requests stay bodiless rather than becoming empty chunked ones.
    if body.size_hint().exact() != Some(0) {
        outgoing = outgoing.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let response = outgoing
        .send()
        .await
        .map_err(|e| {
            warn!(error = %e, target = %target, "upstream request failed");
            ApiError::BadGateway
        })?;

    let status = response.status();
    let headers = response.headers().clone();
    let mut forwarded = Response::new(Body::from_stream(response.bytes_stream()));
    *forwarded.status_mut() = status;
    *forwarded.headers_mut() = headers;
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base: &str) -> Option<Upstream> {
        base.parse().ok().and_then(|base| Upstream::new(base).ok())
    }

    #[tokio::test]
    async fn test_target_keeps_path_and_query() {
        let upstream = upstream("http://10.0.0.1:6443");
        let original: Uri = "/clusters/root/api/v1/pods?watch=true"
            .parse()
            .unwrap_or_default();

        let target = upstream.and_then(|u| u.target(&original));
        assert_eq!(
            target.map(|t| t.to_string()),
            Some("http://10.0.0.1:6443/clusters/root/api/v1/pods?watch=true".to_string())
        );
    }

    #[tokio::test]
    async fn test_target_joins_base_path() {
        let upstream = upstream("http://proxy.local/prefix/");
        let original: Uri = "/api".parse().unwrap_or_default();

        let target = upstream.and_then(|u| u.target(&original));
        assert_eq!(
            target.map(|t| t.to_string()),
            Some("http://proxy.local/prefix/api".to_string())
        );
    }
}
