//! Rate limiting middleware for the HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::AppState;
use crate::ratelimit::Decision;

/// Threshold of the window the other quota headers describe.
pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests left before some window trips.
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Epoch seconds at which the reported window clears.
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Body returned with `429 Too Many Requests`.
#[derive(Debug, Serialize)]
pub struct RateLimitedBody {
    pub ok: bool,
    pub status: &'static str,
    pub message: String,
}

/// Check every request against the limiter before it reaches a handler.
///
/// Admitted requests get quota headers added to the handler's response;
/// rejected ones are answered here with `429`.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = state.identity.resolve(request.headers(), peer);
    let decision = state.limiter.check(&client, state.clock.now_millis());

    if !decision.allowed {
        debug!(
            client = %client,
            window = ?decision.violated_window,
            retry_after_secs = decision.retry_after_secs,
            "Request rate limited"
        );
        return too_many_requests(&decision);
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

/// Build the `429` response for a rejected request.
pub fn too_many_requests(decision: &Decision) -> Response {
    let window = decision
        .violated_window
        .map(|window| window.description())
        .unwrap_or("unknown window");

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedBody {
            ok: false,
            status: "Too Many Requests",
            message: format!("Rate limit exceeded: {}", window),
        }),
    )
        .into_response();
    apply_headers(response.headers_mut(), decision);
    response
}

/// Write the quota headers for `decision`.
pub fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(&X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(&X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(&X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_secs()));
    if let Some(retry_after) = decision.retry_after_header() {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ClientId, RateLimitConfig, RateLimiter};

    const T0: u64 = 1_700_000_000_000;

    #[test]
    fn test_admitted_headers() {
        let limiter = RateLimiter::new(RateLimitConfig::new(5, 50, 5_000));
        let decision = limiter.check(&ClientId::shared(), T0);

        let mut headers = HeaderMap::new();
        apply_headers(&mut headers, &decision);

        assert_eq!(headers[&X_RATELIMIT_LIMIT], "5000");
        assert_eq!(headers[&X_RATELIMIT_REMAINING], "4");
        assert_eq!(headers[&X_RATELIMIT_RESET], "1700086400");
        assert!(headers.get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_rejected_response() {
        let limiter = RateLimiter::new(RateLimitConfig::new(1, 50, 5_000));
        limiter.check(&ClientId::shared(), T0);
        let decision = limiter.check(&ClientId::shared(), T0 + 200);

        let response = too_many_requests(&decision);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers[&X_RATELIMIT_LIMIT], "1");
        assert_eq!(headers[&X_RATELIMIT_REMAINING], "0");
        assert_eq!(headers[header::RETRY_AFTER], "1");
        // Retry at T0 + 1200ms, rounded up to whole seconds.
        assert_eq!(headers[&X_RATELIMIT_RESET], "1700000002");
    }
}
