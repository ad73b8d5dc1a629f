//! HTTP surface: router, rate limiting middleware and server.

mod middleware;
mod routes;
mod server;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clock::Clock;
use crate::config::CorsConfig;
use crate::error::{GateError, Result};
use crate::ratelimit::{IdentitySource, RateLimiter};

pub use middleware::{
    apply_headers, rate_limit, too_many_requests, RateLimitedBody, X_RATELIMIT_LIMIT,
    X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use server::HttpServer;

/// State shared by the middleware and handlers.
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub clock: Arc<dyn Clock>,
    pub identity: IdentitySource,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>, identity: IdentitySource) -> Self {
        Self {
            limiter,
            clock,
            identity,
            started_at: Instant::now(),
        }
    }
}

/// Build the application router.
///
/// `api`, when given, is nested under `/api`. Every route, including the
/// nested ones, passes through the rate limiter; CORS preflights are
/// answered before it.
pub fn build_router(state: Arc<AppState>, cors: &CorsConfig, api: Option<Router>) -> Result<Router> {
    let mut router = Router::new()
        .route("/", get(routes::welcome))
        .route("/health", get(routes::live))
        .route("/health/ready", get(routes::ready))
        .with_state(state.clone());

    if let Some(api) = api {
        router = router.nest("/api", api);
    }

    let mut router = router.layer(axum::middleware::from_fn_with_state(state, rate_limit));

    if let Some(cors) = cors_layer(cors)? {
        router = router.layer(cors);
    }

    Ok(router.layer(TraceLayer::new_for_http()))
}

/// CORS policy for the configured origins, or `None` when no origin is
/// configured.
pub fn cors_layer(config: &CorsConfig) -> Result<Option<CorsLayer>> {
    if config.allowed_origins.is_empty() {
        return Ok(None);
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| GateError::Config(format!("Invalid CORS origin {:?}: {}", origin, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let layer = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([
            X_RATELIMIT_LIMIT.clone(),
            X_RATELIMIT_REMAINING.clone(),
            X_RATELIMIT_RESET.clone(),
            header::RETRY_AFTER,
        ])
        .allow_credentials(config.allow_credentials);

    Ok(Some(layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_disabled_without_origins() {
        assert!(cors_layer(&CorsConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_cors_rejects_invalid_origin() {
        let config = CorsConfig {
            allowed_origins: vec!["https://bad\norigin".to_string()],
            allow_credentials: true,
        };
        assert!(matches!(cors_layer(&config), Err(GateError::Config(_))));
    }
}
