//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use super::{build_router, AppState};
use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::error::Result;
use crate::ratelimit::{spawn_sweeper, RateLimiter};

/// HTTP server fronting the portfolio API with the rate limiter.
pub struct HttpServer {
    /// Full configuration
    config: GateConfig,
    /// The rate limiter instance
    rate_limiter: Arc<RateLimiter>,
    /// Time source for checks and sweeps
    clock: Arc<dyn Clock>,
    /// Routes nested under `/api`
    api: Option<Router>,
}

impl HttpServer {
    /// Create a new server using the system clock.
    pub fn new(config: GateConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new server with a custom time source.
    ///
    /// Fails if `config` does not pass [`GateConfig::validate`].
    pub fn with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limiting.limits()));
        Ok(Self {
            config,
            rate_limiter,
            clock,
            api: None,
        })
    }

    /// Mount application routes under `/api`, behind the rate limiter.
    pub fn with_api(mut self, api: Router) -> Self {
        self.api = Some(api);
        self
    }

    /// The rate limiter instance.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        self.rate_limiter.clone()
    }

    /// Build the router this server would serve.
    pub fn router(&self) -> Result<Router> {
        let state = Arc::new(AppState::new(
            self.rate_limiter.clone(),
            self.clock.clone(),
            self.config.rate_limiting.identity,
        ));
        build_router(state, &self.config.cors, self.api.clone())
    }

    /// Bind the configured address and serve until `signal` resolves.
    ///
    /// The background sweeper runs for the lifetime of the server and is
    /// stopped once the server has drained.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.server.http_addr;
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.router()?;
        let addr = listener.local_addr()?;
        let limits = self.rate_limiter.limits();

        info!(
            addr = %addr,
            per_second = limits.per_second,
            per_minute = limits.per_minute,
            per_day = limits.per_day,
            identity = ?self.config.rate_limiting.identity,
            "Starting HTTP server"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = spawn_sweeper(
            self.rate_limiter.clone(),
            self.clock.clone(),
            self.config.rate_limiting.sweep_interval(),
            shutdown_rx,
        );

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await;

        let _ = shutdown_tx.send(true);
        if let Err(e) = sweeper.await {
            error!(error = %e, "Rate limit sweeper panicked");
        }

        served.map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e.into()
        })
    }
}
