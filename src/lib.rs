//! Portfolio Gate - rate limited edge for a portfolio content API
//!
//! This crate fronts the portfolio API with an in-memory sliding-window rate
//! limiter. Every client gets a per-second, per-minute and per-day budget;
//! quota status is reported through `X-RateLimit-*` headers and exhausted
//! clients receive `429 Too Many Requests`.

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
