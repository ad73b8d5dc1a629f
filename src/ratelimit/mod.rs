//! Sliding-window rate limiting and its per-client state.

mod decision;
mod identity;
mod limiter;
mod record;
mod rules;
mod sweeper;
mod window;

pub use decision::Decision;
pub use identity::{ClientId, IdentitySource, SHARED_CLIENT_ID};
pub use limiter::RateLimiter;
pub use record::ClientRecord;
pub use rules::{RateLimitConfig, DEFAULT_PER_DAY, DEFAULT_PER_MINUTE, DEFAULT_PER_SECOND};
pub use sweeper::spawn_sweeper;
pub use window::TimeWindow;
