//! Per-client rate limiting for the credential endpoints.
//!
//! Signup and login each allow 5 requests per minute per client IP. The
//! bucket refills one request every 12 seconds. The client IP comes from
//! `X-Forwarded-For`, `X-Real-IP` or `Forwarded`, falling back to the peer
//! address, so the server must be run with connect info.

use std::sync::Arc;
use std::time::Duration;
use governor::middleware::NoOpMiddleware;
use tower_governor::{
    governor::{GovernorConfig, GovernorConfigBuilder},
    key_extractor::SmartIpKeyExtractor,
};

pub use tower_governor::GovernorLayer;

/// Requests allowed per client within `AUTH_WINDOW`.
pub const AUTH_BURST: u32 = 5;
pub const AUTH_WINDOW: Duration = Duration::from_secs(60);

pub type AuthRateLimitConfig = Arc<GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>>;

/// Fresh limiter state for one credential endpoint. Each call returns an
/// independent bucket set, so signup and login are counted separately.
pub fn auth_rate_limit_config() -> AuthRateLimitConfig {
    Arc::new(
        GovernorConfigBuilder::default()
            .period(AUTH_WINDOW / AUTH_BURST)
            .burst_size(AUTH_BURST)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("auth rate limit period and burst are non-zero"),
    )
}
