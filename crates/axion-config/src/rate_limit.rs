//! Rate limiting configuration for dispatched API calls.
//!
//! The limiter is a fixed-window counter kept in the shared key-value store,
//! so every instance behind a load balancer sees the same counts.
//!
//! # Configuration
//!
//! - `API_RATE_LIMIT_MAX`: Requests allowed per window for one `ip:module:function` (default: 120)
//! - `API_RATE_LIMIT_WINDOW_SEC`: Window length in seconds (default: 60)
//! - `RATE_LIMIT_FAIL_OPEN`: Let requests through when the store is unreachable (default: false)
//!
//! # Rate Limiting Strategy
//!
//! - Time is cut into buckets of `window_secs`
//! - Each request increments the counter for its bucket
//! - Counters expire after two windows
//! - Requests are rejected once the bucket count exceeds `max_requests`
//!
//! # Example
//!
//! ```ignore
//! use axion_config::RateLimitConfig;
//!
//! let config = RateLimitConfig::from_env();
//! let bucket = config.bucket(now_secs);
//! ```

use crate::duration::env_bool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per key per window.
    pub max_requests: u64,

    /// Window length in seconds.
    pub window_secs: u64,

    /// When the counter store fails, pass the request instead of rejecting it.
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window_secs: 60,
            fail_open: false,
        }
    }
}

impl RateLimitConfig {
    /// Creates a new `RateLimitConfig` from environment variables.
    ///
    /// Falls back to default values if environment variables are not set,
    /// cannot be parsed, or are zero.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_requests: std::env::var("API_RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(120),
            window_secs: std::env::var("API_RATE_LIMIT_WINDOW_SEC")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(60),
            fail_open: env_bool("RATE_LIMIT_FAIL_OPEN", false),
        }
    }

    /// Index of the fixed window containing `now_secs`.
    #[must_use]
    pub fn bucket(&self, now_secs: i64) -> i64 {
        now_secs.div_euclid(self.window_secs.max(1) as i64)
    }

    /// TTL applied to a bucket counter.
    #[must_use]
    pub fn counter_ttl_secs(&self) -> u64 {
        self.window_secs * 2
    }
}
