//! Application Configuration
//!
//! Configuration for the limiter application layer. Built once at startup and
//! shared read-only afterwards.

use crate::domain::services::{idle_ttl, ttl_millis};
use crate::domain::value_objects::TokenBucketParams;
use crate::error::{LimiterError, LimiterResult};
use std::str::FromStr;
use std::time::Duration;

/// How the fixed window applies its expiration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixedWindowMode {
    /// `INCR`, then `PEXPIRE NX` when the count is 1
    ///
    /// A failure between the two steps leaves the counter without a TTL.
    #[default]
    TwoStep,
    /// One script doing both, which also repairs counters missing a TTL
    Atomic,
}

impl FromStr for FixedWindowMode {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-step" | "two_step" | "twostep" => Ok(FixedWindowMode::TwoStep),
            "atomic" | "script" => Ok(FixedWindowMode::Atomic),
            other => Err(LimiterError::InvalidConfig(format!(
                "unknown fixed window mode {other:?} (expected \"two-step\" or \"atomic\")"
            ))),
        }
    }
}

/// Fixed-window limiter configuration
#[derive(Debug, Clone)]
pub struct FixedWindowConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Window length, counted from the first request
    pub window_ttl: Duration,
    pub mode: FixedWindowMode,
}

impl Default for FixedWindowConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window_ttl: Duration::from_secs(10),
            mode: FixedWindowMode::TwoStep,
        }
    }
}

/// Token-bucket limiter configuration
#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    /// Bucket capacity
    pub max_tokens: u32,
    /// Tokens per second
    pub refill_rate: f64,
    /// Minimum lifetime of an idle client's bucket keys
    pub idle_ttl: Duration,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            max_tokens: 5,
            refill_rate: 1.0, // 1 token per second
            idle_ttl: Duration::from_secs(60),
        }
    }
}

impl TokenBucketConfig {
    pub fn params(&self) -> TokenBucketParams {
        TokenBucketParams::new(self.max_tokens, self.refill_rate)
    }
}

/// Limiter application configuration
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub fixed_window: FixedWindowConfig,
    pub token_bucket: TokenBucketConfig,
    /// Bound on each store round trip made while deciding
    pub store_timeout: Duration,
    /// Bound on the health endpoint's store ping
    pub health_timeout: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            fixed_window: FixedWindowConfig::default(),
            token_bucket: TokenBucketConfig::default(),
            store_timeout: Duration::from_secs(2),
            health_timeout: Duration::from_secs(2),
        }
    }
}

impl LimiterConfig {
    /// Reject parameter combinations the algorithms are not defined for
    pub fn validate(self) -> LimiterResult<Self> {
        let invalid = |msg: &str| Err(LimiterError::InvalidConfig(msg.to_string()));

        if self.fixed_window.max_requests == 0 {
            return invalid("fixed window max requests must be greater than 0");
        }
        if self.fixed_window.window_ttl.as_millis() == 0 {
            return invalid("fixed window TTL must be at least 1ms");
        }
        if self.token_bucket.max_tokens == 0 {
            return invalid("token bucket capacity must be greater than 0");
        }
        let rate = self.token_bucket.refill_rate;
        if !rate.is_finite() || rate < 0.0 {
            return invalid("token bucket refill rate must be a finite number >= 0");
        }
        if self.store_timeout.is_zero() || self.health_timeout.is_zero() {
            return invalid("store timeouts must be greater than 0");
        }

        ttl_millis(self.fixed_window.window_ttl)?;
        ttl_millis(self.token_bucket.idle_ttl)?;
        if let Some(ttl) = idle_ttl(&self.token_bucket.params(), self.token_bucket.idle_ttl) {
            ttl_millis(ttl)?;
        }

        Ok(self)
    }
}
