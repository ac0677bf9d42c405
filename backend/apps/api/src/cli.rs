//! Command line and environment configuration

use clap::{Parser, ValueEnum};
use limiter::{FixedWindowConfig, FixedWindowMode, LimiterConfig, TokenBucketConfig};
use platform::redis_store::RedisSettings;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Rate limit decision service
///
/// Every flag can also be set through the environment (or a `.env` file).
#[derive(Debug, Parser)]
#[command(name = "api", version, about)]
pub struct Args {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: std::net::IpAddr,

    /// Redis host:port
    #[arg(long, env = "REDIS_ADDR", default_value = "127.0.0.1:6379")]
    pub redis_addr: String,

    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    pub redis_db: i64,

    #[arg(long, env = "FIXED_WINDOW_MAX_REQUESTS", default_value_t = 3)]
    pub fixed_window_max_requests: u32,

    #[arg(long, env = "FIXED_WINDOW_TTL_SECS", default_value_t = 10)]
    pub fixed_window_ttl_secs: u64,

    /// "two-step" (INCR then PEXPIRE NX) or "atomic" (single script)
    #[arg(long, env = "FIXED_WINDOW_MODE", default_value = "two-step")]
    pub fixed_window_mode: FixedWindowMode,

    #[arg(long, env = "TOKEN_BUCKET_MAX_TOKENS", default_value_t = 5)]
    pub token_bucket_max_tokens: u32,

    /// Tokens per second
    #[arg(long, env = "TOKEN_BUCKET_REFILL_RATE", default_value_t = 1.0)]
    pub token_bucket_refill_rate: f64,

    #[arg(long, env = "TOKEN_BUCKET_IDLE_TTL_SECS", default_value_t = 60)]
    pub token_bucket_idle_ttl_secs: u64,

    /// Bound on each store round trip, in milliseconds
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Args {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn redis_settings(&self) -> RedisSettings {
        RedisSettings {
            addr: self.redis_addr.clone(),
            password: self.redis_password.clone(),
            db: self.redis_db,
        }
    }

    pub fn limiter_config(&self) -> LimiterConfig {
        let store_timeout = Duration::from_millis(self.store_timeout_ms);
        LimiterConfig {
            fixed_window: FixedWindowConfig {
                max_requests: self.fixed_window_max_requests,
                window_ttl: Duration::from_secs(self.fixed_window_ttl_secs),
                mode: self.fixed_window_mode,
            },
            token_bucket: TokenBucketConfig {
                max_tokens: self.token_bucket_max_tokens,
                refill_rate: self.token_bucket_refill_rate,
                idle_ttl: Duration::from_secs(self.token_bucket_idle_ttl_secs),
            },
            store_timeout,
            health_timeout: store_timeout,
        }
    }
}
