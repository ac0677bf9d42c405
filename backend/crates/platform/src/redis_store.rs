//! Redis-backed store
//!
//! Works with any RESP-speaking server that supports Lua scripting and
//! `PEXPIRE ... NX` (Redis 7+, Dragonfly, Valkey).

use crate::rate_limit::{AtomicScript, AtomicStore, ScriptArg, ScriptReply, StoreError, StoreResult};
use redis::aio::ConnectionManager;
use redis::{ErrorKind, RedisError};
use std::time::Duration;
use tracing::{debug, error};

/// Connection parameters for the shared store
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// `host:port`
    pub addr: String,
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
        }
    }
}

impl RedisSettings {
    /// Connection URL in the `redis://[:password@]host:port/db` form
    pub fn url(&self) -> String {
        let auth = match &self.password {
            Some(password) if !password.is_empty() => format!(":{password}@"),
            _ => String::new(),
        };
        format!("redis://{auth}{}/{}", self.addr, self.db)
    }
}

/// Store backed by a multiplexed, auto-reconnecting Redis connection
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the connection with a `PING`
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` when the client cannot be created or
    /// the first round trip fails.
    pub async fn connect(settings: &RedisSettings) -> StoreResult<Self> {
        let client = redis::Client::open(settings.url()).map_err(|e| {
            error!(addr = %settings.addr, error = %e, "Failed to create Redis client");
            classify(e)
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!(addr = %settings.addr, error = %e, "Failed to create connection manager");
            classify(e)
        })?;

        let store = Self { connection_manager };
        store.ping().await?;

        debug!(addr = %settings.addr, db = settings.db, "Connected to Redis");

        Ok(store)
    }
}

impl AtomicStore for RedisStore {
    async fn increment(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("INCR")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(classify)
    }

    async fn expire_if_absent(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();

        let applied = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async::<i64>(&mut conn)
            .await
            .map_err(classify)?;

        Ok(applied == 1)
    }

    async fn run_script(
        &self,
        script: &AtomicScript,
        keys: &[String],
        args: &[ScriptArg],
    ) -> StoreResult<ScriptReply> {
        let mut conn = self.connection_manager.clone();

        let mut invocation = script.compiled().prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.to_string());
        }

        let values = invocation
            .invoke_async::<Vec<String>>(&mut conn)
            .await
            .map_err(|e| match classify(e) {
                StoreError::Protocol(message) => StoreError::script(script.name(), message),
                other => other,
            })?;

        Ok(ScriptReply::new(script.name(), values))
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(classify)?;

        Ok(())
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn classify(err: RedisError) -> StoreError {
    if err.is_timeout() {
        return StoreError::Unavailable(format!("timed out: {err}"));
    }
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        return StoreError::Unavailable(err.to_string());
    }
    match err.kind() {
        ErrorKind::InvalidClientConfig | ErrorKind::AuthenticationFailed => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Protocol(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_without_password() {
        let settings = RedisSettings {
            addr: "redis:6379".into(),
            password: None,
            db: 2,
        };
        assert_eq!(settings.url(), "redis://redis:6379/2");
    }

    #[test]
    fn test_url_with_password() {
        let settings = RedisSettings {
            password: Some("s3cret".into()),
            ..RedisSettings::default()
        };
        assert_eq!(settings.url(), "redis://:s3cret@127.0.0.1:6379/0");
    }

    #[test]
    fn test_empty_password_is_ignored() {
        let settings = RedisSettings {
            password: Some(String::new()),
            ..RedisSettings::default()
        };
        assert!(!settings.url().contains('@'));
    }

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
    }

    #[test]
    fn test_classify_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify(RedisError::from(io));
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_classify_response_error() {
        let err = classify(RedisError::from((ErrorKind::TypeError, "wrong type")));
        assert!(matches!(err, StoreError::Protocol(_)));
    }
}
