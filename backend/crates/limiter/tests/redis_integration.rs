//! Integration tests for the limiters against Redis
//!
//! Runs the Lua scripts and `RedisStore` commands that decide in production.
//! Requires a running Redis at `REDIS_ADDR` (default `127.0.0.1:6379`):
//!
//! ```sh
//! docker run --rm -p 6379:6379 redis:7-alpine
//! cargo test -p limiter --test redis_integration -- --ignored
//! ```

use limiter::application::check_fixed_window::CheckFixedWindowUseCase;
use limiter::application::check_token_bucket::CheckTokenBucketUseCase;
use limiter::domain::entities::{FixedWindowKey, TokenBucketKeys};
use limiter::{FixedWindowConfig, FixedWindowMode, TokenBucketConfig, Verdict};
use platform::client::ClientId;
use platform::memory_store::MemoryStore;
use platform::redis_store::{RedisSettings, RedisStore};
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const T: i64 = 1_700_000_000;

struct Harness {
    store: Arc<RedisStore>,
    conn: MultiplexedConnection,
    run_id: String,
}

impl Harness {
    async fn connect() -> Self {
        let settings = RedisSettings {
            addr: std::env::var("REDIS_ADDR").unwrap_or_else(|_| "127.0.0.1:6379".to_string()),
            ..RedisSettings::default()
        };

        let store = RedisStore::connect(&settings)
            .await
            .expect("Failed to connect RedisStore");
        let conn = redis::Client::open(settings.url())
            .expect("Invalid Redis URL")
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to open inspection connection");

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Clock before epoch")
            .as_nanos();

        Self {
            store: Arc::new(store),
            conn,
            run_id: format!("it-{}-{nanos}", std::process::id()),
        }
    }

    /// Client id unique to this run, so reruns never see stale keys
    fn client(&self, name: &str) -> ClientId {
        ClientId::new(format!("{}-{name}", self.run_id))
    }

    async fn get(&mut self, key: &str) -> Option<String> {
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn)
            .await
            .expect("GET failed")
    }

    async fn set(&mut self, key: &str, value: &str) {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut self.conn)
            .await
            .expect("SET failed");
    }

    async fn pttl(&mut self, key: &str) -> i64 {
        redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut self.conn)
            .await
            .expect("PTTL failed")
    }

    async fn cleanup(&mut self, keys: &[&str]) {
        let _: i64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut self.conn)
            .await
            .expect("DEL failed");
    }
}

fn token_bucket(store: Arc<RedisStore>, max_tokens: u32, refill_rate: f64) -> CheckTokenBucketUseCase<RedisStore> {
    let config = TokenBucketConfig {
        max_tokens,
        refill_rate,
        ..TokenBucketConfig::default()
    };
    CheckTokenBucketUseCase::new(store, &config)
}

fn fixed_window(store: Arc<RedisStore>, mode: FixedWindowMode) -> CheckFixedWindowUseCase<RedisStore> {
    let config = FixedWindowConfig {
        mode,
        ..FixedWindowConfig::default()
    };
    CheckFixedWindowUseCase::new(store, config)
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_token_bucket_refill_writes_expected_state() {
    let mut h = Harness::connect().await;
    let client = h.client("refill");
    let keys = TokenBucketKeys::for_client(&client);
    h.set(&keys.tokens, "0").await;
    h.set(&keys.timestamp, &T.to_string()).await;

    let use_case = token_bucket(h.store.clone(), 5, 1.0);
    let decision = use_case.check(&client, T + 3).await.expect("check failed");

    assert_eq!(decision.verdict, Verdict::Allow);
    assert_eq!(decision.observed, 3.0);
    assert_eq!(h.get(&keys.tokens).await.as_deref(), Some("2"));
    assert_eq!(h.get(&keys.timestamp).await, Some((T + 3).to_string()));

    // Idle TTL (60s default) lands on both keys.
    for key in [&keys.tokens, &keys.timestamp] {
        let ttl = h.pttl(key).await;
        assert!(ttl > 0 && ttl <= 60_000, "{key} ttl {ttl}");
    }

    h.cleanup(&[&keys.tokens, &keys.timestamp]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_token_bucket_block_leaves_state_untouched() {
    let mut h = Harness::connect().await;
    let client = h.client("block");
    let keys = TokenBucketKeys::for_client(&client);
    h.set(&keys.tokens, "0.4").await;
    h.set(&keys.timestamp, &T.to_string()).await;

    let use_case = token_bucket(h.store.clone(), 5, 0.1);
    let decision = use_case.check(&client, T + 1).await.expect("check failed");

    assert_eq!(decision.verdict, Verdict::Block);
    assert!((decision.observed - 0.5).abs() < 1e-9);
    assert_eq!(h.get(&keys.tokens).await.as_deref(), Some("0.4"));
    assert_eq!(h.get(&keys.timestamp).await, Some(T.to_string()));
    // No write on block, so no TTL either.
    assert_eq!(h.pttl(&keys.tokens).await, -1);

    h.cleanup(&[&keys.tokens, &keys.timestamp]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_token_bucket_matches_in_memory_store() {
    let mut h = Harness::connect().await;
    let client = h.client("parity");
    let keys = TokenBucketKeys::for_client(&client);

    let memory = MemoryStore::new();
    let in_redis = token_bucket(h.store.clone(), 3, 0.3);
    let in_memory = CheckTokenBucketUseCase::new(
        Arc::new(memory.clone()),
        &TokenBucketConfig {
            max_tokens: 3,
            refill_rate: 0.3,
            ..TokenBucketConfig::default()
        },
    );

    for now in [T, T, T, T, T + 1, T + 2, T + 3, T + 7, T + 8, T + 8] {
        let redis_decision = in_redis.check(&client, now).await.expect("redis check failed");
        let memory_decision = in_memory.check(&client, now).await.expect("memory check failed");

        assert_eq!(redis_decision, memory_decision, "at now={now}");
        assert_eq!(h.get(&keys.tokens).await, memory.get(&keys.tokens), "at now={now}");
        assert_eq!(h.get(&keys.timestamp).await, memory.get(&keys.timestamp), "at now={now}");
    }

    h.cleanup(&[&keys.tokens, &keys.timestamp]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_two_step_window_sets_ttl_once() {
    let mut h = Harness::connect().await;
    let client = h.client("two-step");
    let key = FixedWindowKey::for_client(&client);
    let use_case = fixed_window(h.store.clone(), FixedWindowMode::TwoStep);

    let first = use_case.check(&client).await.expect("check failed");
    assert_eq!((first.verdict, first.observed), (Verdict::Allow, 1));
    let ttl_after_first = h.pttl(key.as_str()).await;
    assert!(ttl_after_first > 0 && ttl_after_first <= 10_000);

    for expected in 2..=3 {
        let decision = use_case.check(&client).await.expect("check failed");
        assert_eq!((decision.verdict, decision.observed), (Verdict::Allow, expected));
    }
    let blocked = use_case.check(&client).await.expect("check failed");
    assert_eq!((blocked.verdict, blocked.observed), (Verdict::Block, 4));

    // Later requests never push the window out.
    assert!(h.pttl(key.as_str()).await <= ttl_after_first);

    h.cleanup(&[key.as_str()]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_atomic_window_sets_ttl_and_repairs_persistent_counter() {
    let mut h = Harness::connect().await;
    let client = h.client("atomic");
    let key = FixedWindowKey::for_client(&client);

    let atomic = fixed_window(h.store.clone(), FixedWindowMode::Atomic);
    let first = atomic.check(&client).await.expect("check failed");
    assert_eq!(first.observed, 1);
    let ttl = h.pttl(key.as_str()).await;
    assert!(ttl > 0 && ttl <= 10_000);

    // A counter left without TTL stays that way under two-step...
    h.set(key.as_str(), "5").await;
    let two_step = fixed_window(h.store.clone(), FixedWindowMode::TwoStep);
    assert_eq!(two_step.check(&client).await.expect("check failed").observed, 6);
    assert_eq!(h.pttl(key.as_str()).await, -1);

    // ...and the atomic script gives it one.
    let repaired = atomic.check(&client).await.expect("check failed");
    assert_eq!((repaired.verdict, repaired.observed), (Verdict::Block, 7));
    let ttl = h.pttl(key.as_str()).await;
    assert!(ttl > 0 && ttl <= 10_000);

    h.cleanup(&[key.as_str()]).await;
}
