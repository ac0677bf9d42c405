//! Limiter Router

use crate::application::config::LimiterConfig;
use crate::presentation::handlers::{self, LimiterAppState};
use axum::{Router, routing::get};
use platform::rate_limit::AtomicStore;
use platform::redis_store::RedisStore;

/// Create the limiter router backed by Redis
pub fn limiter_router(store: RedisStore, config: LimiterConfig) -> Router {
    limiter_router_generic(store, config)
}

/// Create a limiter router for any store implementation
pub fn limiter_router_generic<S>(store: S, config: LimiterConfig) -> Router
where
    S: AtomicStore + Clone + Send + Sync + 'static,
{
    let state = LimiterAppState::new(store, config);

    Router::new()
        .route(
            "/fixed-window",
            get(handlers::check_fixed_window::<S>).post(handlers::check_fixed_window::<S>),
        )
        .route(
            "/token-bucket",
            get(handlers::check_token_bucket::<S>).post(handlers::check_token_bucket::<S>),
        )
        .route("/health", get(handlers::check_health::<S>))
        .with_state(state)
}
