//! HTTP Handlers

use crate::application::check_fixed_window::CheckFixedWindowUseCase;
use crate::application::check_health::CheckHealthUseCase;
use crate::application::check_token_bucket::CheckTokenBucketUseCase;
use crate::application::config::LimiterConfig;
use crate::domain::services::retry_after_secs;
use crate::domain::value_objects::Decision;
use crate::error::{LimiterError, LimiterResult};
use crate::presentation::dto::{FixedWindowResponse, HealthResponse, TokenBucketResponse};
use crate::presentation::extractors::ResolvedClient;
use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppResult;
use platform::rate_limit::{AtomicStore, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for limiter handlers
#[derive(Clone)]
pub struct LimiterAppState<S>
where
    S: AtomicStore + Clone + Send + Sync + 'static,
{
    pub fixed_window: Arc<CheckFixedWindowUseCase<S>>,
    pub token_bucket: Arc<CheckTokenBucketUseCase<S>>,
    pub health: Arc<CheckHealthUseCase<S>>,
    pub config: Arc<LimiterConfig>,
}

impl<S> LimiterAppState<S>
where
    S: AtomicStore + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, config: LimiterConfig) -> Self {
        let store = Arc::new(store);
        Self {
            fixed_window: Arc::new(CheckFixedWindowUseCase::new(
                store.clone(),
                config.fixed_window.clone(),
            )),
            token_bucket: Arc::new(CheckTokenBucketUseCase::new(
                store.clone(),
                &config.token_bucket,
            )),
            health: Arc::new(CheckHealthUseCase::new(store, config.health_timeout)),
            config: Arc::new(config),
        }
    }
}

/// GET|POST /fixed-window
pub async fn check_fixed_window<S>(
    State(state): State<LimiterAppState<S>>,
    ResolvedClient(client): ResolvedClient,
) -> LimiterResult<Response>
where
    S: AtomicStore + Clone + Send + Sync + 'static,
{
    let decision = bounded(
        state.config.store_timeout,
        state.fixed_window.check(&client),
    )
    .await?;

    let body = FixedWindowResponse {
        verdict: decision.verdict,
        count: decision.observed,
        limit: state.fixed_window.config().max_requests,
    };

    Ok((status_for(&decision), Json(body)).into_response())
}

/// GET|POST /token-bucket
pub async fn check_token_bucket<S>(
    State(state): State<LimiterAppState<S>>,
    ResolvedClient(client): ResolvedClient,
) -> LimiterResult<Response>
where
    S: AtomicStore + Clone + Send + Sync + 'static,
{
    let now = chrono::Utc::now().timestamp();

    let decision = bounded(
        state.config.store_timeout,
        state.token_bucket.check(&client, now),
    )
    .await?;

    let params = state.token_bucket.params();
    let retry_after = if decision.is_allowed() {
        None
    } else {
        retry_after_secs(decision.observed, params.refill_rate)
    };

    let body = TokenBucketResponse {
        verdict: decision.verdict,
        tokens: decision.observed,
        capacity: params.max_tokens,
        retry_after_secs: retry_after,
    };

    let mut response = (status_for(&decision), Json(body)).into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from(secs));
    }

    Ok(response)
}

/// GET /health
pub async fn check_health<S>(
    State(state): State<LimiterAppState<S>>,
) -> AppResult<Json<HealthResponse>>
where
    S: AtomicStore + Clone + Send + Sync + 'static,
{
    state.health.execute().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        store: "connected",
    }))
}

fn status_for<T>(decision: &Decision<T>) -> StatusCode {
    if decision.is_allowed() {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    }
}

/// Bound a decision's store round trip; an exceeded wait is a store failure
async fn bounded<T>(
    timeout: Duration,
    decision: impl Future<Output = LimiterResult<T>>,
) -> LimiterResult<T> {
    tokio::time::timeout(timeout, decision)
        .await
        .unwrap_or(Err(LimiterError::StoreUnavailable(StoreError::Timeout(
            timeout,
        ))))
}
