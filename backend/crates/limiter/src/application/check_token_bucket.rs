//! Check Token Bucket Use Case

use crate::application::config::TokenBucketConfig;
use crate::domain::entities::TokenBucketKeys;
use crate::domain::services::idle_ttl;
use crate::domain::value_objects::{Decision, TokenBucketParams};
use crate::error::{LimiterError, LimiterResult};
use crate::infra::scripts::{token_bucket_args, token_bucket_script};
use platform::client::ClientId;
use platform::rate_limit::{AtomicScript, AtomicStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Check Token Bucket Use Case
///
/// Each client owns a bucket refilling continuously at `refill_rate` up to
/// `max_tokens`; every allowed request spends one token. The whole
/// read-refill-consume step runs as one atomic script against the store.
pub struct CheckTokenBucketUseCase<S>
where
    S: AtomicStore,
{
    store: Arc<S>,
    params: TokenBucketParams,
    ttl: Option<Duration>,
    script: AtomicScript,
}

impl<S> CheckTokenBucketUseCase<S>
where
    S: AtomicStore,
{
    pub fn new(store: Arc<S>, config: &TokenBucketConfig) -> Self {
        let params = config.params();
        Self {
            store,
            params,
            ttl: idle_ttl(&params, config.idle_ttl),
            script: token_bucket_script(),
        }
    }

    pub fn params(&self) -> &TokenBucketParams {
        &self.params
    }

    /// Refill, then try to spend one token at `now_unix_secs`
    ///
    /// `now` comes from the caller rather than the store so results are
    /// reproducible. The observed value is the balance after refill and
    /// before consumption.
    pub async fn check(&self, client: &ClientId, now_unix_secs: i64) -> LimiterResult<Decision<f64>> {
        let keys = TokenBucketKeys::for_client(client);
        let args = token_bucket_args(&self.params, now_unix_secs, self.ttl)?;

        let reply = self
            .store
            .run_script(&self.script, &keys.to_vec(), &args)
            .await?;

        let allowed = reply.int(0).map_err(LimiterError::ScriptFailure)?;
        let refilled = reply.float(1).map_err(LimiterError::ScriptFailure)?;

        let decision = match allowed {
            1 => Decision::allow(refilled),
            0 => Decision::block(refilled),
            other => {
                return Err(LimiterError::ScriptFailure(StoreError::Protocol(format!(
                    "token bucket allowed flag {other} is neither 0 nor 1"
                ))));
            }
        };

        if decision.is_allowed() {
            tracing::debug!(client_id = %client, tokens = refilled, "Token bucket allowed");
        } else {
            tracing::warn!(client_id = %client, tokens = refilled, "Token bucket empty");
        }

        Ok(decision)
    }
}
