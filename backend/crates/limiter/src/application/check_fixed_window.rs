//! Check Fixed Window Use Case

use crate::application::config::{FixedWindowConfig, FixedWindowMode};
use crate::domain::entities::FixedWindowKey;
use crate::domain::services::ttl_millis;
use crate::domain::value_objects::Decision;
use crate::error::{LimiterError, LimiterResult};
use crate::infra::scripts::fixed_window_script;
use platform::client::ClientId;
use platform::rate_limit::{AtomicScript, AtomicStore, ScriptArg};
use std::sync::Arc;

/// Check Fixed Window Use Case
///
/// Counts requests per client in a window that starts at the client's first
/// request and lasts `window_ttl`.
pub struct CheckFixedWindowUseCase<S>
where
    S: AtomicStore,
{
    store: Arc<S>,
    config: FixedWindowConfig,
    script: AtomicScript,
}

impl<S> CheckFixedWindowUseCase<S>
where
    S: AtomicStore,
{
    pub fn new(store: Arc<S>, config: FixedWindowConfig) -> Self {
        Self {
            store,
            config,
            script: fixed_window_script(),
        }
    }

    pub fn config(&self) -> &FixedWindowConfig {
        &self.config
    }

    /// Count this request and decide
    ///
    /// The observed count is returned for both verdicts.
    pub async fn check(&self, client: &ClientId) -> LimiterResult<Decision<i64>> {
        let key = FixedWindowKey::for_client(client);

        let count = match self.config.mode {
            FixedWindowMode::TwoStep => self.increment_then_expire(&key).await?,
            FixedWindowMode::Atomic => self.increment_atomically(&key).await?,
        };

        let decision = Decision::from_count(count, self.config.max_requests);

        if decision.is_allowed() {
            tracing::debug!(client_id = %client, count = count, "Fixed window allowed");
        } else {
            tracing::warn!(
                client_id = %client,
                count = count,
                max = self.config.max_requests,
                "Fixed window limit exceeded"
            );
        }

        Ok(decision)
    }

    async fn increment_then_expire(&self, key: &FixedWindowKey) -> LimiterResult<i64> {
        let count = self.store.increment(key.as_str()).await?;

        // Only the request that opened the window sets its expiration. NX keeps
        // a racing second "first" request from pushing the window out.
        if count == 1 {
            let applied = self
                .store
                .expire_if_absent(key.as_str(), self.config.window_ttl)
                .await
                .map_err(|source| LimiterError::PartialApplication {
                    key: key.to_string(),
                    count,
                    source,
                })?;

            if !applied {
                tracing::debug!(key = %key, "Window expiration already present");
            }
        }

        Ok(count)
    }

    async fn increment_atomically(&self, key: &FixedWindowKey) -> LimiterResult<i64> {
        let ttl_ms = ttl_millis(self.config.window_ttl)?;
        let reply = self
            .store
            .run_script(
                &self.script,
                &[key.to_string()],
                &[ScriptArg::Int(ttl_ms)],
            )
            .await?;

        reply.int(0).map_err(LimiterError::ScriptFailure)
    }
}
