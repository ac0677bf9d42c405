//! Check Health Use Case

use kernel::error::app_error::{AppError, AppResult, ResultExt};
use kernel::error::kind::ErrorKind;
use platform::rate_limit::{AtomicStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Check Health Use Case
///
/// Liveness is store reachability: one `PING` under a short bound.
pub struct CheckHealthUseCase<S>
where
    S: AtomicStore,
{
    store: Arc<S>,
    timeout: Duration,
}

impl<S> CheckHealthUseCase<S>
where
    S: AtomicStore,
{
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn execute(&self) -> AppResult<()> {
        let result = match tokio::time::timeout(self.timeout, self.store.ping()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };

        result
            .inspect_err(|e| tracing::warn!(error = %e, "Health check failed - store unreachable"))
            .map_app_err(ErrorKind::ServiceUnavailable, "Rate limit store unreachable")
            .map_err(|e: AppError| e.with_action("Check the store address and credentials"))
    }
}
