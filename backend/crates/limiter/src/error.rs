//! Limiter Error Types
//!
//! Failures that prevent a decision. A BLOCK verdict is not an error; these
//! variants mean neither ALLOW nor BLOCK could be determined. They integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::rate_limit::StoreError;
use thiserror::Error;

/// Limiter-specific result type alias
pub type LimiterResult<T> = Result<T, LimiterError>;

#[derive(Debug, Error)]
pub enum LimiterError {
    /// Store unreachable, timed out, or replied with garbage
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Fixed-window increment applied but the window TTL was not
    ///
    /// The counter stays in the store without an expiration.
    #[error("Counter {key} incremented to {count} but its expiration was not set")]
    PartialApplication {
        key: String,
        count: i64,
        #[source]
        source: StoreError,
    },

    /// Atomic script failed; no state was changed
    #[error("Atomic script failed: {0}")]
    ScriptFailure(#[source] StoreError),

    /// Client identity could not be resolved from the request
    #[error("Invalid client identity: {0}")]
    InvalidClientId(String),

    /// Rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<StoreError> for LimiterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Script { .. } => LimiterError::ScriptFailure(err),
            _ => LimiterError::StoreUnavailable(err),
        }
    }
}

impl From<platform::client::ClientIdError> for LimiterError {
    fn from(err: platform::client::ClientIdError) -> Self {
        LimiterError::InvalidClientId(err.to_string())
    }
}

impl LimiterError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LimiterError::InvalidClientId(_) => ErrorKind::BadRequest,
            LimiterError::StoreUnavailable(_)
            | LimiterError::PartialApplication { .. }
            | LimiterError::ScriptFailure(_)
            | LimiterError::InvalidConfig(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            LimiterError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Rate limit store unavailable");
            }
            LimiterError::PartialApplication { key, count, source } => {
                tracing::error!(
                    key = %key,
                    count = count,
                    error = %source,
                    "Counter left without expiration"
                );
            }
            LimiterError::ScriptFailure(e) => {
                tracing::error!(error = %e, "Rate limit script failed");
            }
            LimiterError::InvalidClientId(msg) => {
                tracing::debug!(message = %msg, "Rejected client identity");
            }
            LimiterError::InvalidConfig(msg) => {
                tracing::error!(message = %msg, "Invalid limiter configuration");
            }
        }
    }
}

impl From<LimiterError> for AppError {
    fn from(err: LimiterError) -> Self {
        match err.kind() {
            // Store details stay in the logs.
            ErrorKind::InternalServerError => {
                AppError::internal("Rate limit decision unavailable").with_source(err)
            }
            kind => {
                let message = err.to_string();
                AppError::new(kind, message).with_source(err)
            }
        }
    }
}

impl IntoResponse for LimiterError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
