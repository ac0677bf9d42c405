//! Rate Limit Decision Module
//!
//! Clean Architecture structure:
//! - `domain/` - Verdicts, store keys, the token-bucket refill model
//! - `application/` - Use cases and configuration
//! - `infra/` - Atomic store scripts
//! - `presentation/` - HTTP handlers
//!
//! ## Consistency Model
//! - The store is the only shared state; any number of service replicas can
//!   decide for the same client
//! - Token-bucket read-refill-consume runs as one atomic script
//! - Fixed-window counting is atomic; its expiration is a second command
//!   unless [`FixedWindowMode::Atomic`] is configured
//! - A store failure is never turned into ALLOW or BLOCK

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{
    FixedWindowConfig, FixedWindowMode, LimiterConfig, TokenBucketConfig,
};
pub use domain::value_objects::{Decision, Verdict};
pub use error::{LimiterError, LimiterResult};
pub use presentation::router::{limiter_router, limiter_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult, ResultExt},
    kind::ErrorKind,
};
