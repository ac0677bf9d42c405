//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and the store.
//! Contains use case implementations.

pub mod check_fixed_window;
pub mod check_health;
pub mod check_token_bucket;
pub mod config;
