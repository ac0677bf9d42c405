//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Client identification
//! - The atomic key-value store contract used by rate limiters
//! - Redis and in-memory store implementations

pub mod client;
pub mod memory_store;
pub mod rate_limit;
pub mod redis_store;
