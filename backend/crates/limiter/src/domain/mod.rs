//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (store key schema, token-bucket state)
//! - Domain value objects (Verdict, Decision, TokenBucketParams)
//! - Domain services (token-bucket refill model)

pub mod entities;
pub mod services;
pub mod value_objects;
