//! Presentation Layer
//!
//! HTTP handlers and DTOs for the decision API.

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod router;
