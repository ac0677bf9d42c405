//! API DTOs (Data Transfer Objects)

use crate::domain::value_objects::Verdict;
use serde::Serialize;

/// Response for /fixed-window (200 and 429)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedWindowResponse {
    pub verdict: Verdict,
    pub count: i64,
    pub limit: u32,
}

/// Response for /token-bucket (200 and 429)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBucketResponse {
    pub verdict: Verdict,
    /// Balance after refill, before this request's token was spent
    pub tokens: f64,
    pub capacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Response for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}
