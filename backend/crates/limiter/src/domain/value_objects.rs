//! Domain Value Objects
//!
//! Immutable value types for rate-limit decisions.

use serde::Serialize;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Allow,
    Block,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allow => f.write_str("ALLOW"),
            Verdict::Block => f.write_str("BLOCK"),
        }
    }
}

/// Verdict plus the value the store observed while deciding
///
/// `T` is the request count for the fixed window and the token balance for
/// the token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision<T> {
    pub verdict: Verdict,
    pub observed: T,
}

impl<T> Decision<T> {
    pub fn allow(observed: T) -> Self {
        Self {
            verdict: Verdict::Allow,
            observed,
        }
    }

    pub fn block(observed: T) -> Self {
        Self {
            verdict: Verdict::Block,
            observed,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict.is_allowed()
    }
}

impl Decision<i64> {
    /// Fixed-window rule: the request is blocked once the count exceeds the ceiling
    pub fn from_count(count: i64, max_requests: u32) -> Self {
        if count > i64::from(max_requests) {
            Self::block(count)
        } else {
            Self::allow(count)
        }
    }
}

/// Token-bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketParams {
    /// Bucket capacity; a new client starts full
    pub max_tokens: f64,
    /// Tokens added per second
    pub refill_rate: f64,
}

impl TokenBucketParams {
    pub fn new(max_tokens: u32, refill_rate: f64) -> Self {
        Self {
            max_tokens: f64::from(max_tokens),
            refill_rate,
        }
    }
}
