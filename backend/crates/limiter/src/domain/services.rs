//! Domain Services
//!
//! Pure token-bucket refill model. The Lua script in
//! [`crate::infra::scripts`] is a line-for-line rendition of [`evaluate`];
//! keep them in step.

use crate::domain::entities::TokenBucketState;
use crate::domain::value_objects::{TokenBucketParams, Verdict};
use crate::error::{LimiterError, LimiterResult};
use std::time::Duration;

/// Result of evaluating one token-bucket request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// Balance after refill, before consumption
    pub refilled: f64,
    /// State to write back; `None` means leave both keys untouched
    pub next: Option<TokenBucketState>,
}

/// Lazily refill the bucket and try to consume one token
///
/// * Absent balance means a full bucket; absent timestamp means `now`, so a
///   first sighting never refills retroactively.
/// * Elapsed time is clamped at zero to absorb clock skew between callers,
///   and the written timestamp never moves backwards.
/// * A blocked request writes nothing, so fractional progress towards the
///   next token is kept.
pub fn evaluate(
    stored_tokens: Option<f64>,
    stored_last_refill: Option<i64>,
    params: &TokenBucketParams,
    now: i64,
) -> Evaluation {
    let tokens = stored_tokens.unwrap_or(params.max_tokens);
    let last_refill = stored_last_refill.unwrap_or(now);

    let elapsed = now.saturating_sub(last_refill).max(0);
    let refilled = (tokens + elapsed as f64 * params.refill_rate)
        .min(params.max_tokens)
        .max(0.0);

    if refilled < 1.0 {
        return Evaluation {
            verdict: Verdict::Block,
            refilled,
            next: None,
        };
    }

    Evaluation {
        verdict: Verdict::Allow,
        refilled,
        next: Some(TokenBucketState {
            tokens: refilled - 1.0,
            last_refill: last_refill.max(now),
        }),
    }
}

/// Whole seconds until one token is available, for a `Retry-After` hint
///
/// `None` when the bucket never refills.
pub fn retry_after_secs(refilled: f64, refill_rate: f64) -> Option<u64> {
    if refill_rate <= 0.0 || !refill_rate.is_finite() {
        return None;
    }
    let deficit = (1.0 - refilled).max(0.0);
    Some(((deficit / refill_rate).ceil() as u64).max(1))
}

/// Expiration applied to a client's bucket keys after each consumption
///
/// Never shorter than the time an empty bucket needs to refill completely,
/// so expiry can only ever reset a bucket that would already be full.
/// `None` for a non-refilling bucket: expiring it would hand out a fresh,
/// full bucket.
pub fn idle_ttl(params: &TokenBucketParams, configured: Duration) -> Option<Duration> {
    if params.refill_rate <= 0.0 || !params.refill_rate.is_finite() {
        return None;
    }
    let full_refill = Duration::from_secs((params.max_tokens / params.refill_rate).ceil() as u64);
    Some(configured.max(full_refill))
}

/// A TTL as the whole milliseconds store commands take
///
/// Errors instead of wrapping when the duration does not fit an `i64`.
pub fn ttl_millis(ttl: Duration) -> LimiterResult<i64> {
    i64::try_from(ttl.as_millis()).map_err(|_| {
        LimiterError::InvalidConfig(format!("TTL of {}s is too large", ttl.as_secs()))
    })
}
