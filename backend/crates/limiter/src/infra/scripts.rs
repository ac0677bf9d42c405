//! Atomic store scripts
//!
//! Each script exists twice: as Lua for Redis and as a native body for the
//! in-memory store. Both take the same `KEYS`/`ARGV` and reply with the same
//! stringified values.

use crate::domain::services::{evaluate, ttl_millis};
use crate::domain::value_objects::{TokenBucketParams, Verdict};
use crate::error::LimiterResult;
use platform::rate_limit::{
    AtomicScript, KeyTtl, ScriptArg, ScriptContext, ScriptReply, StoreError, StoreResult,
};
use std::time::Duration;

pub const TOKEN_BUCKET: &str = "token_bucket";
pub const FIXED_WINDOW: &str = "fixed_window";

/// Token bucket
///
/// KEYS[1] = balance, KEYS[2] = last refill (unix seconds)
/// ARGV[1] = capacity, ARGV[2] = refill rate per second,
/// ARGV[3] = now (unix seconds), ARGV[4] = idle TTL in ms (0 = none)
///
/// Returns `{allowed ("1"/"0"), refilled balance before consumption}`.
pub const TOKEN_BUCKET_LUA: &str = r#"
local key_tokens = KEYS[1]
local key_timestamp = KEYS[2]
local max_tokens = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl_ms = tonumber(ARGV[4])

if max_tokens == nil or refill_rate == nil or now == nil or ttl_ms == nil then
    return redis.error_reply("token_bucket: non-numeric argument")
end

local tokens = tonumber(redis.call("GET", key_tokens)) or max_tokens
local last_refill = tonumber(redis.call("GET", key_timestamp)) or now

local elapsed = math.max(0, now - last_refill)
local refilled = math.max(0, math.min(max_tokens, tokens + elapsed * refill_rate))

if refilled < 1 then
    return {"0", tostring(refilled)}
end

redis.call("SET", key_tokens, tostring(refilled - 1))
redis.call("SET", key_timestamp, tostring(math.max(last_refill, now)))
if ttl_ms > 0 then
    redis.call("PEXPIRE", key_tokens, ttl_ms)
    redis.call("PEXPIRE", key_timestamp, ttl_ms)
end

return {"1", tostring(refilled)}
"#;

/// Fixed window, increment and expiry in one step
///
/// KEYS[1] = counter, ARGV[1] = window TTL in ms
///
/// Applies the TTL whenever the counter has none, which also repairs a
/// counter left without one by an earlier failed two-step check.
/// Returns `{count}`.
pub const FIXED_WINDOW_LUA: &str = r#"
local key = KEYS[1]
local ttl_ms = tonumber(ARGV[1])

if ttl_ms == nil or ttl_ms <= 0 then
    return redis.error_reply("fixed_window: invalid ttl")
end

local count = redis.call("INCR", key)
if redis.call("PTTL", key) == -1 then
    redis.call("PEXPIRE", key, ttl_ms)
end

return {tostring(count)}
"#;

pub fn token_bucket_script() -> AtomicScript {
    AtomicScript::new(TOKEN_BUCKET, TOKEN_BUCKET_LUA, token_bucket_native)
}

pub fn fixed_window_script() -> AtomicScript {
    AtomicScript::new(FIXED_WINDOW, FIXED_WINDOW_LUA, fixed_window_native)
}

/// Arguments for [`token_bucket_script`], in `ARGV` order
pub fn token_bucket_args(
    params: &TokenBucketParams,
    now: i64,
    ttl: Option<Duration>,
) -> LimiterResult<Vec<ScriptArg>> {
    let ttl_ms = ttl.map(ttl_millis).transpose()?.unwrap_or(0);
    Ok(vec![
        ScriptArg::Float(params.max_tokens),
        ScriptArg::Float(params.refill_rate),
        ScriptArg::Int(now),
        ScriptArg::Int(ttl_ms),
    ])
}

fn token_bucket_native(
    ctx: &mut dyn ScriptContext,
    keys: &[String],
    args: &[ScriptArg],
) -> StoreResult<ScriptReply> {
    let [key_tokens, key_timestamp] = keys else {
        return Err(StoreError::script(TOKEN_BUCKET, "expected 2 keys"));
    };
    let [max_tokens, refill_rate, now, ttl_ms] = args else {
        return Err(StoreError::script(TOKEN_BUCKET, "expected 4 arguments"));
    };
    let now = now
        .as_i64()
        .ok_or_else(|| StoreError::script(TOKEN_BUCKET, "now must be whole seconds"))?;
    let ttl_ms = ttl_ms
        .as_i64()
        .ok_or_else(|| StoreError::script(TOKEN_BUCKET, "ttl must be whole milliseconds"))?;
    let params = TokenBucketParams {
        max_tokens: max_tokens.as_f64(),
        refill_rate: refill_rate.as_f64(),
    };

    // Unparseable stored values fall back to defaults, as `tonumber` does.
    let stored_tokens = ctx.get(key_tokens).and_then(|v| v.parse::<f64>().ok());
    let stored_last = ctx
        .get(key_timestamp)
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v as i64);

    let evaluation = evaluate(stored_tokens, stored_last, &params, now);

    if let Some(next) = evaluation.next {
        ctx.set(key_tokens, lua_tostring(next.tokens));
        ctx.set(key_timestamp, next.last_refill.to_string());
        if ttl_ms > 0 {
            let ttl = Duration::from_millis(ttl_ms as u64);
            ctx.pexpire(key_tokens, ttl, false);
            ctx.pexpire(key_timestamp, ttl, false);
        }
    }

    let allowed = match evaluation.verdict {
        Verdict::Allow => "1",
        Verdict::Block => "0",
    };
    Ok(ScriptReply::new(
        TOKEN_BUCKET,
        vec![allowed.to_string(), lua_tostring(evaluation.refilled)],
    ))
}

/// Render a number the way Lua's `tostring` does: 14 significant digits
fn lua_tostring(value: f64) -> String {
    let rounded: f64 = format!("{value:.13e}").parse().unwrap_or(value);
    rounded.to_string()
}

fn fixed_window_native(
    ctx: &mut dyn ScriptContext,
    keys: &[String],
    args: &[ScriptArg],
) -> StoreResult<ScriptReply> {
    let [key] = keys else {
        return Err(StoreError::script(FIXED_WINDOW, "expected 1 key"));
    };
    let ttl_ms = args
        .first()
        .and_then(ScriptArg::as_i64)
        .filter(|ms| *ms > 0)
        .ok_or_else(|| StoreError::script(FIXED_WINDOW, "invalid ttl"))?;

    let count = ctx.incr(key)?;
    if ctx.ttl(key) == KeyTtl::Persistent {
        ctx.pexpire(key, Duration::from_millis(ttl_ms as u64), false);
    }

    Ok(ScriptReply::new(FIXED_WINDOW, vec![count.to_string()]))
}
