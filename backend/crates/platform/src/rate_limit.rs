//! Rate Limiting Infrastructure
//!
//! The atomic key-value store contract that rate limiters are written against.
//! Implementations live in [`crate::redis_store`] (shared, networked) and
//! [`crate::memory_store`] (single process, tests and local development).

use std::fmt;
use std::time::Duration;

/// Store-layer result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reaching or evaluating against the store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Connection refused, dropped, or I/O failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Round trip exceeded the caller's bound
    #[error("Store round trip exceeded {0:?}")]
    Timeout(Duration),

    /// Atomic script rejected its arguments or failed while evaluating
    #[error("Script {script} failed: {message}")]
    Script {
        script: &'static str,
        message: String,
    },

    /// Reply did not have the expected shape
    #[error("Unexpected store reply: {0}")]
    Protocol(String),
}

impl StoreError {
    pub fn script(script: &'static str, message: impl Into<String>) -> Self {
        StoreError::Script {
            script,
            message: message.into(),
        }
    }
}

/// Expiration state of a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist
    Missing,
    /// Key exists and never expires
    Persistent,
    /// Key expires after the given duration
    Expires(Duration),
}

/// Argument passed to an atomic script
///
/// Scripts receive their arguments as strings on the wire; the variants only
/// control formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Int(i64),
    Float(f64),
}

impl ScriptArg {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScriptArg::Int(v) => Some(*v),
            ScriptArg::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            ScriptArg::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            ScriptArg::Int(v) => *v as f64,
            ScriptArg::Float(v) => *v,
        }
    }
}

impl fmt::Display for ScriptArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptArg::Int(v) => write!(f, "{v}"),
            ScriptArg::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Reply of an atomic script: a flat list of string values
///
/// Scripts stringify every element so fractional numbers survive the trip
/// through the store's reply encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptReply {
    script: &'static str,
    values: Vec<String>,
}

impl ScriptReply {
    pub fn new(script: &'static str, values: Vec<String>) -> Self {
        Self { script, values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn value(&self, index: usize) -> StoreResult<&str> {
        self.values.get(index).map(String::as_str).ok_or_else(|| {
            StoreError::Protocol(format!(
                "script {} replied with {} values, wanted index {}",
                self.script,
                self.values.len(),
                index
            ))
        })
    }

    pub fn int(&self, index: usize) -> StoreResult<i64> {
        let raw = self.value(index)?;
        raw.parse::<i64>().map_err(|_| {
            StoreError::Protocol(format!("script {} value {raw:?} is not an integer", self.script))
        })
    }

    pub fn float(&self, index: usize) -> StoreResult<f64> {
        let raw = self.value(index)?;
        raw.parse::<f64>().map_err(|_| {
            StoreError::Protocol(format!("script {} value {raw:?} is not a number", self.script))
        })
    }
}

/// Key-space view handed to a native script body
///
/// Mirrors the handful of commands the server-side scripts use, so one script
/// can be expressed both as Lua and as a Rust function.
pub trait ScriptContext {
    fn get(&mut self, key: &str) -> Option<String>;

    /// `SET`: stores the value and clears any expiration
    fn set(&mut self, key: &str, value: String);

    /// `INCR`: fails when the current value is not an integer
    fn incr(&mut self, key: &str) -> StoreResult<i64>;

    /// `PEXPIRE`, optionally with `NX`; returns whether a TTL was applied
    fn pexpire(&mut self, key: &str, ttl: Duration, only_if_absent: bool) -> bool;

    fn ttl(&mut self, key: &str) -> KeyTtl;
}

/// Native body of an atomic script
pub type NativeScript =
    fn(&mut dyn ScriptContext, &[String], &[ScriptArg]) -> StoreResult<ScriptReply>;

/// An atomic, server-evaluated, multi-key read-modify-write
///
/// Carries the Lua source (evaluated by Redis via `EVALSHA`, falling back to
/// `EVAL`) and an equivalent native body for stores without a scripting
/// engine. Both must implement the same semantics.
#[derive(Clone)]
pub struct AtomicScript {
    name: &'static str,
    lua: &'static str,
    native: NativeScript,
    compiled: redis::Script,
}

impl AtomicScript {
    pub fn new(name: &'static str, lua: &'static str, native: NativeScript) -> Self {
        Self {
            name,
            lua,
            native,
            compiled: redis::Script::new(lua),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn lua(&self) -> &'static str {
        self.lua
    }

    /// SHA1 of the Lua source, as used by `EVALSHA`
    pub fn hash(&self) -> &str {
        self.compiled.get_hash()
    }

    pub(crate) fn compiled(&self) -> &redis::Script {
        &self.compiled
    }

    pub(crate) fn run_native(
        &self,
        ctx: &mut dyn ScriptContext,
        keys: &[String],
        args: &[ScriptArg],
    ) -> StoreResult<ScriptReply> {
        (self.native)(ctx, keys, args)
    }
}

impl fmt::Debug for AtomicScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicScript")
            .field("name", &self.name)
            .field("hash", &self.hash())
            .finish()
    }
}

/// Trait for rate limit storage backends
///
/// Every method is a single round trip and atomic on its own. No method
/// retries internally.
#[trait_variant::make(AtomicStore: Send)]
pub trait LocalAtomicStore {
    /// Atomically increment an integer key, creating it at 0 first
    async fn increment(&self, key: &str) -> StoreResult<i64>;

    /// Set an expiration only if the key currently has none
    ///
    /// Returns `true` when this call applied the TTL.
    async fn expire_if_absent(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Run a multi-key script with no interleaving from other callers
    async fn run_script(
        &self,
        script: &AtomicScript,
        keys: &[String],
        args: &[ScriptArg],
    ) -> StoreResult<ScriptReply>;

    /// Trivial round trip used for liveness checks
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(
        _ctx: &mut dyn ScriptContext,
        keys: &[String],
        _args: &[ScriptArg],
    ) -> StoreResult<ScriptReply> {
        Ok(ScriptReply::new("echo", keys.to_vec()))
    }

    #[test]
    fn test_script_arg_formatting() {
        assert_eq!(ScriptArg::Int(1_700_000_000).to_string(), "1700000000");
        assert_eq!(ScriptArg::Float(0.1).to_string(), "0.1");
        assert_eq!(ScriptArg::Float(5.0).to_string(), "5");
    }

    #[test]
    fn test_script_arg_conversions() {
        assert_eq!(ScriptArg::Int(3).as_f64(), 3.0);
        assert_eq!(ScriptArg::Float(4.0).as_i64(), Some(4));
        assert_eq!(ScriptArg::Float(4.5).as_i64(), None);
    }

    #[test]
    fn test_reply_accessors() {
        let reply = ScriptReply::new("t", vec!["1".into(), "2.5".into(), "x".into()]);
        assert_eq!(reply.int(0).unwrap(), 1);
        assert_eq!(reply.float(1).unwrap(), 2.5);
        assert!(matches!(reply.int(2), Err(StoreError::Protocol(_))));
        assert!(matches!(reply.float(9), Err(StoreError::Protocol(_))));
    }

    #[test]
    fn test_atomic_script_hash_is_stable() {
        let a = AtomicScript::new("echo", "return KEYS", echo);
        let b = AtomicScript::new("echo", "return KEYS", echo);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 40);
        assert_eq!(a.name(), "echo");
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::script("token_bucket", "bad args");
        assert_eq!(err.to_string(), "Script token_bucket failed: bad args");
        assert!(
            StoreError::Timeout(Duration::from_secs(2))
                .to_string()
                .contains("2s")
        );
    }
}
