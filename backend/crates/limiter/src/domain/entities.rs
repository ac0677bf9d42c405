//! Domain Entities
//!
//! Per-client state kept in the shared store, and the key schema addressing it.
//! Client identities are embedded verbatim.

use platform::client::ClientId;

/// Fixed-window counter key: `fixed_window:<client>`
///
/// The counter is created by the first increment and removed only by store
/// expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindowKey(String);

impl FixedWindowKey {
    pub const PREFIX: &'static str = "fixed_window";

    pub fn for_client(client: &ClientId) -> Self {
        Self(format!("{}:{}", Self::PREFIX, client))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FixedWindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token-bucket key pair: balance and last refill timestamp
///
/// Both keys are only ever touched together, inside one atomic script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketKeys {
    pub tokens: String,
    pub timestamp: String,
}

impl TokenBucketKeys {
    pub const PREFIX: &'static str = "token_bucket";

    pub fn for_client(client: &ClientId) -> Self {
        Self {
            tokens: format!("{}:tokens:{}", Self::PREFIX, client),
            timestamp: format!("{}:timestamp:{}", Self::PREFIX, client),
        }
    }

    /// Keys in script order (`KEYS[1]`, `KEYS[2]`)
    pub fn to_vec(&self) -> Vec<String> {
        vec![self.tokens.clone(), self.timestamp.clone()]
    }
}

/// Token-bucket state as stored
///
/// `tokens` stays within `[0, max_tokens]` and `last_refill` (unix seconds)
/// never decreases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketState {
    pub tokens: f64,
    pub last_refill: i64,
}
