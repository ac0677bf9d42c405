//! In-memory store
//!
//! Single-process implementation of [`AtomicStore`] for tests and local
//! development. Every operation runs under one lock, which gives the same
//! no-interleaving guarantee a Redis script has. Expiration is lazy and driven
//! by a [`Clock`] that tests can move by hand.

use crate::rate_limit::{
    AtomicScript, AtomicStore, KeyTtl, ScriptArg, ScriptContext, ScriptReply, StoreError,
    StoreResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Millisecond clock driving key expiry
#[derive(Debug, Clone)]
pub enum Clock {
    System,
    Manual(Arc<AtomicU64>),
}

impl Clock {
    /// A manual clock starting at `start_ms`
    pub fn manual(start_ms: u64) -> Self {
        Clock::Manual(Arc::new(AtomicU64::new(start_ms)))
    }

    pub fn now_ms(&self) -> u64 {
        match self {
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            Clock::Manual(now) => now.load(Ordering::SeqCst),
        }
    }

    /// Move a manual clock forward; no-op on the system clock
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(now) = self {
            now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at_ms: Option<u64>,
}

/// Expired entries are swept from the map every this many operations
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    fail_expire: AtomicBool,
}

/// Shared in-memory key space
///
/// Cloning shares the underlying state, so a test can keep a handle while the
/// router owns another.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Clock,
    faults: Arc<Faults>,
    operations: Arc<AtomicU64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Clock::System)
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            faults: Arc::new(Faults::default()),
            operations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Simulate an outage: every operation fails with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `expire_if_absent` fail while other commands keep working
    pub fn set_fail_expire(&self, fail: bool) {
        self.faults.fail_expire.store(fail, Ordering::SeqCst);
    }

    /// Read a key directly, bypassing fault injection
    pub fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.entries.lock().ok()?;
        let mut space = KeySpace::new(&mut guard, self.clock.now_ms());
        space.get(key)
    }

    /// Write a key directly, bypassing fault injection
    pub fn set(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut guard) = self.entries.lock() {
            let mut space = KeySpace::new(&mut guard, self.clock.now_ms());
            space.set(key, value.into());
        }
    }

    /// Expiration state of a key, bypassing fault injection
    pub fn ttl(&self, key: &str) -> KeyTtl {
        match self.entries.lock() {
            Ok(mut guard) => KeySpace::new(&mut guard, self.clock.now_ms()).ttl(key),
            Err(_) => KeyTtl::Missing,
        }
    }

    /// Entries held in the map, including expired ones not yet swept
    pub fn entry_count(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or_default()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.check_available()?;
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;

        let operation = self.operations.fetch_add(1, Ordering::Relaxed) + 1;
        if operation % SWEEP_INTERVAL == 0 {
            let now_ms = self.clock.now_ms();
            guard.retain(|_, entry| entry.expires_at_ms.is_none_or(|at| at > now_ms));
        }

        Ok(guard)
    }
}

impl AtomicStore for MemoryStore {
    async fn increment(&self, key: &str) -> StoreResult<i64> {
        let mut guard = self.lock()?;
        KeySpace::new(&mut guard, self.clock.now_ms()).incr(key)
    }

    async fn expire_if_absent(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        if self.faults.fail_expire.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("expire rejected by fault injection".into()));
        }
        let mut guard = self.lock()?;
        Ok(KeySpace::new(&mut guard, self.clock.now_ms()).pexpire(key, ttl, true))
    }

    async fn run_script(
        &self,
        script: &AtomicScript,
        keys: &[String],
        args: &[ScriptArg],
    ) -> StoreResult<ScriptReply> {
        let mut guard = self.lock()?;

        // Scripts work on a copy of their declared keys and only commit on
        // success, so a failing script leaves no partial writes behind. As in
        // Redis, a script may only touch the keys it is given.
        let mut scratch: HashMap<String, Entry> = keys
            .iter()
            .filter_map(|key| guard.get(key).map(|entry| (key.clone(), entry.clone())))
            .collect();
        let reply =
            script.run_native(&mut KeySpace::new(&mut scratch, self.clock.now_ms()), keys, args)?;

        for key in keys {
            match scratch.remove(key) {
                Some(entry) => {
                    guard.insert(key.clone(), entry);
                }
                None => {
                    guard.remove(key);
                }
            }
        }

        Ok(reply)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}

/// Lazily-expiring view over the entry map at one instant
struct KeySpace<'a> {
    entries: &'a mut HashMap<String, Entry>,
    now_ms: u64,
}

impl<'a> KeySpace<'a> {
    fn new(entries: &'a mut HashMap<String, Entry>, now_ms: u64) -> Self {
        Self { entries, now_ms }
    }

    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at_ms)
            .is_some_and(|at| at <= self.now_ms);
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

impl ScriptContext for KeySpace<'_> {
    fn get(&mut self, key: &str) -> Option<String> {
        self.live(key).map(|e| e.value.clone())
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at_ms: None,
            },
        );
    }

    fn incr(&mut self, key: &str) -> StoreResult<i64> {
        match self.live(key) {
            Some(entry) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    StoreError::Protocol(format!("value at {key} is not an integer"))
                })?;
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                self.set(key, "1".to_string());
                Ok(1)
            }
        }
    }

    fn pexpire(&mut self, key: &str, ttl: Duration, only_if_absent: bool) -> bool {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let at = self.now_ms.saturating_add(ttl_ms);
        match self.live(key) {
            Some(entry) if only_if_absent && entry.expires_at_ms.is_some() => false,
            Some(entry) => {
                entry.expires_at_ms = Some(at);
                true
            }
            None => false,
        }
    }

    fn ttl(&mut self, key: &str) -> KeyTtl {
        let now_ms = self.now_ms;
        match self.live(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at_ms: None,
                ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at_ms: Some(at),
                ..
            }) => KeyTtl::Expires(Duration::from_millis(at.saturating_sub(now_ms))),
        }
    }
}
