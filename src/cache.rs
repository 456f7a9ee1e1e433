//! Two-tier TTL cache in front of the upstream feed clients.
//!
//! - Fast tier: in-process `HashMap`, lost on restart.
//! - Durable tier: pluggable [`DurableStore`] (one JSON file per entry in
//!   the default [`FileStore`]), the only state surviving restart.
//!
//! Reads check the fast tier first, then the durable tier (promoting a live
//! hit into the fast tier). Expired entries are purged lazily on read.
//! Writes always land in the fast tier and are attempted against the
//! durable tier; a full durable tier triggers an oldest-half eviction and
//! the failed write is swallowed — the entry stays valid for the current
//! process lifetime only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A single cached payload with its validity window.
///
/// Invariant: `expires_at = created_at + ttl`; the entry is readable iff
/// `now < expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &str, value: serde_json::Value, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key: key.to_string(),
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Time source, injected so TTL behavior is testable on a simulated clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Error surface of the durable tier. Only capacity is distinguished; the
/// cache layer recovers from it via eviction and never surfaces it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("durable store is full")]
    Full,
    #[error("durable store I/O failure: {0}")]
    Io(String),
}

/// Durable key-value tier. Implementations must treat malformed stored
/// entries as absent, never as an error.
pub trait DurableStore: Send + Sync {
    fn load(&self, key: &str) -> Option<CacheEntry>;
    fn store(&self, entry: &CacheEntry) -> Result<(), StoreError>;
    fn delete(&self, key: &str);
    /// All currently stored entries, in no particular order.
    fn entries(&self) -> Vec<CacheEntry>;
    fn clear(&self);
}

/// File-backed durable tier: one JSON file per entry under `dir`.
pub struct FileStore {
    dir: PathBuf,
    max_entries: usize,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>, max_entries: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            max_entries,
        }
    }

    /// Map a cache key to a filename. Keys are engine-controlled
    /// (`weather:47.3769,8.5417` style) so lossy sanitization is safe.
    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl DurableStore for FileStore {
    fn load(&self, key: &str) -> Option<CacheEntry> {
        let raw = std::fs::read_to_string(self.path_for(key)).ok()?;
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Malformed on disk — treat as a miss and drop the file.
                tracing::warn!("Discarding malformed cache entry '{}': {}", key, e);
                self.delete(key);
                None
            }
        }
    }

    fn store(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let path = self.path_for(&entry.key);
        if !path.exists() {
            let count = self.entries().len();
            if count >= self.max_entries {
                return Err(StoreError::Full);
            }
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let raw = serde_json::to_string(entry).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::write(&path, raw).map_err(|e| StoreError::Io(e.to_string()))
    }

    fn delete(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }

    fn entries(&self) -> Vec<CacheEntry> {
        let Ok(dir) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        dir.filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|e| {
                let raw = std::fs::read_to_string(e.path()).ok()?;
                serde_json::from_str::<CacheEntry>(&raw).ok()
            })
            .collect()
    }

    fn clear(&self) {
        let Ok(dir) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for e in dir.filter_map(|e| e.ok()) {
            if e.path().extension().is_some_and(|ext| ext == "json") {
                let _ = std::fs::remove_file(e.path());
            }
        }
    }
}

/// Two-tier cache: fast in-process map over a durable store.
pub struct TieredCache {
    fast: Mutex<HashMap<String, CacheEntry>>,
    durable: Box<dyn DurableStore>,
    clock: Box<dyn Clock>,
}

impl TieredCache {
    pub fn new(durable: Box<dyn DurableStore>) -> Self {
        Self::with_clock(durable, Box::new(SystemClock))
    }

    pub fn with_clock(durable: Box<dyn DurableStore>, clock: Box<dyn Clock>) -> Self {
        Self {
            fast: Mutex::new(HashMap::new()),
            durable,
            clock,
        }
    }

    /// Read through both tiers. Expired entries are deleted on sight and
    /// reported as absent; a live durable hit is promoted into the fast tier.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = self.clock.now();

        {
            let mut fast = self.lock_fast();
            if let Some(entry) = fast.get(key) {
                if entry.is_live(now) {
                    return Some(entry.value.clone());
                }
                fast.remove(key);
            }
        }

        let entry = self.durable.load(key)?;
        if entry.is_live(now) {
            let value = entry.value.clone();
            self.lock_fast().insert(key.to_string(), entry);
            Some(value)
        } else {
            self.durable.delete(key);
            None
        }
    }

    /// Read through both tiers regardless of expiry, reporting liveness as
    /// the second element. Unlike [`get`](Self::get) this never purges:
    /// callers use it when an expired payload is still better than nothing
    /// (upstream outage grace), and the next successful `set` overwrites
    /// the stale entry anyway.
    pub fn get_any(&self, key: &str) -> Option<(serde_json::Value, bool)> {
        let now = self.clock.now();

        if let Some(entry) = self.lock_fast().get(key) {
            return Some((entry.value.clone(), entry.is_live(now)));
        }

        let entry = self.durable.load(key)?;
        let live = entry.is_live(now);
        let value = entry.value.clone();
        if live {
            self.lock_fast().insert(key.to_string(), entry);
        }
        Some((value, live))
    }

    /// Write to the fast tier and attempt the durable tier. A full durable
    /// tier evicts its oldest half (by creation time); the failed write is
    /// not retried — the entry remains valid in the fast tier only.
    pub fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let entry = CacheEntry::new(key, value, self.clock.now(), ttl);
        self.lock_fast().insert(key.to_string(), entry.clone());

        match self.durable.store(&entry) {
            Ok(()) => {}
            Err(StoreError::Full) => {
                tracing::warn!("Durable cache full, evicting oldest half");
                self.evict_oldest_half();
            }
            Err(StoreError::Io(msg)) => {
                tracing::warn!("Durable cache write failed for '{}': {}", key, msg);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.lock_fast().remove(key);
        self.durable.delete(key);
    }

    pub fn clear(&self) {
        self.lock_fast().clear();
        self.durable.clear();
    }

    fn evict_oldest_half(&self) {
        let mut entries = self.durable.entries();
        entries.sort_by_key(|e| e.created_at);
        let half = entries.len().div_ceil(2);
        for entry in entries.into_iter().take(half) {
            self.durable.delete(&entry.key);
        }
    }

    fn lock_fast(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        match self.fast.lock() {
            Ok(guard) => guard,
            // A poisoned fast tier only means a panicked reader; the map
            // itself is still structurally sound.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
