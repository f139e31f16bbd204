//! In-memory key-value cache with per-entry TTL.
//!
//! Entries are evicted lazily: an expired entry is removed the next time
//! it is read. Entries that expire and are never read again stay in the
//! map, so long-running processes with heavy key churn will see the map
//! grow; the working set here is small enough that this is acceptable.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use serde_json::Value;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Shared TTL cache. Cloning shares the underlying store, so a single
/// instance can be constructed at startup and handed to every component
/// that needs it. Tests construct their own isolated instances.
#[derive(Clone)]
pub struct TtlCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store a value, replacing any previous entry for the key.
    /// The entry expires `ttl` from now.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Look up a key. Returns `None` for absent or expired entries;
    /// expired entries are removed on the way out.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Remove a single entry.
    pub fn delete(&self, key: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.clear();
    }

    /// Number of stored entries, including expired-but-unread ones.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}
