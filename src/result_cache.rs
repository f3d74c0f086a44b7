use crate::providers::{SystemTimeProvider, TimeProvider};
use crate::report::ValidationResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Trims and lower-cases an idea so trivially different inputs share a key.
pub fn normalize_idea(idea: &str) -> String {
    idea.trim().to_lowercase()
}

/// Hex SHA-256 of the normalized idea text.
pub fn cache_key(idea: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_idea(idea).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage for finished validation results.
pub trait ResultCache: Send + Sync {
    /// Returns a live entry for `key`, dropping it if it has expired.
    fn get(&self, key: &str) -> Option<ValidationResult>;

    fn put(&self, key: &str, result: ValidationResult);

    /// Removes every expired entry, returning how many were dropped.
    fn purge_expired(&self) -> usize;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ValidationResult,
    stored_at: u64,
}

/// In-process cache with a fixed time-to-live and no size bound.
pub struct InMemoryResultCache {
    ttl_secs: u64,
    entries: Mutex<HashMap<String, CacheEntry>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemoryResultCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_time_provider(ttl_secs, Arc::new(SystemTimeProvider))
    }

    /// Creates a cache with a custom time provider (for testing).
    pub fn with_time_provider(ttl_secs: u64, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            ttl_secs,
            entries: Mutex::new(HashMap::new()),
            time_provider,
        }
    }

    fn is_live(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.stored_at) < self.ttl_secs
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned map only means another session panicked mid-insert.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for InMemoryResultCache {
    fn get(&self, key: &str) -> Option<ValidationResult> {
        let now = self.time_provider.now();
        let mut entries = self.lock();

        let live = entries.get(key).map(|entry| self.is_live(entry, now));
        match live {
            Some(true) => {
                info!("Cache hit for {}", key);
                entries.get(key).map(|entry| entry.result.clone())
            }
            Some(false) => {
                debug!("Cache entry {} expired", key);
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, result: ValidationResult) {
        let stored_at = self.time_provider.now();
        self.lock().insert(key.to_string(), CacheEntry { result, stored_at });
        debug!("Stored result for {}", key);
    }

    fn purge_expired(&self) -> usize {
        let now = self.time_provider.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        before - entries.len()
    }
}
