//! Timed LRU storage for rendered pages.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};
use tracing::debug;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};
use super::metrics::{
    PAGE_CACHE_ENTRIES, PAGE_CACHE_EVICT, PAGE_CACHE_EXPIRED, PAGE_CACHE_HIT, PAGE_CACHE_MISS,
};

const SOURCE: &str = "cache::store";

/// Cached HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) >= timeout
    }
}

/// Rendered pages kept for a fixed timeout.
///
/// Entries leave only by timeout, capacity eviction or [`PageCache::clear`];
/// data changes never invalidate them.
pub struct PageCache {
    entries: RwLock<LruCache<CacheKey, Entry>>,
    timeout: Duration,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            timeout: config.index_timeout,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<CachedResponse> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(now, self.timeout),
            None => {
                counter!(PAGE_CACHE_MISS).increment(1);
                debug!(cache = "page", outcome = "miss", key = %key);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            gauge!(PAGE_CACHE_ENTRIES).set(entries.len() as f64);
            counter!(PAGE_CACHE_EXPIRED).increment(1);
            counter!(PAGE_CACHE_MISS).increment(1);
            debug!(cache = "page", outcome = "expired", key = %key);
            return None;
        }

        counter!(PAGE_CACHE_HIT).increment(1);
        debug!(cache = "page", outcome = "hit", key = %key);
        entries.get(key).map(|entry| entry.response.clone())
    }

    pub fn set(&self, key: CacheKey, response: CachedResponse) {
        self.set_at(key, response, Instant::now());
    }

    pub fn set_at(&self, key: CacheKey, response: CachedResponse, now: Instant) {
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        let entry = Entry {
            response,
            stored_at: now,
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(PAGE_CACHE_EVICT).increment(1);
            debug!(cache = "page", outcome = "evicted", key = %evicted);
        }
        gauge!(PAGE_CACHE_ENTRIES).set(entries.len() as f64);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        entries.clear();
        gauge!(PAGE_CACHE_ENTRIES).set(0.0);
        debug!(cache = "page", "cleared");
    }

    /// Drop entries past their timeout. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.timeout))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            counter!(PAGE_CACHE_EXPIRED).increment(expired.len() as u64);
            gauge!(PAGE_CACHE_ENTRIES).set(entries.len() as f64);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
