//! In-process TTL cache of per-document clause sets
//!
//! Entries are replaced atomically on set; the sweeper takes no lock on
//! readers, so a stale read within the TTL window is acceptable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use clauselens_core::ClauseRecord;

/// Cache key schema
pub struct CacheKeys;

impl CacheKeys {
    /// Key for a document's clause set: `clauses:<doc_id>`
    pub fn document_clauses(doc_id: &str) -> String {
        format!("clauses:{}", doc_id)
    }
}

/// Cache counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
}

struct CacheEntry {
    value: Arc<Vec<ClauseRecord>>,
    expires_at: Instant,
}

/// TTL cache for clause sets
pub struct ClauseCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ClauseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a live entry; expired entries are evicted and count as misses
    pub fn get(&self, key: &str) -> Option<Arc<Vec<ClauseRecord>>> {
        let now = Instant::now();
        let mut expired = false;

        // The read guard must drop before any removal on the same shard
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            expired = true;
        }

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert with the default TTL
    pub fn set(&self, key: impl AsRef<str>, value: Vec<ClauseRecord>) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL; replaces any existing entry atomically
    pub fn set_with_ttl(&self, key: impl AsRef<str>, value: Vec<ClauseRecord>, ttl: Duration) {
        self.entries.insert(
            key.as_ref().to_string(),
            CacheEntry {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove expired entries; returns how many were evicted
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            size: self.entries.len(),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Spawn the periodic sweeper. The task holds only a weak handle and
    /// exits once the cache is dropped.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::downgrade(&self);
        drop(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        let evicted = cache.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, "Cache sweep evicted expired entries");
                        }
                    },
                    None => break,
                }
            }
        })
    }
}
