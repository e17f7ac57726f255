//! Optional row cache for collection loads.
//!
//! Loaders consult a [`QueryCache`] before executing a SELECT. Entries are
//! keyed by the compiled SQL and its bound parameters, so two loads share an
//! entry only when they would issue the exact same statement.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::model::Row;
use crate::value::Value;

/// A cache of query results.
pub trait QueryCache: Send + Sync + fmt::Debug {
    /// Cached rows for a key, if present and fresh.
    fn get(&self, key: &str) -> Option<Vec<Row>>;

    /// Store rows under a key.
    fn put(&self, key: String, rows: Vec<Row>);

    /// Drop every entry.
    fn invalidate_all(&self);
}

/// A cache shared between loaders.
pub type SharedCache = Arc<dyn QueryCache>;

/// Build the cache key of a statement.
pub fn cache_key(sql: &str, params: &[Value]) -> String {
    let params = serde_json::to_string(params).unwrap_or_default();
    format!("{}|{}", sql, params)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    rows: Vec<Row>,
    inserted_at: Instant,
    seq: u64,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through.
    pub misses: u64,
    /// Entries currently held.
    pub entries: usize,
}

impl CacheStats {
    /// Hit ratio between 0 and 1.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-process cache with a TTL and an entry limit.
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    seq: AtomicU64,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1000, Some(Duration::from_secs(300)))
    }
}

impl MemoryCache {
    /// Create a cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            seq: AtomicU64::new(0),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match self.ttl {
            Some(ttl) => entry.inserted_at.elapsed() < ttl,
            None => true,
        }
    }
}

impl QueryCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<Row>> {
        let found = self
            .entries
            .read()
            .get(key)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.rows.clone());

        match found {
            Some(rows) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(rows)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: String, rows: Vec<Row>) {
        let mut entries = self.entries.write();

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            entries.retain(|_, entry| self.is_fresh(entry));

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.seq)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                rows,
                inserted_at: Instant::now(),
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    fn invalidate_all(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: i64) -> Vec<Row> {
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(n));
        vec![row]
    }

    #[test]
    fn test_put_get() {
        let cache = MemoryCache::default();
        assert!(cache.get("a").is_none());
        cache.put("a".into(), rows(1));
        assert_eq!(cache.get("a"), Some(rows(1)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_entries_miss() {
        let cache = MemoryCache::new(10, Some(Duration::ZERO));
        cache.put("a".into(), rows(1));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let cache = MemoryCache::new(2, None);
        cache.put("a".into(), rows(1));
        cache.put("b".into(), rows(2));
        cache.put("c".into(), rows(3));

        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = MemoryCache::default();
        cache.put("a".into(), rows(1));
        cache.invalidate_all();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cache_key_includes_params() {
        let a = cache_key("SELECT ?", &[Value::Int(1)]);
        let b = cache_key("SELECT ?", &[Value::Int(2)]);
        assert_ne!(a, b);
    }
}
