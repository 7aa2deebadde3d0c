//! A bounded LRU cache from source text to compiled [`ExpressionNode`],
//! so repeated `Evaluate(resource, sameSrc)` calls skip re-lexing and
//! re-parsing (spec §4.6).

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::ast::ExpressionNode;
use crate::error::Result;
use crate::parser::parse;

/// How an [`ExpressionCache`] is sized.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// `None` means unbounded; `Some(0)` means disabled (never caches).
    capacity: Option<usize>,
}

impl CacheConfig {
    /// A capacity-1000 cache, the crate's default.
    pub fn default_sized() -> Self {
        Self { capacity: Some(1000) }
    }

    /// No eviction; grows without bound.
    pub fn unbounded() -> Self {
        Self { capacity: None }
    }

    /// Compiles every call fresh; `Get` always misses.
    pub fn disabled() -> Self {
        Self { capacity: Some(0) }
    }

    /// A cache holding at most `capacity` compiled expressions.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::default_sized()
    }
}

/// Point-in-time cache statistics, per spec §4.6's `Stats` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub limit: Option<usize>,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, `0.0` when nothing has been looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

enum Storage {
    Bounded(Mutex<LruCache<String, ExpressionNode>>),
    Unbounded(Mutex<std::collections::HashMap<String, ExpressionNode>>),
    Disabled,
}

/// A thread-safe `source text -> compiled Expression` cache.
///
/// Parsing is deterministic and side-effect-free, so concurrent callers
/// compiling the same never-yet-cached source redundantly is harmless:
/// the lock only ever guards the cache's own bookkeeping, not compilation.
pub struct ExpressionCache {
    storage: Storage,
    limit: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ExpressionCache {
    pub fn new(config: CacheConfig) -> Self {
        let storage = match config.capacity {
            Some(0) => Storage::Disabled,
            Some(n) => Storage::Bounded(Mutex::new(LruCache::new(
                NonZeroUsize::new(n).unwrap_or(NonZeroUsize::new(1).unwrap()),
            ))),
            None => Storage::Unbounded(Mutex::new(std::collections::HashMap::new())),
        };
        Self {
            storage,
            limit: config.capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a compiled expression, parsing and inserting on a miss.
    pub fn get(&self, source: &str) -> Result<ExpressionNode> {
        match &self.storage {
            Storage::Disabled => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                parse(source)
            }
            Storage::Bounded(cache) => {
                if let Some(hit) = cache.lock().get(source).cloned() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(hit);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                let node = parse(source)?;
                cache.lock().put(source.to_string(), node.clone());
                Ok(node)
            }
            Storage::Unbounded(cache) => {
                if let Some(hit) = cache.lock().get(source).cloned() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(hit);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                let node = parse(source)?;
                cache.lock().insert(source.to_string(), node.clone());
                Ok(node)
            }
        }
    }

    pub fn clear(&self) {
        match &self.storage {
            Storage::Disabled => {}
            Storage::Bounded(cache) => cache.lock().clear(),
            Storage::Unbounded(cache) => cache.lock().clear(),
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn size(&self) -> usize {
        match &self.storage {
            Storage::Disabled => 0,
            Storage::Bounded(cache) => cache.lock().len(),
            Storage::Unbounded(cache) => cache.lock().len(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.size(),
            limit: self.limit,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lookup_of_same_source_is_a_hit() {
        let cache = ExpressionCache::default();
        cache.get("Patient.name").unwrap();
        cache.get("Patient.name").unwrap();
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn disabled_cache_never_reports_a_hit() {
        let cache = ExpressionCache::new(CacheConfig::disabled());
        cache.get("Patient.name").unwrap();
        cache.get("Patient.name").unwrap();
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn clear_resets_size_and_counters() {
        let cache = ExpressionCache::default();
        cache.get("Patient.name").unwrap();
        cache.clear();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn parse_error_is_not_cached() {
        let cache = ExpressionCache::default();
        assert!(cache.get("(((").is_err());
        assert_eq!(cache.size(), 0);
    }
}
