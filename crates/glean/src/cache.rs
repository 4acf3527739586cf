//! Project id cache.
//!
//! Resolving `group/subgroup/project` to GitLab's numeric project id costs one
//! API round trip, so the reader keeps recent answers in a bounded,
//! time-limited LRU map. Keys include the API base URL so identical paths on
//! different instances never collide.
//!
//! The cache is exposed behind the [`ProjectIdCache`] trait. [`LruTtlCache`]
//! is the default implementation and can be constructed and tested on its
//! own; readers accept any implementation through
//! [`GitLabUrlReader::with_cache`](crate::GitLabUrlReader::with_cache).

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::config::ReaderOptions;

/// Composite cache key: API identity plus repository path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Resolved API base URL of the instance.
    pub api_identity: String,
    /// Full repository path, e.g. "group/subgroup/project".
    pub repository_path: String,
}

impl CacheKey {
    pub fn new(api_identity: impl Into<String>, repository_path: impl Into<String>) -> Self {
        Self {
            api_identity: api_identity.into(),
            repository_path: repository_path.into(),
        }
    }
}

/// Capability interface for project id caching.
///
/// Implementations must tolerate interleaved `get`/`set` calls from
/// concurrent lookups. Two cold lookups for the same key may both miss;
/// no single-flight deduplication is expected.
pub trait ProjectIdCache: Send + Sync {
    /// Look up a live entry, promoting it to most recently used.
    fn get(&self, key: &CacheKey) -> Option<u64>;

    /// Insert or refresh an entry.
    fn set(&self, key: CacheKey, project_id: u64);
}

/// A cached project id resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdCacheEntry {
    pub repository_path: String,
    pub project_id: u64,
    pub last_updated: Instant,
}

/// LRU cache with per-entry time to live.
///
/// Expired entries are dropped when `get` finds them.
pub struct LruTtlCache {
    ttl: Duration,
    max_size: usize,
    inner: Mutex<LruCache<CacheKey, ProjectIdCacheEntry>>,
}

impl LruTtlCache {
    /// Create a cache holding at most `max_size` entries for `ttl` each.
    ///
    /// A `max_size` of zero disables caching.
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        // `set` refuses to store anything at zero, so the floor of one slot
        // is never used.
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            max_size,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Create a cache from reader options.
    pub fn from_options(options: &ReaderOptions) -> Self {
        Self::new(
            options.project_id_cache_ttl(),
            options.project_id_cache_max_size,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inspect an entry without promoting it or checking expiry.
    pub fn peek(&self, key: &CacheKey) -> Option<ProjectIdCacheEntry> {
        self.lock().peek(key).cloned()
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, ProjectIdCacheEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProjectIdCache for LruTtlCache {
    fn get(&self, key: &CacheKey) -> Option<u64> {
        let mut cache = self.lock();
        let (last_updated, project_id) = cache
            .get(key)
            .map(|entry| (entry.last_updated, entry.project_id))?;

        if last_updated.elapsed() > self.ttl {
            tracing::debug!(
                api = %key.api_identity,
                path = %key.repository_path,
                "Project id cache entry expired"
            );
            cache.pop(key);
            return None;
        }

        Some(project_id)
    }

    fn set(&self, key: CacheKey, project_id: u64) {
        if self.max_size == 0 {
            return;
        }

        let entry = ProjectIdCacheEntry {
            repository_path: key.repository_path.clone(),
            project_id,
            last_updated: Instant::now(),
        };

        let mut cache = self.lock();
        if let Some((evicted, _)) = cache.push(key.clone(), entry)
            && evicted != key
        {
            tracing::debug!(
                api = %evicted.api_identity,
                path = %evicted.repository_path,
                "Evicting least recently used project id"
            );
        }
    }
}
