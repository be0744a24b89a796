//! In-memory response cache with TTL expiry, request coalescing and a
//! JSON snapshot on disk.
//!
//! Values are wrapped in [`CacheEntry`] so expiry follows the shop-wide rule:
//! an entry is a miss once `now - stored_at >= ttl`. Concurrent misses for
//! the same key run the loader once (via `moka`'s `try_get_with`) and every
//! waiter receives the same value or the same error. Errors are never cached.
//!
//! The snapshot keeps each entry's original timestamp, so a restart does not
//! extend the life of anything that was cached before it.

use std::future::Future;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use shopfront_core::{CacheEntry, MAX_TTL};

/// Errors reading or writing a cache snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem error.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot is not valid JSON for this cache.
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

/// TTL cache keyed by `K` holding cloneable values.
#[derive(Clone)]
pub struct ResponseCache<K, V> {
    entries: Cache<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> ResponseCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    /// `ttl` is capped at [`MAX_TTL`].
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let ttl = ttl.min(MAX_TTL);
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { entries, ttl }
    }

    /// Configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key`. Expired entries are removed and reported as a
    /// miss.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key).await?;
        if entry.is_expired(self.ttl) {
            self.entries.invalidate(key).await;
            return None;
        }
        Some(entry.value)
    }

    /// Cached value for `key`, or the result of `loader`.
    ///
    /// Concurrent callers missing on the same key share one `loader` run.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, shared between all callers that waited on
    /// it. Nothing is cached on error.
    pub async fn get_or_fetch<E, F, Fut>(&self, key: K, loader: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let entry = self
            .entries
            .try_get_with(key, async move { loader().await.map(CacheEntry::new) })
            .await?;
        Ok(entry.value)
    }

    /// Store a value stamped with the current time.
    pub async fn insert(&self, key: K, value: V) {
        self.entries.insert(key, CacheEntry::new(value)).await;
    }

    /// Remove one entry.
    pub async fn invalidate(&self, key: &K) {
        self.entries.invalidate(key).await;
    }

    /// Remove every entry.
    pub async fn invalidate_all(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Number of entries, after applying pending evictions.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> ResponseCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Write all unexpired entries to `path` as JSON. Returns the number of
    /// entries written.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if serialization or the write fails.
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, SnapshotError> {
        let now = Utc::now();
        let live: Vec<(K, CacheEntry<V>)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now, self.ttl))
            .map(|(key, entry)| (K::clone(&key), entry))
            .collect();

        let json = serde_json::to_vec(&live)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::info!(path = %path.display(), entries = live.len(), "Cache snapshot saved");
        Ok(live.len())
    }

    /// Restore unexpired entries from `path`. A missing file restores nothing.
    /// Returns the number of entries restored.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the file cannot be read or parsed.
    pub async fn load_snapshot(&self, path: &Path) -> Result<usize, SnapshotError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let stored: Vec<(K, CacheEntry<V>)> = serde_json::from_slice(&bytes)?;
        let now = Utc::now();
        let mut restored = 0;
        for (key, entry) in stored {
            if entry.is_expired_at(now, self.ttl) {
                continue;
            }
            self.entries.insert(key, entry).await;
            restored += 1;
        }

        tracing::info!(path = %path.display(), restored, "Cache snapshot loaded");
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeDelta;

    use super::*;

    fn cache(ttl_secs: u64) -> ResponseCache<String, u32> {
        ResponseCache::new(Duration::from_secs(ttl_secs), 100)
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("sf-cache-{name}-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_get_and_insert() {
        let cache = cache(60);
        assert_eq!(cache.get(&"a".to_string()).await, None);

        cache.insert("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));

        cache.invalidate(&"a".to_string()).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_capped() {
        let cache = cache(100_000_000_000);
        assert_eq!(cache.ttl(), MAX_TTL);

        cache.insert("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = cache(60);
        let old = Utc::now() - TimeDelta::seconds(60);
        cache
            .entries
            .insert("stale".to_string(), CacheEntry::stored_at(7, old))
            .await;

        assert_eq!(cache.get(&"stale".to_string()).await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_value() {
        let cache = cache(60);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch("k".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_refetches_expired() {
        let cache = cache(60);
        let old = Utc::now() - TimeDelta::seconds(120);
        cache
            .entries
            .insert("k".to_string(), CacheEntry::stored_at(1, old))
            .await;

        let value = cache
            .get_or_fetch("k".to_string(), || async { Ok::<_, String>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache(60);

        let err = cache
            .get_or_fetch("k".to_string(), || async { Err::<u32, _>("boom".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err.as_str(), "boom");
        assert_eq!(cache.get(&"k".to_string()).await, None);

        let value = cache
            .get_or_fetch("k".to_string(), || async { Ok::<_, String>(5) })
            .await
            .unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_load() {
        let cache = cache(60);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("shared".to_string(), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(9)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 9);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_error() {
        let cache = cache(60);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("bad".to_string(), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<u32, _>("down".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err().as_str(), "down");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = cache(60);
        cache.insert("a".to_string(), 1).await;
        cache.insert("b".to_string(), 2).await;
        assert_eq!(cache.len().await, 2);

        cache.invalidate_all().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_keeps_timestamps() {
        let path = temp_path("roundtrip");
        let source = cache(60);
        let stored_at = Utc::now() - TimeDelta::seconds(10);
        source
            .entries
            .insert("fresh".to_string(), CacheEntry::stored_at(1, stored_at))
            .await;
        source
            .entries
            .insert(
                "stale".to_string(),
                CacheEntry::stored_at(2, Utc::now() - TimeDelta::seconds(61)),
            )
            .await;

        assert_eq!(source.save_snapshot(&path).await.unwrap(), 1);

        let restored = cache(60);
        assert_eq!(restored.load_snapshot(&path).await.unwrap(), 1);
        let entry = restored.entries.get(&"fresh".to_string()).await.unwrap();
        assert_eq!(entry.value, 1);
        assert_eq!(entry.stored_at, stored_at);
        assert_eq!(restored.get(&"stale".to_string()).await, None);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_snapshot_skips_entries_expired_since_save() {
        let path = temp_path("shorter-ttl");
        let source = cache(60);
        source
            .entries
            .insert(
                "k".to_string(),
                CacheEntry::stored_at(1, Utc::now() - TimeDelta::seconds(30)),
            )
            .await;
        source.save_snapshot(&path).await.unwrap();

        let restored = cache(20);
        assert_eq!(restored.load_snapshot(&path).await.unwrap(), 0);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_missing_snapshot() {
        let cache = cache(60);
        let loaded = cache.load_snapshot(&temp_path("missing")).await.unwrap();
        assert_eq!(loaded, 0);
    }

    #[tokio::test]
    async fn test_load_corrupt_snapshot() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let cache = cache(60);
        assert!(matches!(
            cache.load_snapshot(&path).await,
            Err(SnapshotError::Json(_))
        ));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
