//! Database-backed key/value cache with per-entry TTL.
//!
//! Values are stored as JSONB in `cache_entry` together with the time they
//! were written and their TTL. A row is treated as a miss once
//! `now - stored_at >= ttl`; expired rows are removed when read and by
//! [`KvCache::purge_expired`].

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use thiserror::Error;

use shopfront_core::{CacheEntry, MAX_TTL};

/// Errors from the key/value cache.
#[derive(Debug, Error)]
pub enum KvCacheError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
    ttl_seconds: i64,
}

/// Key/value cache stored in `PostgreSQL`.
pub struct KvCache<'a> {
    pool: &'a PgPool,
}

impl<'a> KvCache<'a> {
    /// Create a cache over the shop database.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a value. Absent, expired and undecodable entries are misses.
    ///
    /// # Errors
    ///
    /// Returns `KvCacheError::Database` if the query fails.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KvCacheError> {
        let row = sqlx::query_as::<_, CacheRow>(
            "SELECT value, stored_at, ttl_seconds FROM cache_entry WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let ttl = ttl_from_seconds(row.ttl_seconds);
        let entry = CacheEntry::stored_at(row.value, row.stored_at);
        if entry.is_expired_at(Utc::now(), ttl) {
            tracing::debug!(key, "Cache entry expired");
            self.delete_if_unchanged(key, entry.stored_at).await?;
            return Ok(None);
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.delete_if_unchanged(key, entry.stored_at).await?;
                Ok(None)
            }
        }
    }

    /// Store a value for `ttl`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or the query fails.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), KvCacheError> {
        let value = serde_json::to_value(value)?;
        sqlx::query(
            "INSERT INTO cache_entry (key, value, stored_at, ttl_seconds)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value,
                    stored_at = EXCLUDED.stored_at,
                    ttl_seconds = EXCLUDED.ttl_seconds",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .bind(ttl_to_seconds(ttl))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove an entry. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `KvCacheError::Database` if the query fails.
    pub async fn delete(&self, key: &str) -> Result<bool, KvCacheError> {
        let result = sqlx::query("DELETE FROM cache_entry WHERE key = $1")
            .bind(key)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `KvCacheError::Database` if the query fails.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64, KvCacheError> {
        let result = sqlx::query("DELETE FROM cache_entry WHERE key LIKE $1 ESCAPE '\\'")
            .bind(prefix_pattern(prefix))
            .execute(self.pool)
            .await?;

        let removed = result.rows_affected();
        tracing::debug!(prefix, removed, "Cache prefix invalidated");
        Ok(removed)
    }

    /// Remove all expired entries. Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `KvCacheError::Database` if the query fails.
    pub async fn purge_expired(&self) -> Result<u64, KvCacheError> {
        let result = sqlx::query(
            "DELETE FROM cache_entry
             WHERE $1 - stored_at >= ttl_seconds * INTERVAL '1 second'",
        )
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Return the cached value for `key`, or run `loader`, cache its result
    /// for `ttl` and return it.
    ///
    /// Cache failures are logged and never hide the loaded value; loader
    /// errors are returned and nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns the loader's error.
    pub async fn get_or_set_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => tracing::warn!(key, error = %e, "Cache read failed"),
        }

        let value = loader().await?;
        if let Err(e) = self.set(key, &value, ttl).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    async fn delete_if_unchanged(
        &self,
        key: &str,
        stored_at: DateTime<Utc>,
    ) -> Result<(), KvCacheError> {
        sqlx::query("DELETE FROM cache_entry WHERE key = $1 AND stored_at = $2")
            .bind(key)
            .bind(stored_at)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// `LIKE` pattern matching keys that start with `prefix`.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Seconds stored in `ttl_seconds`, capped at [`MAX_TTL`] so
/// `ttl_seconds * INTERVAL '1 second'` stays inside the interval range.
fn ttl_to_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.min(MAX_TTL).as_secs()).unwrap_or(i64::MAX)
}

fn ttl_from_seconds(seconds: i64) -> Duration {
    Duration::from_secs(u64::try_from(seconds).unwrap_or(0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_pattern_escapes() {
        assert_eq!(prefix_pattern("dashboard:"), "dashboard:%");
        assert_eq!(prefix_pattern("a_b%"), "a\\_b\\%%");
    }

    #[test]
    fn test_ttl_conversions() {
        assert_eq!(ttl_to_seconds(Duration::from_secs(60)), 60);
        assert_eq!(ttl_to_seconds(Duration::from_millis(1500)), 1);
        assert_eq!(
            ttl_to_seconds(Duration::from_secs(u64::MAX)),
            i64::try_from(MAX_TTL.as_secs()).unwrap()
        );
        assert_eq!(ttl_from_seconds(-5), Duration::ZERO);
        assert_eq!(ttl_from_seconds(30), Duration::from_secs(30));
    }
}
