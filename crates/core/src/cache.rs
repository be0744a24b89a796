//! TTL bookkeeping for cached values.
//!
//! Both the in-memory response cache and the database-backed key/value cache
//! store values alongside the time they were written. An entry is valid
//! until `now - stored_at >= ttl`, after which it is treated as a miss.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Longest TTL either cache accepts (30 days).
pub const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A cached value with the time it was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,
    /// When the value was written.
    pub stored_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Wrap a value stored now.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::stored_at(value, Utc::now())
    }

    /// Wrap a value with an explicit timestamp.
    #[must_use]
    pub const fn stored_at(value: T, stored_at: DateTime<Utc>) -> Self {
        Self { value, stored_at }
    }

    /// Time elapsed since the value was stored. Negative when the clock moved
    /// backwards.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.stored_at
    }

    /// Whether the entry has expired at `now`.
    ///
    /// ```
    /// use std::time::Duration;
    /// use chrono::{TimeDelta, Utc};
    /// use shopfront_core::CacheEntry;
    ///
    /// let stored = Utc::now();
    /// let entry = CacheEntry::stored_at("v", stored);
    /// let ttl = Duration::from_secs(60);
    ///
    /// assert!(!entry.is_expired_at(stored + TimeDelta::seconds(59), ttl));
    /// assert!(entry.is_expired_at(stored + TimeDelta::seconds(60), ttl));
    /// ```
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        // A TTL too large for TimeDelta never expires.
        TimeDelta::from_std(ttl).is_ok_and(|ttl| self.age_at(now) >= ttl)
    }

    /// Whether the entry has expired now.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(Utc::now(), ttl)
    }

    /// Remaining validity at `now`, or `None` once expired.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>, ttl: Duration) -> Option<Duration> {
        if self.is_expired_at(now, ttl) {
            return None;
        }
        let age = self.age_at(now).to_std().unwrap_or(Duration::ZERO);
        Some(ttl.saturating_sub(age))
    }

    /// Transform the value, keeping the timestamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            value: f(self.value),
            stored_at: self.stored_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let entry = CacheEntry::stored_at(1, at(0));
        let ttl = Duration::from_secs(300);

        assert!(!entry.is_expired_at(at(0), ttl));
        assert!(!entry.is_expired_at(at(299), ttl));
        assert!(entry.is_expired_at(at(300), ttl));
        assert!(entry.is_expired_at(at(301), ttl));
    }

    #[test]
    fn test_zero_ttl_is_always_expired() {
        let entry = CacheEntry::stored_at("x", at(10));
        assert!(entry.is_expired_at(at(10), Duration::ZERO));
    }

    #[test]
    fn test_clock_skew_is_not_expired() {
        let entry = CacheEntry::stored_at("x", at(100));
        assert!(!entry.is_expired_at(at(50), Duration::from_secs(1)));
    }

    #[test]
    fn test_remaining() {
        let entry = CacheEntry::stored_at((), at(0));
        let ttl = Duration::from_secs(60);

        assert_eq!(entry.remaining_at(at(20), ttl), Some(Duration::from_secs(40)));
        assert_eq!(entry.remaining_at(at(60), ttl), None);
    }

    #[test]
    fn test_serde_keeps_timestamp() {
        let entry = CacheEntry::stored_at(vec![1, 2], at(5));
        let json = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry<Vec<i32>> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_map() {
        let entry = CacheEntry::stored_at(2, at(0)).map(|n| n * 2);
        assert_eq!(entry.value, 4);
        assert_eq!(entry.stored_at, at(0));
    }
}
