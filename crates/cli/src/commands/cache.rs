//! Key/value cache maintenance.

use shopfront_commerce::db::{KvCache, KvCacheError};
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Cache(#[from] KvCacheError),
}

/// Delete expired cache rows.
///
/// Expired rows are already ignored on read; this only reclaims space.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn purge() -> Result<(), CacheError> {
    let pool = connect().await?;

    let removed = KvCache::new(&pool).purge_expired().await?;
    tracing::info!(removed, "Expired cache entries purged");
    Ok(())
}
