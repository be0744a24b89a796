//! Catalog reads through the response cache.
//!
//! Product listings, product pages, the category list and featured products
//! are cached for `CATALOG_CACHE_TTL_SECS`. Concurrent misses for the same
//! page share one database query. Unknown products and categories are not
//! cached, so newly published items appear as soon as they exist.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use shopfront_commerce::db::{CategoryRepository, ProductRepository, RepositoryError};
use shopfront_commerce::models::{Category, CategorySummary, Product, ProductFilter};
use shopfront_core::{Page, Slug};

use crate::cache::{ResponseCache, SnapshotError};
use crate::config::CatalogCacheConfig;

/// Number of products shown on the home page.
const FEATURED_LIMIT: i64 = 8;

/// Error from a cached catalog read, shared by every coalesced caller.
pub type CatalogError = Arc<RepositoryError>;

/// Cache key for catalog reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogKey {
    Listing(ProductFilter),
    Product(Slug),
    Featured,
    Categories,
    Category(Slug),
}

/// Cached catalog value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CatalogValue {
    Listing(Page<Product>),
    Product(Box<Product>),
    Featured(Vec<Product>),
    Categories(Vec<CategorySummary>),
    Category(Category),
}

fn mismatch(key: &CatalogKey) -> CatalogError {
    Arc::new(RepositoryError::DataCorruption(format!(
        "catalog cache holds the wrong value type for {key:?}"
    )))
}

/// Treat a `NotFound` load as `None`.
fn found<T>(result: Result<T, CatalogError>) -> Result<Option<T>, CatalogError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if matches!(*e, RepositoryError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Cached read access to published products and categories.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
    cache: ResponseCache<CatalogKey, CatalogValue>,
}

impl CatalogService {
    /// Create the service with a cache sized from configuration.
    #[must_use]
    pub fn new(pool: PgPool, config: &CatalogCacheConfig) -> Self {
        Self {
            pool,
            cache: ResponseCache::new(config.ttl, config.capacity),
        }
    }

    /// A page of published products.
    ///
    /// # Errors
    ///
    /// Returns the shared repository error if the query fails.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Page<Product>, CatalogError> {
        let key = CatalogKey::Listing(filter.clone());
        let pool = self.pool.clone();
        let filter = filter.clone();
        let value = self
            .cache
            .get_or_fetch(key.clone(), || async move {
                ProductRepository::new(&pool)
                    .list_published(&filter)
                    .await
                    .map(CatalogValue::Listing)
            })
            .await?;

        match value {
            CatalogValue::Listing(page) => Ok(page),
            _ => Err(mismatch(&key)),
        }
    }

    /// A published product by slug.
    ///
    /// # Errors
    ///
    /// Returns the shared repository error if the query fails.
    pub async fn product(&self, slug: &Slug) -> Result<Option<Product>, CatalogError> {
        let key = CatalogKey::Product(slug.clone());
        let pool = self.pool.clone();
        let slug = slug.clone();
        let value = found(
            self.cache
                .get_or_fetch(key.clone(), || async move {
                    ProductRepository::new(&pool)
                        .get_published_by_slug(&slug)
                        .await?
                        .map(|product| CatalogValue::Product(Box::new(product)))
                        .ok_or(RepositoryError::NotFound)
                })
                .await,
        )?;

        match value {
            None => Ok(None),
            Some(CatalogValue::Product(product)) => Ok(Some(*product)),
            Some(_) => Err(mismatch(&key)),
        }
    }

    /// Featured products for the home page.
    ///
    /// # Errors
    ///
    /// Returns the shared repository error if the query fails.
    pub async fn featured(&self) -> Result<Vec<Product>, CatalogError> {
        let pool = self.pool.clone();
        let value = self
            .cache
            .get_or_fetch(CatalogKey::Featured, || async move {
                ProductRepository::new(&pool)
                    .featured(FEATURED_LIMIT)
                    .await
                    .map(CatalogValue::Featured)
            })
            .await?;

        match value {
            CatalogValue::Featured(products) => Ok(products),
            _ => Err(mismatch(&CatalogKey::Featured)),
        }
    }

    /// Categories with their published product counts.
    ///
    /// # Errors
    ///
    /// Returns the shared repository error if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategorySummary>, CatalogError> {
        let pool = self.pool.clone();
        let value = self
            .cache
            .get_or_fetch(CatalogKey::Categories, || async move {
                CategoryRepository::new(&pool)
                    .list(true)
                    .await
                    .map(CatalogValue::Categories)
            })
            .await?;

        match value {
            CatalogValue::Categories(categories) => Ok(categories),
            _ => Err(mismatch(&CatalogKey::Categories)),
        }
    }

    /// A category by slug.
    ///
    /// # Errors
    ///
    /// Returns the shared repository error if the query fails.
    pub async fn category(&self, slug: &Slug) -> Result<Option<Category>, CatalogError> {
        let key = CatalogKey::Category(slug.clone());
        let pool = self.pool.clone();
        let slug = slug.clone();
        let value = found(
            self.cache
                .get_or_fetch(key.clone(), || async move {
                    CategoryRepository::new(&pool)
                        .get_by_slug(&slug)
                        .await?
                        .map(CatalogValue::Category)
                        .ok_or(RepositoryError::NotFound)
                })
                .await,
        )?;

        match value {
            None => Ok(None),
            Some(CatalogValue::Category(category)) => Ok(Some(category)),
            Some(_) => Err(mismatch(&key)),
        }
    }

    /// Drop every cached catalog response.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }

    /// Restore cached responses saved by a previous run.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the file exists but cannot be read.
    pub async fn load_snapshot(&self, path: &Path) -> Result<usize, SnapshotError> {
        self.cache.load_snapshot(path).await
    }

    /// Save cached responses for the next run.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the file cannot be written.
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, SnapshotError> {
        self.cache.save_snapshot(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_maps_not_found_to_none() {
        let missing: Result<u8, CatalogError> = Err(Arc::new(RepositoryError::NotFound));
        assert!(matches!(found(missing), Ok(None)));

        let present: Result<u8, CatalogError> = Ok(3);
        assert!(matches!(found(present), Ok(Some(3))));

        let failed: Result<u8, CatalogError> =
            Err(Arc::new(RepositoryError::Conflict("x".to_string())));
        assert!(found(failed).is_err());
    }

    #[test]
    fn test_listing_keys_differ_by_filter() {
        let a = CatalogKey::Listing(ProductFilter::default());
        let b = CatalogKey::Listing(ProductFilter {
            query: Some("mug".to_string()),
            ..ProductFilter::default()
        });
        assert_ne!(a, b);
        assert_eq!(a, CatalogKey::Listing(ProductFilter::default()));
    }

    #[test]
    fn test_keys_serialize_for_snapshots() {
        let key = CatalogKey::Product(Slug::parse("blue-mug").unwrap());
        let json = serde_json::to_string(&key).unwrap();
        let back: CatalogKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
