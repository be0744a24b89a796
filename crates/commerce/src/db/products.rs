//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shopfront_core::{CategoryId, Page, PageRequest, ProductId, Slug};

use super::{RepositoryError, count_to_u64};
use crate::models::catalog::like_pattern;
use crate::models::{Product, ProductFilter, ProductInput};

const PRODUCT_SELECT: &str = "SELECT p.id, p.category_id, c.name AS category_name, p.name, p.slug,
        p.description, p.price, p.stock, p.image_url, p.image_path,
        p.is_published, p.is_featured, p.created_at, p.updated_at
 FROM products p
 LEFT JOIN categories c ON c.id = p.category_id";

/// Search condition shared by the listing and its count. `$1` is the
/// pattern, `$2` the category.
const PUBLISHED_FILTER: &str = "WHERE p.is_published
   AND ($1::text IS NULL OR p.name ILIKE $1 ESCAPE '\\' OR p.description ILIKE $1 ESCAPE '\\')
   AND ($2::int IS NULL OR p.category_id = $2)";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    category_id: Option<i32>,
    category_name: Option<String>,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    stock: i32,
    image_url: Option<String>,
    image_path: Option<String>,
    is_published: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product slug in database: {e}"))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            category_id: row.category_id.map(CategoryId::new),
            category_name: row.category_name,
            name: row.name,
            slug,
            description: row.description,
            price: row.price,
            stock: row.stock,
            image_url: row.image_url,
            image_path: row.image_path,
            is_published: row.is_published,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Storefront queries (published products only)
    // =========================================================================

    /// List published products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_published(
        &self,
        filter: &ProductFilter,
    ) -> Result<Page<Product>, RepositoryError> {
        let pattern = filter.search_pattern();
        let category = filter.category;

        let sql = format!(
            "{PRODUCT_SELECT}
             {PUBLISHED_FILTER}
             ORDER BY {}
             LIMIT $3 OFFSET $4",
            filter.sort.order_by()
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(pattern.as_deref())
            .bind(category)
            .bind(filter.page.limit())
            .bind(filter.page.offset())
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM products p {PUBLISHED_FILTER}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(pattern.as_deref())
            .bind(category)
            .fetch_one(self.pool)
            .await?;

        Ok(Page::new(
            into_products(rows)?,
            filter.page,
            count_to_u64(total)?,
        ))
    }

    /// Get a published product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_published_by_slug(
        &self,
        slug: &Slug,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_published");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(slug.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Featured published products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "{PRODUCT_SELECT}
             WHERE p.is_published AND p.is_featured
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $1"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        into_products(rows)
    }

    /// Get published products by ID (for resolving session carts).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_published_many(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = ANY($1) AND p.is_published");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool)
            .await?;

        into_products(rows)
    }

    // =========================================================================
    // Admin queries
    // =========================================================================

    /// List all products, newest first, optionally searching by name or slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_admin(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let pattern = search.map(str::trim).filter(|s| !s.is_empty()).map(like_pattern);
        let condition =
            "WHERE ($1::text IS NULL OR p.name ILIKE $1 ESCAPE '\\' OR p.slug ILIKE $1 ESCAPE '\\')";

        let sql = format!(
            "{PRODUCT_SELECT}
             {condition}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(pattern.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM products p {condition}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        Ok(Page::new(into_products(rows)?, page, count_to_u64(total)?))
    }

    /// Get any product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO products
                (category_id, name, slug, description, price, stock, is_published, is_featured)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.is_published)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product with this slug"))?;

        self.get_by_id(ProductId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Insert or update a product keyed by slug (used by catalog seeding).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_slug(&self, input: &ProductInput) -> Result<ProductId, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO products
                (category_id, name, slug, description, price, stock, is_published, is_featured)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (slug) DO UPDATE SET
                category_id = EXCLUDED.category_id,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                is_published = EXCLUDED.is_published,
                is_featured = EXCLUDED.is_featured,
                updated_at = now()
             RETURNING id",
        )
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.is_published)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await?;

        Ok(ProductId::new(id))
    }

    /// Update a product's fields (not its image).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET
                category_id = $2, name = $3, slug = $4, description = $5,
                price = $6, stock = $7, is_published = $8, is_featured = $9,
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.is_published)
        .bind(input.is_featured)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product with this slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Record a product's image location.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_image(
        &self,
        id: ProductId,
        image_url: Option<&str>,
        image_path: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET image_url = $2, image_path = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(image_url)
        .bind(image_path)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a product, returning its image storage path if it had one.
    ///
    /// Order items keep their name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<Option<String>, RepositoryError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("DELETE FROM products WHERE id = $1 RETURNING image_path")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(|(path,)| path).ok_or(RepositoryError::NotFound)
    }

    /// Products with stock at or below `threshold`, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: i32,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "{PRODUCT_SELECT}
             WHERE p.stock <= $1
             ORDER BY p.stock ASC, p.name ASC
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(threshold)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        into_products(rows)
    }

    /// Count all products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
