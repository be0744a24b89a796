//! Persistent carts for signed-in users.

use rust_decimal::Decimal;
use sqlx::PgPool;

use shopfront_core::{ProductId, Slug, UserId};

use super::{RepositoryError, quantity_to_i32, quantity_to_u32};
use crate::models::CartLine;

/// Maximum units of one product per cart line.
pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: i32,
    name: String,
    slug: String,
    image_url: Option<String>,
    price: Decimal,
    quantity: i32,
    stock: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product slug in database: {e}"))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            slug,
            image_url: row.image_url,
            unit_price: row.price,
            quantity: quantity_to_u32(row.quantity)?,
            stock: row.stock,
        })
    }
}

/// Repository for cart line operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Cart lines for a user, oldest first. Lines for unpublished products
    /// are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT ci.product_id, p.name, p.slug, p.image_url, p.price, ci.quantity, p.stock
             FROM cart_items ci
             JOIN products p ON p.id = ci.product_id
             WHERE ci.user_id = $1 AND p.is_published
             ORDER BY ci.created_at ASC, ci.id ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Current quantity of a product in the user's cart (0 when absent).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<u32, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        row.map_or(Ok(0), |(q,)| quantity_to_u32(q))
    }

    /// Add units of a product, incrementing an existing line. The line is
    /// capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity)
             VALUES ($1, $2, LEAST($3, $4))
             ON CONFLICT (user_id, product_id) DO UPDATE
                SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $4),
                    updated_at = now()",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity_to_i32(quantity)?)
        .bind(quantity_to_i32(MAX_LINE_QUANTITY)?)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        if quantity == 0 {
            return self.remove(user_id, product_id).await;
        }

        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, product_id) DO UPDATE
                SET quantity = EXCLUDED.quantity, updated_at = now()",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity_to_i32(quantity.min(MAX_LINE_QUANTITY))?)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Total units in the cart (published products only).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<u32, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(ci.quantity), 0)::bigint
             FROM cart_items ci
             JOIN products p ON p.id = ci.product_id
             WHERE ci.user_id = $1 AND p.is_published",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        u32::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("invalid cart count: {count}")))
    }

    /// Merge session cart lines into the user's cart.
    ///
    /// Quantities for products already in the cart are added together and
    /// capped at [`MAX_LINE_QUANTITY`]. Lines for products that no longer
    /// exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn merge(
        &self,
        user_id: UserId,
        lines: &[(ProductId, u32)],
    ) -> Result<(), RepositoryError> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut product_ids = Vec::with_capacity(lines.len());
        let mut quantities = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            product_ids.push(product_id.as_i32());
            quantities.push(quantity_to_i32((*quantity).min(MAX_LINE_QUANTITY))?);
        }

        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity)
             SELECT $1, g.product_id, g.quantity
             FROM UNNEST($2::int[], $3::int[]) AS g(product_id, quantity)
             JOIN products p ON p.id = g.product_id
             WHERE g.quantity > 0
             ON CONFLICT (user_id, product_id) DO UPDATE
                SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $4),
                    updated_at = now()",
        )
        .bind(user_id)
        .bind(product_ids)
        .bind(quantities)
        .bind(quantity_to_i32(MAX_LINE_QUANTITY)?)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
