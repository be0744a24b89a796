//! Order repository.
//!
//! Placing an order runs in one transaction: the product rows are locked
//! with `FOR UPDATE`, availability is checked, stock is decremented and the
//! order is written with a price snapshot per line.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use shopfront_core::{
    Email, OrderId, OrderItemId, OrderStatus, OrderTotals, Page, PageRequest, PaymentMethod,
    ProductId, ShippingPolicy, TaxRate, UserId,
};

use super::{RepositoryError, count_to_u64, quantity_to_i32};
use crate::models::catalog::like_pattern;
use crate::models::{
    DashboardStats, NewOrder, Order, OrderDetail, OrderItem, ShippingAddress, StatusCount,
};

/// Characters used in order numbers (no 0/O or 1/I).
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_LEN: usize = 10;

const ORDER_COLUMNS: &str = "id, order_number, user_id, email, status, payment_method,
        full_name, phone, address_line1, address_line2, city, postal_code, country, notes,
        subtotal, shipping, tax, total, created_at, updated_at";

/// Errors from placing or updating orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order has no lines.
    #[error("order has no items")]
    Empty,

    /// A product is missing or no longer published.
    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),

    /// Not enough stock to fill a line.
    #[error("only {available} of {product} left in stock")]
    InsufficientStock {
        product_id: ProductId,
        product: String,
        available: i32,
    },

    /// The requested status change is not allowed.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order does not exist.
    #[error("order not found")]
    NotFound,

    /// Repository/database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Generate a customer-facing order number such as `SF-7KQ2M9XD3A`.
#[must_use]
pub fn generate_order_number() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_NUMBER_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ORDER_NUMBER_ALPHABET.len());
            char::from(ORDER_NUMBER_ALPHABET.get(idx).copied().unwrap_or(b'X'))
        })
        .collect();
    format!("SF-{suffix}")
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: Option<i32>,
    email: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    full_name: String,
    phone: Option<String>,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    postal_code: String,
    country: String,
    notes: Option<String>,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order email in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            user_id: row.user_id.map(UserId::new),
            email,
            status: row.status,
            payment_method: row.payment_method,
            address: ShippingAddress {
                full_name: row.full_name,
                phone: row.phone,
                line1: row.address_line1,
                line2: row.address_line2,
                city: row.city,
                postal_code: row.postal_code,
                country: row.country,
            },
            notes: row.notes,
            subtotal: row.subtotal,
            shipping: row.shipping,
            tax: row.tax,
            total: row.total,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LockedProductRow {
    id: i32,
    name: String,
    price: Decimal,
    stock: i32,
    is_published: bool,
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// Prices are read from the catalog inside the transaction, so the order
    /// reflects what the product cost at the moment it was placed.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Empty`, `OrderError::ProductUnavailable` or
    /// `OrderError::InsufficientStock` when the order cannot be filled; no
    /// changes are written in that case.
    pub async fn place(
        &self,
        new_order: &NewOrder,
        shipping: &ShippingPolicy,
        tax_rate: TaxRate,
    ) -> Result<OrderDetail, OrderError> {
        // Merge duplicate lines so stock is checked against the total.
        let mut wanted: Vec<(ProductId, u32)> = Vec::new();
        for line in new_order.lines.iter().filter(|l| l.quantity > 0) {
            match wanted.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
                None => wanted.push((line.product_id, line.quantity)),
            }
        }
        if wanted.is_empty() {
            return Err(OrderError::Empty);
        }

        let mut tx = self.pool.begin().await?;

        let mut ids: Vec<i32> = wanted.iter().map(|(id, _)| id.as_i32()).collect();
        ids.sort_unstable();
        let locked = sqlx::query_as::<_, LockedProductRow>(
            "SELECT id, name, price, stock, is_published
             FROM products
             WHERE id = ANY($1)
             ORDER BY id
             FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
        let locked: HashMap<i32, LockedProductRow> =
            locked.into_iter().map(|row| (row.id, row)).collect();

        let mut priced = Vec::with_capacity(wanted.len());
        for (product_id, quantity) in &wanted {
            let product = locked
                .get(&product_id.as_i32())
                .filter(|p| p.is_published)
                .ok_or(OrderError::ProductUnavailable(*product_id))?;
            if i64::from(product.stock) < i64::from(*quantity) {
                return Err(OrderError::InsufficientStock {
                    product_id: *product_id,
                    product: product.name.clone(),
                    available: product.stock,
                });
            }
            priced.push((product, *quantity));
        }

        let totals = OrderTotals::compute(
            priced.iter().map(|(p, qty)| (p.price, *qty)),
            shipping,
            tax_rate,
        );

        for (product, quantity) in &priced {
            sqlx::query("UPDATE products SET stock = stock - $2, updated_at = now() WHERE id = $1")
                .bind(product.id)
                .bind(quantity_to_i32(*quantity)?)
                .execute(&mut *tx)
                .await?;
        }

        let order_id = insert_order(&mut tx, new_order, &totals).await?;

        for (product, quantity) in &priced {
            let quantity = quantity_to_i32(*quantity)?;
            sqlx::query(
                "INSERT INTO order_items
                    (order_id, product_id, product_name, unit_price, quantity, line_total)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order_id)
            .bind(product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(quantity)
            .bind(product.price * Decimal::from(quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            items = totals.item_count,
            total = %totals.total,
            "Order placed"
        );

        self.get_by_id(order_id).await?.ok_or(OrderError::NotFound)
    }

    /// Get an order with its items by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        self.with_items(row).await
    }

    /// Get an order with its items by order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_number.trim().to_uppercase())
            .fetch_optional(self.pool)
            .await?;

        self.with_items(row).await
    }

    /// Look up an order by number and the email it was placed with (guest
    /// order tracking).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_tracking(
        &self,
        order_number: &str,
        email: &Email,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let sql =
            format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1 AND email = $2");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_number.trim().to_uppercase())
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;

        self.with_items(row).await
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        into_orders(rows)
    }

    /// List orders for the back-office, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_admin(
        &self,
        status: Option<OrderStatus>,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let pattern = search.map(str::trim).filter(|s| !s.is_empty()).map(like_pattern);
        let condition = "WHERE ($1::order_status IS NULL OR status = $1)
               AND ($2::text IS NULL OR order_number ILIKE $2 ESCAPE '\\' OR email ILIKE $2 ESCAPE '\\')";

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             {condition}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(status)
            .bind(pattern.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM orders {condition}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(status)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        Ok(Page::new(into_orders(rows)?, page, count_to_u64(total)?))
    }

    /// Move an order to a new status.
    ///
    /// Cancelling returns the ordered quantities to stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist and
    /// `OrderError::InvalidTransition` if the change is not allowed.
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(OrderStatus,)> =
            sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (current,) = current.ok_or(OrderError::NotFound)?;

        if !current.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        if next == OrderStatus::Cancelled {
            sqlx::query(
                "UPDATE products p
                 SET stock = p.stock + oi.quantity, updated_at = now()
                 FROM order_items oi
                 WHERE oi.order_id = $1 AND oi.product_id = p.id",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            "UPDATE orders SET status = $2, updated_at = now()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_id = %id, from = %current, to = %next, "Order status updated");
        Ok(row.try_into()?)
    }

    /// Aggregates for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn dashboard_stats(&self, recent: i64) -> Result<DashboardStats, RepositoryError> {
        let counts: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                .fetch_all(self.pool)
                .await?;
        let status_counts = OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counts
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map_or(0, |(_, c)| *c),
            })
            .collect();

        let (revenue,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status <> 'cancelled'",
        )
        .fetch_one(self.pool)
        .await?;

        let (product_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;
        let (user_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        let recent_orders = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(recent)
            .fetch_all(self.pool)
            .await?;

        Ok(DashboardStats {
            status_counts,
            revenue,
            product_count,
            user_count,
            recent_orders: into_orders(recent_orders)?,
        })
    }

    async fn with_items(
        &self,
        row: Option<OrderRow>,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let order: Order = row.try_into()?;

        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, product_name, unit_price, quantity, line_total
             FROM order_items
             WHERE order_id = $1
             ORDER BY id",
        )
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(OrderDetail {
            order,
            items: items.into_iter().map(Into::into).collect(),
        }))
    }
}

async fn insert_order(
    tx: &mut Transaction<'_, Postgres>,
    new_order: &NewOrder,
    totals: &OrderTotals,
) -> Result<OrderId, OrderError> {
    let address = &new_order.address;
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO orders
            (order_number, user_id, email, payment_method, full_name, phone,
             address_line1, address_line2, city, postal_code, country, notes,
             subtotal, shipping, tax, total)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
         RETURNING id",
    )
    .bind(generate_order_number())
    .bind(new_order.user_id)
    .bind(new_order.email.as_str())
    .bind(new_order.payment_method)
    .bind(&address.full_name)
    .bind(address.phone.as_deref())
    .bind(&address.line1)
    .bind(address.line2.as_deref())
    .bind(&address.city)
    .bind(&address.postal_code)
    .bind(&address.country)
    .bind(new_order.notes.as_deref())
    .bind(totals.subtotal)
    .bind(totals.shipping)
    .bind(totals.tax)
    .bind(totals.total)
    .fetch_one(&mut **tx)
    .await?;

    Ok(OrderId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert_eq!(number.len(), 3 + ORDER_NUMBER_LEN);
        let suffix = number.strip_prefix("SF-").unwrap();
        assert!(suffix.bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_order_numbers_differ() {
        assert_ne!(generate_order_number(), generate_order_number());
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = OrderError::InsufficientStock {
            product_id: ProductId::new(1),
            product: "Blue Mug".to_string(),
            available: 2,
        };
        assert_eq!(err.to_string(), "only 2 of Blue Mug left in stock");
    }
}
