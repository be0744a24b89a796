//! Database operations for the shop `PostgreSQL` database.
//!
//! The storefront, admin and CLI share one database.
//!
//! ## Tables
//!
//! - `users` - Customer and admin accounts (argon2 password hashes)
//! - `password_reset_tokens` - Hashed single-use reset tokens
//! - `categories`, `products` - The catalog
//! - `cart_items` - Persistent carts for signed-in users
//! - `orders`, `order_items` - Placed orders with price snapshots
//! - `cache_entry` - Key/value cache rows with per-entry TTL
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/commerce/migrations/` and run via:
//! ```bash
//! sf-cli migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` and decoded into
//! private `FromRow` row types that convert into the domain models.

pub mod carts;
pub mod categories;
pub mod kv_cache;
pub mod orders;
pub mod password_resets;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use kv_cache::{KvCache, KvCacheError};
pub use orders::{OrderError, OrderRepository};
pub use password_resets::PasswordResetRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Embedded migrations for the shop database.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a count column to `u64`, treating negatives as corruption.
pub(crate) fn count_to_u64(count: i64) -> Result<u64, RepositoryError> {
    u64::try_from(count)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative count: {count}")))
}

/// Convert a database quantity to `u32`.
pub(crate) fn quantity_to_u32(quantity: i32) -> Result<u32, RepositoryError> {
    u32::try_from(quantity)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity: {quantity}")))
}

/// Convert a requested quantity to the `INTEGER` column type.
pub(crate) fn quantity_to_i32(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity out of range: {quantity}")))
}
