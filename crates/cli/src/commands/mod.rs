//! CLI subcommands.

pub mod admin;
pub mod cache;
pub mod migrate;
pub mod seed;

use shopfront_commerce::db;
use shopfront_commerce::env::{ConfigError, get_database_url, load_dotenv};
use sqlx::PgPool;

/// Errors shared by every command that talks to the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Database URL missing from the environment.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Load `.env` and connect to the database.
///
/// # Errors
///
/// Returns an error if no database URL is set or the connection fails.
pub async fn connect() -> Result<PgPool, ConnectError> {
    load_dotenv();

    let database_url = get_database_url("ADMIN_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
