//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user
//! sf-cli admin create -e admin@example.com -n "Admin Name" -p 'long password'
//!
//! # Give an existing storefront account the admin role
//! sf-cli admin promote -e someone@example.com
//! ```

use shopfront_commerce::auth::{AuthError, AuthService};
use shopfront_commerce::db::{RepositoryError, UserRepository};
use shopfront_core::{Email, EmailError, UserId, UserRole};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Account creation failed (bad input or duplicate email).
    #[error("Could not create admin: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No user with email: {0}")]
    UserNotFound(String),
}

/// Create a new admin user.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken or the
/// database is unreachable.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, AdminError> {
    let pool = connect().await?;

    tracing::info!("Creating admin user: {}", email);
    let user = AuthService::new(&pool)
        .create_user(email, name, password, UserRole::Admin)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

/// Give an existing user the admin role.
///
/// # Errors
///
/// Returns an error if no user has `email` or the database is unreachable.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    if user.role.is_admin() {
        tracing::info!("{} is already an admin", user.email);
        return Ok(());
    }

    let user = users.set_role(user.id, UserRole::Admin).await?;
    tracing::info!("Promoted {} (ID {}) to admin", user.email, user.id);
    Ok(())
}
