//! Password reset tokens.
//!
//! Only the SHA-256 hash of a token is stored; the plain token is emailed
//! to the user and presented back in the reset link.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use shopfront_core::UserId;

use super::RepositoryError;

/// How long a reset link stays valid, in minutes.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// A freshly generated reset token.
pub struct ResetToken {
    /// Sent to the user.
    pub token: String,
    /// Stored in the database.
    pub token_hash: String,
    /// When the token stops working.
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Generate a random 256-bit token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        Self {
            token_hash: hash_token(&token),
            token,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}

/// SHA-256 of a token, hex encoded.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

/// Repository for password reset tokens.
pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    /// Create a new password reset repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a token for a user, invalidating any earlier unused tokens.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, user_id: UserId, token: &ResetToken) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE password_reset_tokens SET used_at = now()
             WHERE user_id = $1 AND used_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Whether a token is currently usable (for rendering the reset form).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_valid(&self, token: &str) -> Result<bool, RepositoryError> {
        let (valid,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM password_reset_tokens
                WHERE token_hash = $1 AND used_at IS NULL AND expires_at > now()
             )",
        )
        .bind(hash_token(token))
        .fetch_one(self.pool)
        .await?;

        Ok(valid)
    }

    /// Mark a token used and return its user. `None` if the token is
    /// unknown, expired or already used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "UPDATE password_reset_tokens SET used_at = now()
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > now()
             RETURNING user_id",
        )
        .bind(hash_token(token))
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id,)| UserId::new(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token = ResetToken::generate();
        assert_eq!(token.token.len(), 64);
        assert_eq!(token.token_hash, hash_token(&token.token));
        assert_ne!(token.token, token.token_hash);
        assert!(token.expires_at > Utc::now());
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_token("abc"), hash_token(" abc "));
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
