//! Session-related types for admin authentication.

use serde::{Deserialize, Serialize};

use shopfront_commerce::models::User;
use shopfront_core::{Email, UserId};

/// Session-stored admin identity.
///
/// Minimal data stored in the session to identify the logged-in admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Admin's user ID.
    pub id: UserId,
    /// Admin's email address.
    pub email: Email,
    /// Admin's display name.
    pub name: String,
}

impl CurrentAdmin {
    /// Session identity for `user`, or `None` unless the user is an admin.
    #[must_use]
    pub fn for_admin(user: &User) -> Option<Self> {
        user.is_admin().then(|| Self {
            id: user.id,
            email: user.email.clone(),
            name: user.full_name.clone(),
        })
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use shopfront_core::UserRole;

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(7),
            email: Email::parse("ops@example.com").unwrap(),
            full_name: "Ops".to_string(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_admins_get_a_session_identity() {
        let admin = CurrentAdmin::for_admin(&user(UserRole::Admin)).unwrap();
        assert_eq!(admin.id, UserId::new(7));
        assert_eq!(admin.name, "Ops");

        assert!(CurrentAdmin::for_admin(&user(UserRole::Customer)).is_none());
    }
}
