//! Session-related types.
//!
//! Types stored in the session for authentication and guest state.

use serde::{Deserialize, Serialize};

use shopfront_commerce::models::User;
use shopfront_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub full_name: String,
    /// Whether the user may view any order.
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            is_admin: user.is_admin(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart.
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for order numbers placed in this session (guest order access).
    pub const PLACED_ORDERS: &str = "placed_orders";
}
