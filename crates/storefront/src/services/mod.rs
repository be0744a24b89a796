//! Business logic services for storefront.
//!
//! # Services
//!
//! - `catalog` - Cached product and category reads
//! - `cart` - Guest (session) and persistent carts
//! - `checkout` - Checkout form validation and order placement

pub mod cart;
pub mod catalog;
pub mod checkout;
