//! Shopfront Core - Shared domain types.
//!
//! This crate provides common types used across all Shopfront components:
//! - `storefront` - Customer-facing catalog, cart and checkout
//! - `admin` - Back-office for products, categories, orders and users
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, slugs and statuses
//! - [`cache`] - TTL bookkeeping shared by the in-memory and database caches
//! - [`pricing`] - Order subtotal, shipping and tax computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod pricing;
pub mod types;

pub use cache::{CacheEntry, MAX_TTL};
pub use pricing::{OrderTotals, PricingError, ShippingPolicy, TaxRate};
pub use types::*;
