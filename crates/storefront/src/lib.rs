//! Shopfront storefront library.
//!
//! The public shop: catalog browsing, cart, checkout, customer accounts and
//! order tracking. Exposed as a library so the binary and tests share it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
