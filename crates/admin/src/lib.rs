//! Shopfront admin library.
//!
//! The back-office: catalog and category management, product images,
//! order fulfilment and user roles. Exposed as a library so the binary and
//! tests share it.
//!
//! # Security
//!
//! Every page except the login form requires a signed-in user with the
//! `admin` role. Sessions are separate from the storefront's.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod components;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
