//! Shared data and integration layer for Shopfront.
//!
//! Both the storefront and the admin binaries (and the CLI) depend on this
//! crate for the database, authentication, email and object storage.
//!
//! # Modules
//!
//! - [`db`] - `PostgreSQL` repositories, migrations and the key/value cache
//! - [`auth`] - Password authentication and resets
//! - [`email`] - Transactional email via SMTP
//! - [`storage`] - Product image storage
//! - [`env`] - Environment configuration helpers
//! - [`models`] - Domain records returned by the repositories
//! - [`validation`] - Per-field form errors

pub mod auth;
pub mod db;
pub mod email;
pub mod env;
pub mod models;
pub mod storage;
pub mod validation;
