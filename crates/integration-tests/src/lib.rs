//! Integration tests for Shopfront.
//!
//! The tests talk HTTP to running servers and read fixtures from the shared
//! database, so every test is `#[ignore]`d.
//!
//! # Running Tests
//!
//! ```bash
//! sf-cli migrate
//! sf-cli seed catalog seed/catalog.yaml
//! sf-cli admin create -e "$ADMIN_TEST_EMAIL" -n Tester -p "$ADMIN_TEST_PASSWORD"
//! cargo run -p shopfront-storefront &
//! cargo run -p shopfront-admin &
//! cargo test -p shopfront-integration-tests -- --ignored --test-threads=1
//! ```
//!
//! # Environment
//!
//! - `STOREFRONT_BASE_URL` (default `http://localhost:3000`)
//! - `ADMIN_BASE_URL` (default `http://localhost:3001`)
//! - `DATABASE_URL` - the database both servers use
//! - `ADMIN_TEST_EMAIL`, `ADMIN_TEST_PASSWORD` - an admin account
//!
//! `tests/commerce.rs` only needs `DATABASE_URL`.

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use reqwest::Client;
use reqwest::redirect::Policy;
use sqlx::PgPool;

/// Base URL for the storefront.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL for the admin panel.
#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// A client with its own cookie jar that does not follow redirects, so
/// tests can assert on `Location`.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the shared database.
pub async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to database")
}

/// An email address no other test run uses.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// A published product with at least `min_stock` units: `(id, slug)`.
pub async fn stocked_product(pool: &PgPool, min_stock: i32) -> (i32, String) {
    sqlx::query_as(
        "SELECT id, slug FROM products
         WHERE is_published AND stock >= $1
         ORDER BY id LIMIT 1",
    )
    .bind(min_stock)
    .fetch_one(pool)
    .await
    .expect("No stocked product; run `sf-cli seed catalog seed/catalog.yaml`")
}

/// Insert a published product with `stock` units priced at 10.00 and
/// return its id. Remove it with [`delete_product`].
pub async fn insert_test_product(pool: &PgPool, stock: i32) -> i32 {
    let slug = format!("it-product-{}", uuid::Uuid::new_v4().simple());
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO products (name, slug, price, stock, is_published)
         VALUES ('Integration Product', $1, 10.00, $2, TRUE)
         RETURNING id",
    )
    .bind(&slug)
    .bind(stock)
    .fetch_one(pool)
    .await
    .expect("Failed to insert product");
    id
}

/// Current stock of a product.
pub async fn product_stock(pool: &PgPool, id: i32) -> i32 {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to read stock");
    stock
}

/// Delete a product created by [`insert_test_product`].
pub async fn delete_product(pool: &PgPool, id: i32) {
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .expect("Failed to delete product");
}

/// Sign `client` in to the admin panel with the test admin account.
pub async fn admin_login(client: &Client) {
    let email = std::env::var("ADMIN_TEST_EMAIL").expect("ADMIN_TEST_EMAIL must be set");
    let password = std::env::var("ADMIN_TEST_PASSWORD").expect("ADMIN_TEST_PASSWORD must be set");

    let resp = client
        .post(format!("{}/auth/login", admin_url()))
        .form(&[("email", email.as_str()), ("password", password.as_str())])
        .send()
        .await
        .expect("Failed to sign in");

    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/", "admin login was rejected");
}
