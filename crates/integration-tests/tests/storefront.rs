//! Integration tests for the storefront: catalog, cart, checkout, tracking.
//!
//! These tests require:
//! - A migrated and seeded `PostgreSQL` database
//! - The storefront server running (cargo run -p shopfront-storefront)
//!
//! Run with: cargo test -p shopfront-integration-tests -- --ignored

use reqwest::StatusCode;
use shopfront_integration_tests::{client, location, pool, stocked_product, storefront_url};

/// Order number from a `/checkout/complete/{number}` redirect.
fn order_number(location: &str) -> String {
    location
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_endpoints() {
    let client = client();
    let base_url = storefront_url();

    let resp = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("Failed to get health");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("Failed to get readiness");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_catalog_pages() {
    let client = client();
    let base_url = storefront_url();
    let pool = pool().await;
    let (_, slug) = stocked_product(&pool, 1).await;

    let resp = client
        .get(format!("{base_url}/products?sort=price_asc"))
        .send()
        .await
        .expect("Failed to list products");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/products/{slug}"))
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("/cart/add"));

    let resp = client
        .get(format!("{base_url}/products/no-such-product-here"))
        .send()
        .await
        .expect("Failed to get missing product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_security_headers() {
    let resp = client()
        .get(format!("{}/", storefront_url()))
        .send()
        .await
        .expect("Failed to get home page");

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(
        headers.get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_guest_checkout_and_tracking() {
    let client = client();
    let base_url = storefront_url();
    let pool = pool().await;
    let (product_id, _) = stocked_product(&pool, 2).await;
    let email = shopfront_integration_tests::unique_email("guest");

    // Empty cart cannot check out
    let resp = client
        .get(format!("{base_url}/checkout"))
        .send()
        .await
        .expect("Failed to get checkout");
    assert_eq!(location(&resp), "/cart?error=empty");

    let resp = client
        .post(format!("{base_url}/cart/add"))
        .form(&[("product_id", product_id.to_string()), ("quantity", "2".to_string())])
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(location(&resp), "/cart");

    let resp = client
        .get(format!("{base_url}/cart/count"))
        .send()
        .await
        .expect("Failed to get cart count");
    assert!(resp.text().await.expect("Failed to read count").contains('2'));

    let resp = client
        .post(format!("{base_url}/checkout"))
        .form(&[
            ("full_name", "Guest Buyer"),
            ("email", email.as_str()),
            ("phone", ""),
            ("address_line1", "1 Test Street"),
            ("address_line2", ""),
            ("city", "Testville"),
            ("postal_code", "12345"),
            ("country", "US"),
            ("payment_method", "cash_on_delivery"),
            ("notes", "Integration test"),
        ])
        .send()
        .await
        .expect("Failed to place order");
    let complete = location(&resp);
    assert!(complete.starts_with("/checkout/complete/"), "{complete}");
    let number = order_number(&complete);

    let resp = client
        .get(format!("{base_url}{complete}"))
        .send()
        .await
        .expect("Failed to get confirmation");
    assert_eq!(resp.status(), StatusCode::OK);

    // The cart is emptied by the order
    let resp = client
        .get(format!("{base_url}/checkout"))
        .send()
        .await
        .expect("Failed to get checkout");
    assert_eq!(location(&resp), "/cart?error=empty");

    let resp = client
        .post(format!("{base_url}/track"))
        .form(&[("order_number", number.as_str()), ("email", email.as_str())])
        .send()
        .await
        .expect("Failed to track order");
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains(&number));
    assert!(!body.contains("couldn&#x27;t find"));

    let resp = client
        .post(format!("{base_url}/track"))
        .form(&[("order_number", number.as_str()), ("email", "someone-else@example.com")])
        .send()
        .await
        .expect("Failed to track order");
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("find an order"));

    sqlx::query("DELETE FROM orders WHERE order_number = $1")
        .bind(&number)
        .execute(&pool)
        .await
        .expect("Failed to clean up order");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_order_history_requires_login() {
    let resp = client()
        .get(format!("{}/orders", storefront_url()))
        .send()
        .await
        .expect("Failed to get orders");

    assert!(resp.status().is_redirection());
    assert!(location(&resp).starts_with("/auth/login"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_register_sign_in_and_account() {
    let client = client();
    let base_url = storefront_url();
    let email = shopfront_integration_tests::unique_email("customer");

    let resp = client
        .post(format!("{base_url}/auth/register"))
        .form(&[
            ("email", email.as_str()),
            ("full_name", "Test Customer"),
            ("password", "correct horse battery"),
            ("password_confirm", "correct horse battery"),
        ])
        .send()
        .await
        .expect("Failed to register");
    assert!(resp.status().is_redirection());

    let resp = client
        .get(format!("{base_url}/account"))
        .send()
        .await
        .expect("Failed to get account");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("Test Customer"));

    let pool = pool().await;
    sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(&email)
        .execute(&pool)
        .await
        .expect("Failed to clean up user");
}
