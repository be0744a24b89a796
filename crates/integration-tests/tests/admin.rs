//! Integration tests for the admin panel.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database with an admin account
//!   (`ADMIN_TEST_EMAIL`, `ADMIN_TEST_PASSWORD`)
//! - The admin server running (cargo run -p shopfront-admin)
//!
//! Run with: cargo test -p shopfront-integration-tests -- --ignored

use reqwest::StatusCode;
use shopfront_integration_tests::{admin_login, admin_url, client, location, pool};

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_admin_requires_login() {
    let client = client();
    let base_url = admin_url();

    for path in ["/", "/products", "/orders", "/users"] {
        let resp = client
            .get(format!("{base_url}{path}"))
            .send()
            .await
            .expect("Failed to send request");
        assert!(resp.status().is_redirection(), "{path}");
        assert_eq!(location(&resp), "/auth/login", "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_login_rejects_bad_password() {
    let email = std::env::var("ADMIN_TEST_EMAIL").expect("ADMIN_TEST_EMAIL must be set");
    let resp = client()
        .post(format!("{}/auth/login", admin_url()))
        .form(&[("email", email.as_str()), ("password", "definitely-wrong")])
        .send()
        .await
        .expect("Failed to send request");

    assert_ne!(location(&resp), "/");
}

#[tokio::test]
#[ignore = "Requires running admin server and admin account"]
async fn test_dashboard_after_login() {
    let client = client();
    admin_login(&client).await;

    let resp = client
        .get(format!("{}/", admin_url()))
        .send()
        .await
        .expect("Failed to get dashboard");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("Dashboard"));
}

#[tokio::test]
#[ignore = "Requires running admin server and admin account"]
async fn test_category_lifecycle() {
    let client = client();
    let base_url = admin_url();
    let pool = pool().await;
    admin_login(&client).await;

    let slug = format!("it-{}", uuid::Uuid::new_v4().simple());
    let resp = client
        .post(format!("{base_url}/categories"))
        .form(&[
            ("name", "Integration Category"),
            ("slug", slug.as_str()),
            ("description", ""),
        ])
        .send()
        .await
        .expect("Failed to create category");
    assert_eq!(location(&resp), "/categories?success=created");

    // Same slug again is a form error, not a server error
    let resp = client
        .post(format!("{base_url}/categories"))
        .form(&[
            ("name", "Duplicate"),
            ("slug", slug.as_str()),
            ("description", ""),
        ])
        .send()
        .await
        .expect("Failed to create category");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (id,): (i32,) = sqlx::query_as("SELECT id FROM categories WHERE slug = $1")
        .bind(&slug)
        .fetch_one(&pool)
        .await
        .expect("Category was not stored");

    let resp = client
        .post(format!("{base_url}/categories/{id}/delete"))
        .send()
        .await
        .expect("Failed to delete category");
    assert!(resp.status().is_redirection());

    let remaining: Option<(i32,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
        .expect("Failed to query categories");
    assert!(remaining.is_none());
}

#[tokio::test]
#[ignore = "Requires running admin server and admin account"]
async fn test_product_form_validation() {
    let client = client();
    admin_login(&client).await;

    let resp = client
        .post(format!("{}/products", admin_url()))
        .form(&[
            ("name", "   "),
            ("slug", ""),
            ("category_id", ""),
            ("description", ""),
            ("price", "-3"),
            ("stock", "many"),
        ])
        .send()
        .await
        .expect("Failed to submit product");

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("field-error"));
}

#[tokio::test]
#[ignore = "Requires running admin server, admin account and database"]
async fn test_order_status_transitions() {
    let client = client();
    let base_url = admin_url();
    let pool = pool().await;
    admin_login(&client).await;

    let number = format!("IT-{}", &uuid::Uuid::new_v4().simple().to_string()[..10]);
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO orders (order_number, email, status, payment_method, full_name,
             address_line1, city, postal_code, country, subtotal, shipping, tax, total)
         VALUES ($1, 'it@example.com', 'delivered', 'cash_on_delivery', 'IT Buyer',
             '1 Test Street', 'Testville', '12345', 'US', 10, 0, 0, 10)
         RETURNING id",
    )
    .bind(&number)
    .fetch_one(&pool)
    .await
    .expect("Failed to insert order");

    let resp = client
        .get(format!("{base_url}/orders/{id}"))
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::OK);

    // Delivered is terminal
    let resp = client
        .post(format!("{base_url}/orders/{id}/status"))
        .form(&[("status", "pending")])
        .send()
        .await
        .expect("Failed to update status");
    assert_eq!(location(&resp), format!("/orders/{id}?error=invalid_status"));

    let resp = client
        .post(format!("{base_url}/orders/{id}/status"))
        .form(&[("status", "teleported")])
        .send()
        .await
        .expect("Failed to update status");
    assert_eq!(location(&resp), format!("/orders/{id}?error=invalid_status"));

    let resp = client
        .get(format!("{base_url}/orders/999999999"))
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .expect("Failed to clean up order");
}

#[tokio::test]
#[ignore = "Requires running admin server and admin account"]
async fn test_admin_cannot_change_own_role() {
    let client = client();
    let pool = pool().await;
    admin_login(&client).await;

    let email = std::env::var("ADMIN_TEST_EMAIL").expect("ADMIN_TEST_EMAIL must be set");
    let (id,): (i32,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.to_lowercase())
        .fetch_one(&pool)
        .await
        .expect("Admin account not found");

    let resp = client
        .post(format!("{}/users/{id}/role", admin_url()))
        .form(&[("role", "customer")])
        .send()
        .await
        .expect("Failed to update role");
    assert_eq!(location(&resp), format!("/users/{id}?error=own_role"));
}
