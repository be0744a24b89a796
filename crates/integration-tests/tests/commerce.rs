//! Database tests for the key/value cache and order placement.
//!
//! These tests require a migrated `PostgreSQL` database (`DATABASE_URL`).
//! No server needs to be running.
//!
//! Run with: cargo test -p shopfront-integration-tests --test commerce -- --ignored

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::PgPool;

use shopfront_commerce::db::{KvCache, OrderError, OrderRepository};
use shopfront_commerce::models::{NewOrder, NewOrderLine, ShippingAddress};
use shopfront_core::{Email, OrderStatus, PaymentMethod, ProductId, ShippingPolicy, TaxRate};
use shopfront_integration_tests::{
    delete_product, insert_test_product, pool, product_stock, unique_email,
};

fn test_key(name: &str) -> String {
    format!("it:{name}:{}", uuid::Uuid::new_v4().simple())
}

async fn row_exists(pool: &PgPool, key: &str) -> bool {
    let row: Option<(String,)> = sqlx::query_as("SELECT key FROM cache_entry WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .expect("Failed to query cache_entry");
    row.is_some()
}

/// Insert a row stored `age_secs` ago with the given TTL and raw JSON value.
async fn insert_raw_entry(pool: &PgPool, key: &str, json: &str, age_secs: i64, ttl_secs: i64) {
    sqlx::query(
        "INSERT INTO cache_entry (key, value, stored_at, ttl_seconds)
         VALUES ($1, $2::jsonb, now() - $3 * INTERVAL '1 second', $4)",
    )
    .bind(key)
    .bind(json)
    .bind(age_secs)
    .bind(ttl_secs)
    .execute(pool)
    .await
    .expect("Failed to insert cache row");
}

fn new_order(email: &str, product_id: i32, quantity: u32) -> NewOrder {
    NewOrder {
        user_id: None,
        email: Email::parse(email).expect("valid email"),
        payment_method: PaymentMethod::CashOnDelivery,
        address: ShippingAddress {
            full_name: "Integration Buyer".to_string(),
            phone: None,
            line1: "1 Test Street".to_string(),
            line2: None,
            city: "Testville".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        },
        notes: None,
        lines: vec![NewOrderLine {
            product_id: ProductId::new(product_id),
            quantity,
        }],
    }
}

fn pricing() -> (ShippingPolicy, TaxRate) {
    (
        ShippingPolicy::new(Decimal::new(500, 2), None).expect("valid shipping"),
        TaxRate::from_percent(Decimal::ZERO).expect("valid tax rate"),
    )
}

async fn orders_for_email(pool: &PgPool, email: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .expect("Failed to count orders");
    count
}

async fn delete_orders(pool: &PgPool, email: &str) {
    sqlx::query("DELETE FROM orders WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await
        .expect("Failed to clean up orders");
}

// =============================================================================
// Key/value cache
// =============================================================================

#[tokio::test]
#[ignore = "Requires database"]
async fn test_kv_cache_set_get_delete() {
    let pool = pool().await;
    let cache = KvCache::new(&pool);
    let key = test_key("roundtrip");

    cache
        .set(&key, &[1_u32, 2, 3], Duration::from_secs(60))
        .await
        .expect("set");
    let value: Option<Vec<u32>> = cache.get(&key).await.expect("get");
    assert_eq!(value, Some(vec![1, 2, 3]));

    assert!(cache.delete(&key).await.expect("delete"));
    assert!(!cache.delete(&key).await.expect("delete"));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_kv_cache_expired_entry_is_deleted_on_get() {
    let pool = pool().await;
    let cache = KvCache::new(&pool);
    let key = test_key("expired");

    insert_raw_entry(&pool, &key, "1", 120, 60).await;

    let value: Option<u32> = cache.get(&key).await.expect("get");
    assert_eq!(value, None);
    assert!(!row_exists(&pool, &key).await);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_kv_cache_entry_at_exact_ttl_is_expired() {
    let pool = pool().await;
    let cache = KvCache::new(&pool);
    let key = test_key("boundary");

    insert_raw_entry(&pool, &key, "1", 60, 60).await;

    let value: Option<u32> = cache.get(&key).await.expect("get");
    assert_eq!(value, None);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_kv_cache_undecodable_entry_is_deleted() {
    let pool = pool().await;
    let cache = KvCache::new(&pool);
    let key = test_key("undecodable");

    cache
        .set(&key, "not a number", Duration::from_secs(60))
        .await
        .expect("set");

    let value: Option<u32> = cache.get(&key).await.expect("get");
    assert_eq!(value, None);
    assert!(!row_exists(&pool, &key).await);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_kv_cache_purge_expired_counts_removed_rows() {
    let pool = pool().await;
    let cache = KvCache::new(&pool);
    let stale_a = test_key("purge-stale");
    let stale_b = test_key("purge-stale");
    let fresh = test_key("purge-fresh");
    let long_lived = test_key("purge-long");

    insert_raw_entry(&pool, &stale_a, "1", 120, 60).await;
    insert_raw_entry(&pool, &stale_b, "2", 10, 0).await;
    cache
        .set(&fresh, &3_u32, Duration::from_secs(300))
        .await
        .expect("set");
    // Oversized TTLs are capped on write and must not break the purge
    cache
        .set(&long_lived, &4_u32, Duration::from_secs(u64::MAX))
        .await
        .expect("set");

    let removed = cache.purge_expired().await.expect("purge");

    // Other expired rows in the database may be purged too
    assert!(removed >= 2, "removed {removed}");
    assert!(!row_exists(&pool, &stale_a).await);
    assert!(!row_exists(&pool, &stale_b).await);
    assert!(row_exists(&pool, &fresh).await);
    assert!(row_exists(&pool, &long_lived).await);

    cache.delete(&fresh).await.expect("delete");
    cache.delete(&long_lived).await.expect("delete");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_kv_cache_get_or_set_with_runs_loader_once() {
    let pool = pool().await;
    let cache = KvCache::new(&pool);
    let key = test_key("memo");
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    for _ in 0..3 {
        let value: Result<u32, String> = cache
            .get_or_set_with(&key, Duration::from_secs(60), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;
        assert_eq!(value, Ok(42));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.delete(&key).await.expect("delete");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_kv_cache_loader_errors_are_not_cached() {
    let pool = pool().await;
    let cache = KvCache::new(&pool);
    let key = test_key("memo-error");
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    let failed: Result<u32, String> = cache
        .get_or_set_with(&key, Duration::from_secs(60), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("upstream down".to_string())
        })
        .await;
    assert_eq!(failed, Err("upstream down".to_string()));
    assert!(!row_exists(&pool, &key).await);

    let loaded: Result<u32, String> = cache
        .get_or_set_with(&key, Duration::from_secs(60), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;
    assert_eq!(loaded, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    cache.delete(&key).await.expect("delete");
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
#[ignore = "Requires database"]
async fn test_place_order_decrements_stock() {
    let pool = pool().await;
    let product_id = insert_test_product(&pool, 5).await;
    let email = unique_email("place");
    let (shipping, tax) = pricing();

    let detail = OrderRepository::new(&pool)
        .place(&new_order(&email, product_id, 2), &shipping, tax)
        .await
        .expect("order placed");

    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 2);
    assert_eq!(detail.items[0].unit_price, Decimal::new(1000, 2));
    assert_eq!(detail.order.subtotal, Decimal::new(2000, 2));
    assert_eq!(product_stock(&pool, product_id).await, 3);

    delete_orders(&pool, &email).await;
    delete_product(&pool, product_id).await;
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_place_order_rejects_quantity_above_stock() {
    let pool = pool().await;
    let product_id = insert_test_product(&pool, 5).await;
    let email = unique_email("oversell");
    let (shipping, tax) = pricing();

    let result = OrderRepository::new(&pool)
        .place(&new_order(&email, product_id, 6), &shipping, tax)
        .await;

    assert!(matches!(
        result,
        Err(OrderError::InsufficientStock { available: 5, .. })
    ));
    assert_eq!(product_stock(&pool, product_id).await, 5);
    assert_eq!(orders_for_email(&pool, &email).await, 0);

    delete_product(&pool, product_id).await;
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_cancelling_order_restocks_items() {
    let pool = pool().await;
    let product_id = insert_test_product(&pool, 5).await;
    let email = unique_email("cancel");
    let (shipping, tax) = pricing();
    let orders = OrderRepository::new(&pool);

    let detail = orders
        .place(&new_order(&email, product_id, 2), &shipping, tax)
        .await
        .expect("order placed");
    assert_eq!(product_stock(&pool, product_id).await, 3);

    let order = orders
        .update_status(detail.order.id, OrderStatus::Cancelled)
        .await
        .expect("cancelled");
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(product_stock(&pool, product_id).await, 5);

    // Cancelled is terminal; stock is not returned twice
    let again = orders
        .update_status(detail.order.id, OrderStatus::Cancelled)
        .await;
    assert!(matches!(again, Err(OrderError::InvalidTransition { .. })));
    assert_eq!(product_stock(&pool, product_id).await, 5);

    delete_orders(&pool, &email).await;
    delete_product(&pool, product_id).await;
}
