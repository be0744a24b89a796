//! Dashboard route handler.
//!
//! Statistics are cached in the shared key/value cache; writes elsewhere in
//! the admin panel drop every key under [`DASHBOARD_CACHE_PREFIX`].

use askama::Template;
use axum::{extract::State, response::Html};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use shopfront_commerce::db::{KvCache, OrderRepository, ProductRepository, RepositoryError};
use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::{DashboardStats, Order, Product};

use crate::{
    error::Result, filters, middleware::RequireAdmin, models::CurrentAdmin, state::AppState,
};

use super::render;

/// Prefix of every dashboard cache key.
pub const DASHBOARD_CACHE_PREFIX: &str = "dashboard:";

/// Cache key for the dashboard snapshot.
const DASHBOARD_STATS_KEY: &str = "dashboard:stats";

/// Orders listed under "Recent orders".
const RECENT_ORDERS: i64 = 10;

/// Products listed under "Low stock".
const LOW_STOCK_LIMIT: i64 = 10;

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.name.clone(),
            email: admin.email.to_string(),
        }
    }
}

/// Everything the dashboard shows, cached as one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub stats: DashboardStats,
    pub low_stock: Vec<Product>,
}

/// Dashboard metrics.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub orders: i64,
    pub open_orders: i64,
    pub revenue: String,
    pub customers: i64,
    pub products: i64,
}

/// Order count for one status, linking to the filtered listing.
#[derive(Debug, Clone)]
pub struct StatusCountView {
    pub status: &'static str,
    pub label: &'static str,
    pub count: i64,
}

/// Recent order view for dashboard.
#[derive(Debug, Clone)]
pub struct RecentOrderView {
    pub id: i32,
    pub number: String,
    pub email: String,
    pub total: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub placed_at: String,
}

impl RecentOrderView {
    #[must_use]
    pub fn new(order: &Order, shop: &ShopConfig) -> Self {
        Self {
            id: order.id.as_i32(),
            number: order.order_number.clone(),
            email: order.email.to_string(),
            total: shop.format(order.total),
            status: order.status.as_str(),
            status_label: order.status.label(),
            placed_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Low-stock product row.
#[derive(Debug, Clone)]
pub struct LowStockView {
    pub id: i32,
    pub name: String,
    pub stock: i32,
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub metrics: DashboardMetrics,
    pub status_counts: Vec<StatusCountView>,
    pub recent_orders: Vec<RecentOrderView>,
    pub low_stock: Vec<LowStockView>,
    pub low_stock_threshold: i32,
}

impl DashboardTemplate {
    fn new(admin: &CurrentAdmin, snapshot: &DashboardSnapshot, state: &AppState) -> Self {
        let stats = &snapshot.stats;
        Self {
            admin_user: AdminUserView::from(admin),
            current_path: "/".to_string(),
            metrics: DashboardMetrics {
                orders: stats.total_orders(),
                open_orders: stats.open_orders(),
                revenue: state.shop().format(stats.revenue),
                customers: stats.user_count,
                products: stats.product_count,
            },
            status_counts: stats
                .status_counts
                .iter()
                .map(|c| StatusCountView {
                    status: c.status.as_str(),
                    label: c.status.label(),
                    count: c.count,
                })
                .collect(),
            recent_orders: stats
                .recent_orders
                .iter()
                .map(|o| RecentOrderView::new(o, state.shop()))
                .collect(),
            low_stock: snapshot
                .low_stock
                .iter()
                .map(|p| LowStockView {
                    id: p.id.as_i32(),
                    name: p.name.clone(),
                    stock: p.stock,
                })
                .collect(),
            low_stock_threshold: state.config().low_stock_threshold,
        }
    }
}

async fn load_snapshot(
    pool: &PgPool,
    low_stock_threshold: i32,
) -> std::result::Result<DashboardSnapshot, RepositoryError> {
    let stats = OrderRepository::new(pool)
        .dashboard_stats(RECENT_ORDERS)
        .await?;
    let low_stock = ProductRepository::new(pool)
        .low_stock(low_stock_threshold, LOW_STOCK_LIMIT)
        .await?;
    Ok(DashboardSnapshot { stats, low_stock })
}

/// Drop cached dashboard data after a write.
///
/// Failures are logged; the entry then expires on its own.
pub async fn invalidate_cache(pool: &PgPool) {
    match KvCache::new(pool)
        .delete_prefix(DASHBOARD_CACHE_PREFIX)
        .await
    {
        Ok(removed) => tracing::debug!(removed, "Dashboard cache invalidated"),
        Err(e) => tracing::warn!(error = %e, "Failed to invalidate dashboard cache"),
    }
}

/// Dashboard page handler.
#[instrument(skip(admin, state))]
pub async fn dashboard(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Html<String>> {
    let threshold = state.config().low_stock_threshold;
    let snapshot = KvCache::new(state.pool())
        .get_or_set_with(DASHBOARD_STATS_KEY, state.config().dashboard_ttl, || {
            load_snapshot(state.pool(), threshold)
        })
        .await?;

    Ok(render(&DashboardTemplate::new(&admin, &snapshot, &state)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shopfront_commerce::models::ShippingAddress;
    use shopfront_core::{Email, OrderId, OrderStatus, PaymentMethod};

    use super::*;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(3),
            order_number: "SF-20260101-ABCD".to_string(),
            user_id: None,
            email: Email::parse("buyer@example.com").unwrap(),
            status,
            payment_method: PaymentMethod::CashOnDelivery,
            address: ShippingAddress {
                full_name: "Buyer".to_string(),
                phone: None,
                line1: "1 Main St".to_string(),
                line2: None,
                city: "Springfield".to_string(),
                postal_code: "12345".to_string(),
                country: "US".to_string(),
            },
            notes: None,
            subtotal: Decimal::new(2000, 2),
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::new(2000, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_recent_order_view_formats_total_and_status() {
        let view = RecentOrderView::new(&order(OrderStatus::Shipped), &ShopConfig::default());
        assert_eq!(view.total, "$20.00");
        assert_eq!(view.status, "shipped");
        assert_eq!(view.status_label, OrderStatus::Shipped.label());
        assert_eq!(view.id, 3);
    }

    #[test]
    fn test_snapshot_survives_cache_serialization() {
        let snapshot = DashboardSnapshot {
            stats: DashboardStats {
                status_counts: vec![],
                revenue: Decimal::new(12_345, 2),
                product_count: 4,
                user_count: 2,
                recent_orders: vec![order(OrderStatus::Pending)],
            },
            low_stock: vec![],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        let back: DashboardSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back.stats.revenue, Decimal::new(12_345, 2));
        assert_eq!(back.stats.recent_orders.len(), 1);
    }
}
