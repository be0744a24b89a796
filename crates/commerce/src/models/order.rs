//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{
    Email, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId,
};

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 code.
    pub country: String,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Customer-facing identifier (e.g. `SF-7KQ2M9XD3A`).
    pub order_number: String,
    /// Owner, or `None` for guest checkouts.
    pub user_id: Option<UserId>,
    pub email: Email,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub address: ShippingAddress,
    pub notes: Option<String>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of a placed order with its price snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order with its items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A requested line for a new order. Prices are read from the catalog
/// inside the placing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Everything needed to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub email: Email,
    pub payment_method: PaymentMethod,
    pub address: ShippingAddress,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// Number of orders in a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Aggregates for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Order counts for every status, in lifecycle order.
    pub status_counts: Vec<StatusCount>,
    /// Sum of totals for orders that were not cancelled.
    pub revenue: Decimal,
    pub product_count: i64,
    pub user_count: i64,
    pub recent_orders: Vec<Order>,
}

impl DashboardStats {
    /// Orders across all statuses.
    #[must_use]
    pub fn total_orders(&self) -> i64 {
        self.status_counts.iter().map(|c| c.count).sum()
    }

    /// Orders still in flight.
    #[must_use]
    pub fn open_orders(&self) -> i64 {
        self.status_counts
            .iter()
            .filter(|c| c.status.is_open())
            .map(|c| c.count)
            .sum()
    }
}
