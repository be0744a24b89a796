//! Order management routes.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_commerce::db::{OrderError, OrderRepository};
use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::{OrderDetail, OrderItem};
use shopfront_core::{OrderId, OrderStatus};

use crate::{
    components::data_table::{DataTableConfig, orders_table_config},
    error::{AppError, Result},
    filters,
    middleware::RequireAdmin,
    state::AppState,
};

use super::dashboard::{AdminUserView, RecentOrderView, invalidate_cache};
use super::{Flash, ListQuery, MessageQuery, PaginationView, render};

/// Orders list page template.
#[derive(Template)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub table: DataTableConfig,
    pub orders: Vec<RecentOrderView>,
    pub pagination: PaginationView,
    pub flash: Option<Flash>,
}

/// Line item on the order page.
#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub product_id: Option<i32>,
    pub name: String,
    pub unit_price: String,
    pub quantity: i32,
    pub line_total: String,
}

impl OrderItemView {
    fn new(item: &OrderItem, shop: &ShopConfig) -> Self {
        Self {
            product_id: item.product_id.map(|id| id.as_i32()),
            name: item.product_name.clone(),
            unit_price: shop.format(item.unit_price),
            quantity: item.quantity,
            line_total: shop.format(item.line_total),
        }
    }
}

/// Status the order may move to.
#[derive(Debug, Clone)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Full order for the detail page.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub id: i32,
    pub number: String,
    pub email: String,
    pub user_id: Option<i32>,
    pub status: &'static str,
    pub status_label: &'static str,
    pub payment_method: &'static str,
    pub full_name: String,
    pub phone: String,
    pub address_lines: Vec<String>,
    pub notes: String,
    pub items: Vec<OrderItemView>,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub placed_at: String,
    pub updated_at: String,
    pub next_statuses: Vec<StatusOption>,
}

impl OrderDetailView {
    fn new(detail: &OrderDetail, shop: &ShopConfig) -> Self {
        let order = &detail.order;
        let address = &order.address;

        let mut address_lines = vec![address.line1.clone()];
        address_lines.extend(address.line2.clone().filter(|l| !l.is_empty()));
        address_lines.push(format!("{} {}", address.postal_code, address.city));
        address_lines.push(address.country.clone());

        Self {
            id: order.id.as_i32(),
            number: order.order_number.clone(),
            email: order.email.to_string(),
            user_id: order.user_id.map(|id| id.as_i32()),
            status: order.status.as_str(),
            status_label: order.status.label(),
            payment_method: order.payment_method.label(),
            full_name: address.full_name.clone(),
            phone: address.phone.clone().unwrap_or_default(),
            address_lines,
            notes: order.notes.clone().unwrap_or_default(),
            items: detail
                .items
                .iter()
                .map(|item| OrderItemView::new(item, shop))
                .collect(),
            subtotal: shop.format(order.subtotal),
            shipping: shop.format(order.shipping),
            tax: shop.format(order.tax),
            total: shop.format(order.total),
            placed_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            updated_at: order.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            next_statuses: order
                .status
                .next_statuses()
                .into_iter()
                .map(|s| StatusOption {
                    value: s.as_str(),
                    label: s.label(),
                })
                .collect(),
        }
    }
}

/// Order detail page template.
#[derive(Template)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub order: OrderDetailView,
    pub flash: Option<Flash>,
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Status filter from the query string; unknown values show every order.
fn status_filter(value: &str) -> Option<OrderStatus> {
    value.trim().parse().ok()
}

/// Orders list page handler.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>> {
    let status = status_filter(&query.status);
    let status_value = status.map(OrderStatus::as_str).unwrap_or_default();

    let page = OrderRepository::new(state.pool())
        .list_admin(status, query.search(), query.page_request())
        .await?;

    let template = OrdersIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/orders".to_string(),
        table: orders_table_config(&query.q, status_value),
        pagination: PaginationView::new(
            &page,
            "/orders",
            &[("q", query.q.trim()), ("status", status_value)],
        ),
        orders: page
            .items
            .iter()
            .map(|o| RecentOrderView::new(o, state.shop()))
            .collect(),
        flash: query.flash(),
    };
    Ok(render(&template))
}

/// Order detail page handler.
#[instrument(skip(admin, state, query))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>> {
    let detail = OrderRepository::new(state.pool())
        .get_by_id(OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    let template = OrderShowTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/orders".to_string(),
        order: OrderDetailView::new(&detail, state.shop()),
        flash: query.flash(),
    };
    Ok(render(&template))
}

/// Move an order to a new status and email the customer.
#[instrument(skip(admin, state, form), fields(status = %form.status))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let id = OrderId::new(id);
    let invalid = || Redirect::to(&format!("/orders/{id}?error=invalid_status")).into_response();

    let Ok(next) = form.status.parse::<OrderStatus>() else {
        return Ok(invalid());
    };

    let orders = OrderRepository::new(state.pool());
    match orders.update_status(id, next).await {
        Ok(_) => {}
        Err(OrderError::InvalidTransition { from, to }) => {
            tracing::info!(order_id = %id, %from, %to, "Status change rejected");
            return Ok(invalid());
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(order_id = %id, status = %next, admin_id = %admin.id, "Order status updated");
    invalidate_cache(state.pool()).await;

    if let Some(detail) = orders.get_by_id(id).await? {
        let email = state.email().clone();
        tokio::spawn(async move {
            if let Err(e) = email.send_order_status_update(&detail).await {
                tracing::error!(
                    order = %detail.order.order_number,
                    error = %e,
                    "Failed to send status update email"
                );
            }
        });
    }

    Ok(Redirect::to(&format!("/orders/{id}?success=status")).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shopfront_commerce::models::{Order, ShippingAddress};
    use shopfront_core::{Email, OrderItemId, PaymentMethod, ProductId};

    use super::*;

    fn detail(status: OrderStatus) -> OrderDetail {
        OrderDetail {
            order: Order {
                id: OrderId::new(9),
                order_number: "SF-20260101-WXYZ".to_string(),
                user_id: None,
                email: Email::parse("buyer@example.com").unwrap(),
                status,
                payment_method: PaymentMethod::BankTransfer,
                address: ShippingAddress {
                    full_name: "Buyer".to_string(),
                    phone: None,
                    line1: "1 Main St".to_string(),
                    line2: Some(String::new()),
                    city: "Springfield".to_string(),
                    postal_code: "12345".to_string(),
                    country: "US".to_string(),
                },
                notes: None,
                subtotal: Decimal::new(1500, 2),
                shipping: Decimal::new(500, 2),
                tax: Decimal::ZERO,
                total: Decimal::new(2000, 2),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(9),
                product_id: Some(ProductId::new(4)),
                product_name: "Blue Mug".to_string(),
                unit_price: Decimal::new(750, 2),
                quantity: 2,
                line_total: Decimal::new(1500, 2),
            }],
        }
    }

    #[test]
    fn test_detail_view_offers_allowed_statuses() {
        let view = OrderDetailView::new(&detail(OrderStatus::Pending), &ShopConfig::default());
        let next: Vec<_> = view.next_statuses.iter().map(|s| s.value).collect();
        assert_eq!(next, vec!["processing", "cancelled"]);

        let view = OrderDetailView::new(&detail(OrderStatus::Delivered), &ShopConfig::default());
        assert!(view.next_statuses.is_empty());
    }

    #[test]
    fn test_detail_view_formats_address_and_items() {
        let view = OrderDetailView::new(&detail(OrderStatus::Shipped), &ShopConfig::default());
        assert_eq!(
            view.address_lines,
            vec!["1 Main St", "12345 Springfield", "US"]
        );
        assert_eq!(view.items[0].line_total, "$15.00");
        assert_eq!(view.total, "$20.00");
        assert_eq!(view.payment_method, "Bank transfer");
    }

    #[test]
    fn test_unknown_status_filter_is_ignored() {
        assert_eq!(status_filter("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(status_filter("lost"), None);
        assert_eq!(status_filter(""), None);
    }
}
