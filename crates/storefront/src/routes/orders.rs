//! Order history, order pages and guest order tracking.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_commerce::db::OrderRepository;
use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::{Order, OrderDetail};
use shopfront_core::Email;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::routes::PageContext;
use crate::services::checkout::placed_in_session;
use crate::state::AppState;

/// Order row for lists.
#[derive(Clone)]
pub struct OrderSummaryView {
    pub number: String,
    pub status: String,
    pub status_label: String,
    pub placed_on: String,
    pub total: String,
}

impl OrderSummaryView {
    #[must_use]
    pub fn new(order: &Order, shop: &ShopConfig) -> Self {
        Self {
            number: order.order_number.clone(),
            status: order.status.as_str().to_string(),
            status_label: order.status.label().to_string(),
            placed_on: order.created_at.format("%B %-d, %Y").to_string(),
            total: shop.format(order.total),
        }
    }
}

/// Order line for the detail page.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

/// Order detail display data for templates.
#[derive(Clone)]
pub struct OrderDetailView {
    pub summary: OrderSummaryView,
    pub email: String,
    pub payment_method: String,
    pub address_lines: Vec<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItemView>,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
}

impl OrderDetailView {
    #[must_use]
    pub fn new(detail: &OrderDetail, shop: &ShopConfig) -> Self {
        let order = &detail.order;
        let address = &order.address;
        let mut address_lines = vec![address.full_name.clone(), address.line1.clone()];
        address_lines.extend(address.line2.clone());
        address_lines.push(format!("{} {}", address.postal_code, address.city));
        address_lines.push(address.country.clone());

        Self {
            summary: OrderSummaryView::new(order, shop),
            email: order.email.to_string(),
            payment_method: order.payment_method.label().to_string(),
            address_lines,
            phone: address.phone.clone(),
            notes: order.notes.clone(),
            items: detail
                .items
                .iter()
                .map(|item| OrderItemView {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: shop.format(item.unit_price),
                    line_total: shop.format(item.line_total),
                })
                .collect(),
            subtotal: shop.format(order.subtotal),
            shipping: shop.format(order.shipping),
            tax: shop.format(order.tax),
        }
    }
}

/// Whether a visitor may see an order: its owner, an admin, or the session
/// that placed it.
#[must_use]
pub fn can_view(order: &Order, user: Option<&CurrentUser>, placed_here: bool) -> bool {
    placed_here
        || user.is_some_and(|u| u.is_admin || order.user_id == Some(u.id))
}

/// Load an order the visitor may see, or `NotFound`.
///
/// Orders belonging to someone else are reported as missing.
///
/// # Errors
///
/// Returns `AppError::NotFound` when the order does not exist or is not the
/// visitor's, or a database/session error.
pub async fn visible_order(
    state: &AppState,
    session: &Session,
    user: Option<&CurrentUser>,
    number: &str,
) -> Result<OrderDetail> {
    let not_found = || AppError::NotFound(format!("order {number}"));
    let detail = OrderRepository::new(state.pool())
        .get_by_number(number)
        .await?
        .ok_or_else(not_found)?;

    let placed_here = placed_in_session(session, &detail.order.order_number).await?;
    if can_view(&detail.order, user, placed_here) {
        Ok(detail)
    } else {
        tracing::warn!(order_number = %number, "Order page denied");
        Err(not_found())
    }
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: PageContext,
    pub orders: Vec<OrderSummaryView>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: PageContext,
    pub order: OrderDetailView,
}

/// Order tracking template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/track.html")]
pub struct TrackTemplate {
    pub page: PageContext,
    pub order_number: String,
    pub email: String,
    pub error: Option<String>,
    pub order: Option<OrderDetailView>,
}

/// Order tracking form data.
#[derive(Debug, Deserialize)]
pub struct TrackForm {
    pub order_number: String,
    pub email: String,
}

/// The signed-in user's orders.
#[instrument(skip(state, page, user))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(OrdersIndexTemplate {
        page,
        orders: orders
            .iter()
            .map(|o| OrderSummaryView::new(o, state.shop()))
            .collect(),
    })
}

/// A single order.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Path(number): Path<String>,
) -> Result<impl IntoResponse> {
    let detail = visible_order(&state, &session, page.user.as_ref(), &number).await?;

    Ok(OrderShowTemplate {
        order: OrderDetailView::new(&detail, state.shop()),
        page,
    })
}

/// Guest order lookup form.
pub async fn track_page(page: PageContext) -> impl IntoResponse {
    TrackTemplate {
        email: page
            .user
            .as_ref()
            .map(|u| u.email.to_string())
            .unwrap_or_default(),
        page,
        order_number: String::new(),
        error: None,
        order: None,
    }
}

/// Look up an order by number and email.
#[instrument(skip(state, page, form))]
pub async fn track(
    State(state): State<AppState>,
    page: PageContext,
    Form(form): Form<TrackForm>,
) -> Result<impl IntoResponse> {
    let not_found = "We couldn't find an order with that number and email.";
    let number = form.order_number.trim().to_uppercase();

    let order = match Email::parse(form.email.trim()) {
        Ok(email) if !number.is_empty() => OrderRepository::new(state.pool())
            .find_for_tracking(&number, &email)
            .await?
            .map(|detail| OrderDetailView::new(&detail, state.shop())),
        _ => None,
    };

    Ok(TrackTemplate {
        page,
        error: order.is_none().then(|| not_found.to_string()),
        order_number: number,
        email: form.email,
        order,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shopfront_commerce::models::ShippingAddress;
    use shopfront_core::{OrderId, OrderStatus, PaymentMethod, UserId};

    use super::*;

    fn order(owner: Option<i32>) -> Order {
        Order {
            id: OrderId::new(1),
            order_number: "SF-ABCDEF1234".to_string(),
            user_id: owner.map(UserId::new),
            email: Email::parse("ada@example.com").unwrap(),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::BankTransfer,
            address: ShippingAddress {
                full_name: "Ada Lovelace".to_string(),
                phone: None,
                line1: "12 Analytical Row".to_string(),
                line2: Some("Flat 2".to_string()),
                city: "London".to_string(),
                postal_code: "SW1A 1AA".to_string(),
                country: "GB".to_string(),
            },
            notes: None,
            subtotal: Decimal::new(2000, 2),
            shipping: Decimal::new(500, 2),
            tax: Decimal::ZERO,
            total: Decimal::new(2500, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(id: i32, is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("someone@example.com").unwrap(),
            full_name: "Someone".to_string(),
            is_admin,
        }
    }

    #[test]
    fn test_owner_admin_and_placing_session_can_view() {
        let order = order(Some(7));
        assert!(can_view(&order, Some(&user(7, false)), false));
        assert!(can_view(&order, Some(&user(9, true)), false));
        assert!(can_view(&order, None, true));
    }

    #[test]
    fn test_others_cannot_view() {
        assert!(!can_view(&order(Some(7)), Some(&user(8, false)), false));
        assert!(!can_view(&order(Some(7)), None, false));
        // Guest orders are never matched to a signed-in user by id.
        assert!(!can_view(&order(None), Some(&user(8, false)), false));
    }

    #[test]
    fn test_detail_view_address_lines() {
        let detail = OrderDetail {
            order: order(None),
            items: Vec::new(),
        };
        let view = OrderDetailView::new(&detail, &ShopConfig::default());
        assert_eq!(
            view.address_lines,
            vec!["Ada Lovelace", "12 Analytical Row", "Flat 2", "SW1A 1AA London", "GB"]
        );
        assert_eq!(view.summary.total, "$25.00");
        assert_eq!(view.payment_method, "Bank transfer");
    }
}
