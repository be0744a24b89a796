//! Cart route handlers.
//!
//! Cart changes answer HTMX requests with fragments and an
//! `HX-Trigger: cart-updated` header so the count badge refreshes. Plain
//! form posts are redirected back to the cart page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::CartLine;
use shopfront_core::ProductId;

use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::{PageContext, is_htmx};
use crate::services::cart::{self, Cart, CartError};
use crate::state::AppState;

/// Header set on every successful cart change.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: i32,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
    /// Whether the quantity is still in stock.
    pub available: bool,
    pub stock: i32,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    #[must_use]
    pub fn new(lines: &[CartLine], shop: &ShopConfig) -> Self {
        let totals = cart::totals(lines, shop);
        Self {
            lines: lines
                .iter()
                .map(|line| CartLineView {
                    product_id: line.product_id.as_i32(),
                    name: line.name.clone(),
                    slug: line.slug.to_string(),
                    image_url: line.image_url.clone(),
                    unit_price: shop.format(line.unit_price),
                    quantity: line.quantity,
                    line_total: shop.format(line.line_total()),
                    available: line.is_available(),
                    stock: line.stock,
                })
                .collect(),
            subtotal: shop.format(totals.subtotal),
            shipping: shop.format(totals.shipping),
            tax: shop.format(totals.tax),
            total: shop.format(totals.total),
            item_count: totals.item_count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether every line can be fulfilled.
    #[must_use]
    pub fn all_available(&self) -> bool {
        self.lines.iter().all(|line| line.available)
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i32,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i32,
}

/// Query parameters for messages after a redirect.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub error: Option<String>,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Notice shown next to the add-to-cart button.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_notice.html")]
pub struct CartNoticeTemplate {
    pub message: String,
    pub ok: bool,
}

/// Short code for a user-facing cart error, used in redirects.
const fn error_code(err: &CartError) -> Option<&'static str> {
    match err {
        CartError::InvalidQuantity => Some("quantity"),
        CartError::ProductUnavailable => Some("unavailable"),
        CartError::InsufficientStock { .. } => Some("stock"),
        CartError::Repository(_) | CartError::Session(_) => None,
    }
}

/// Message for an error code from the query string.
#[must_use]
pub fn error_message(code: &str) -> Option<&'static str> {
    match code {
        "quantity" => Some("Choose a quantity between 1 and 99."),
        "unavailable" => Some("That product is no longer available."),
        "stock" => Some("There is not enough stock for that quantity."),
        "empty" => Some("Your cart is empty."),
        _ => None,
    }
}

/// Split a cart result into a user message or a server error.
fn user_error(result: std::result::Result<(), CartError>) -> Result<Option<String>> {
    match result {
        Ok(()) => Ok(None),
        Err(err) if error_code(&err).is_some() => Ok(Some(err.to_string())),
        Err(err) => Err(err.into()),
    }
}

fn redirect_to_cart(result: std::result::Result<(), CartError>) -> Result<Response> {
    match result {
        Ok(()) => Ok(Redirect::to("/cart").into_response()),
        Err(err) => match error_code(&err) {
            Some(code) => Ok(Redirect::to(&format!("/cart?error={code}")).into_response()),
            None => Err(err.into()),
        },
    }
}

/// Display the cart page.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Query(query): Query<CartQuery>,
) -> Result<impl IntoResponse> {
    let user_id = page.user.as_ref().map(|u| u.id);
    let lines = Cart::new(state.pool(), &session, user_id).lines().await?;

    Ok(CartShowTemplate {
        cart: CartView::new(&lines, state.shop()),
        page,
        error: query
            .error
            .as_deref()
            .and_then(error_message)
            .map(String::from),
    })
}

/// Add a product to the cart.
#[instrument(skip(state, session, user, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let cart = Cart::new(state.pool(), &session, user.map(|u| u.id));
    let result = cart
        .add(ProductId::new(form.product_id), form.quantity.unwrap_or(1))
        .await;

    if !is_htmx(&headers) {
        return redirect_to_cart(result);
    }

    match user_error(result)? {
        None => {
            crate::error::add_breadcrumb(
                "cart",
                "Added to cart",
                &[("product_id", &form.product_id.to_string())],
            );
            Ok((
                AppendHeaders([CART_UPDATED]),
                CartNoticeTemplate {
                    message: "Added to cart".to_string(),
                    ok: true,
                },
            )
                .into_response())
        }
        Some(message) => Ok(CartNoticeTemplate { message, ok: false }.into_response()),
    }
}

async fn items_fragment(
    state: &AppState,
    cart: &Cart<'_>,
    error: Option<String>,
) -> Result<Response> {
    let lines = cart.lines().await?;
    Ok((
        AppendHeaders([CART_UPDATED]),
        CartItemsTemplate {
            cart: CartView::new(&lines, state.shop()),
            error,
        },
    )
        .into_response())
}

/// Change a line's quantity. Zero removes the line.
#[instrument(skip(state, session, user, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let cart = Cart::new(state.pool(), &session, user.map(|u| u.id));
    let result = cart
        .update(ProductId::new(form.product_id), form.quantity)
        .await;

    if !is_htmx(&headers) {
        return redirect_to_cart(result);
    }
    let error = user_error(result)?;
    items_fragment(&state, &cart, error).await
}

/// Remove a line from the cart.
#[instrument(skip(state, session, user, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let cart = Cart::new(state.pool(), &session, user.map(|u| u.id));
    let result = cart.remove(ProductId::new(form.product_id)).await;

    if !is_htmx(&headers) {
        return redirect_to_cart(result);
    }
    let error = user_error(result)?;
    items_fragment(&state, &cart, error).await
}

/// Cart count badge.
#[instrument(skip(state, session, user))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse> {
    let count = Cart::new(state.pool(), &session, user.map(|u| u.id))
        .count()
        .await?;
    Ok(CartCountTemplate { count })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopfront_core::Slug;

    use super::*;

    fn line(quantity: u32, stock: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(1),
            name: "Blue Mug".to_string(),
            slug: Slug::parse("blue-mug").unwrap(),
            image_url: None,
            unit_price: Decimal::new(1200, 2),
            quantity,
            stock,
        }
    }

    #[test]
    fn test_cart_view_formats_totals() {
        let view = CartView::new(&[line(2, 5)], &ShopConfig::default());
        assert_eq!(view.item_count, 2);
        assert_eq!(view.lines[0].line_total, "$24.00");
        assert_eq!(view.subtotal, "$24.00");
        assert!(view.all_available());
    }

    #[test]
    fn test_cart_view_flags_short_stock() {
        let view = CartView::new(&[line(3, 1)], &ShopConfig::default());
        assert!(!view.lines[0].available);
        assert!(!view.all_available());
    }

    #[test]
    fn test_error_codes_round_trip_to_messages() {
        for err in [
            CartError::InvalidQuantity,
            CartError::ProductUnavailable,
            CartError::InsufficientStock { available: 1 },
        ] {
            let code = error_code(&err).unwrap();
            assert!(error_message(code).is_some());
        }
        assert_eq!(error_message("bogus"), None);
    }
}
