//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                           - Home page (featured products, categories)
//!
//! # Catalog
//! GET  /products                   - Product listing (q, category, sort, page)
//! GET  /products/{slug}            - Product detail
//! GET  /categories/{slug}          - Products in a category
//!
//! # Cart (HTMX fragments, full pages without JavaScript)
//! GET  /cart                       - Cart page
//! POST /cart/add                   - Add to cart (count badge, triggers cart-updated)
//! POST /cart/update                - Change quantity (cart_items fragment)
//! POST /cart/remove                - Remove line (cart_items fragment)
//! GET  /cart/count                 - Cart count badge
//!
//! # Checkout
//! GET  /checkout                   - Checkout form
//! POST /checkout                   - Place order
//! GET  /checkout/complete/{number} - Order confirmation
//!
//! # Orders
//! GET  /orders                     - Order history (requires auth)
//! GET  /orders/{number}            - Order detail
//! GET  /track                      - Guest order lookup form
//! POST /track                      - Look up by number and email
//!
//! # Auth
//! GET  /auth/login                 - Login page
//! POST /auth/login                 - Login action
//! GET  /auth/register              - Register page
//! POST /auth/register              - Register action
//! POST /auth/logout                - Logout action
//! GET  /auth/forgot-password       - Request a reset link
//! POST /auth/forgot-password       - Send the reset link
//! GET  /auth/reset-password        - New password form (token in query)
//! POST /auth/reset-password        - Set the new password
//!
//! # Account (requires auth)
//! GET  /account                    - Profile and recent orders
//! POST /account                    - Update profile
//! POST /account/password           - Change password
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod home;
pub mod orders;
pub mod products;

use std::convert::Infallible;

use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{MethodRouter, get, post},
};

use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::Product;
use shopfront_core::Page;

use crate::middleware::rate_limit::RateLimiterLayer;
use crate::middleware::{
    CspNonce, OptionalAuth, auth_rate_limiter, cart_rate_limiter,
};
use crate::models::CurrentUser;
use crate::state::AppState;

// =============================================================================
// Shared view data
// =============================================================================

/// Data every full page needs for the layout.
#[derive(Clone)]
pub struct PageContext {
    pub shop_name: String,
    pub user: Option<CurrentUser>,
    pub nonce: String,
}

impl PageContext {
    /// Whether the visitor is signed in.
    #[must_use]
    pub const fn signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// The signed-in user's name, or an empty string.
    #[must_use]
    pub fn user_name(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.full_name.as_str())
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;

        Ok(Self {
            shop_name: state.shop().name.clone(),
            user,
            nonce,
        })
    }
}

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
    pub category_name: Option<String>,
    pub stock: i32,
    pub in_stock: bool,
    /// Largest quantity the add-to-cart form offers.
    pub max_quantity: u32,
}

impl ProductView {
    #[must_use]
    pub fn new(product: &Product, shop: &ShopConfig) -> Self {
        let stock = u32::try_from(product.stock).unwrap_or(0);
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            slug: product.slug.to_string(),
            description: product.description.clone(),
            price: shop.format(product.price),
            image_url: product.image_url.clone(),
            category_name: product.category_name.clone(),
            stock: product.stock,
            in_stock: product.in_stock(),
            max_quantity: stock.min(shopfront_commerce::db::carts::MAX_LINE_QUANTITY),
        }
    }

    /// Map a list of products.
    #[must_use]
    pub fn list(products: &[Product], shop: &ShopConfig) -> Vec<Self> {
        products.iter().map(|p| Self::new(p, shop)).collect()
    }
}

/// Previous/next links for a paginated list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationView {
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl PaginationView {
    /// Build links to `path` keeping the non-empty `params`.
    #[must_use]
    pub fn new<T>(page: &Page<T>, path: &str, params: &[(&str, &str)]) -> Self {
        let link = |n: u32| page_url(path, params, n);
        Self {
            page: page.page,
            total_pages: page.total_pages(),
            total: page.total,
            prev_url: page.has_prev().then(|| link(page.page - 1)),
            next_url: page.has_next().then(|| link(page.page + 1)),
        }
    }

    /// Whether there is more than one page.
    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.total_pages > 1
    }
}

/// `path?params&page=n`, skipping empty params and `page=1`.
#[must_use]
pub fn page_url(path: &str, params: &[(&str, &str)], page: u32) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if !value.is_empty() {
            query.append_pair(key, value);
        }
    }
    if page > 1 {
        query.append_pair("page", &page.to_string());
    }
    let query = query.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

/// Whether the request came from HTMX.
#[must_use]
pub fn is_htmx(headers: &axum::http::HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

// =============================================================================
// Routers
// =============================================================================

/// Serve `page` unthrottled and put `submit` behind `limiter`.
fn limited_submit<S>(
    page: MethodRouter<S>,
    submit: MethodRouter<S>,
    limiter: &RateLimiterLayer,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    page.merge(submit.layer(limiter.clone()))
}

/// Create the auth routes router.
///
/// Only form submissions count against the auth rate limit.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();
    Router::new()
        .route(
            "/login",
            limited_submit(get(auth::login_page), post(auth::login), &limiter),
        )
        .route(
            "/register",
            limited_submit(get(auth::register_page), post(auth::register), &limiter),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/forgot-password",
            limited_submit(
                get(auth::forgot_password_page),
                post(auth::forgot_password),
                &limiter,
            ),
        )
        .route(
            "/reset-password",
            limited_submit(
                get(auth::reset_password_page),
                post(auth::reset_password),
                &limiter,
            ),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .layer(cart_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::submit))
        .route("/complete/{number}", get(checkout::complete))
        .layer(cart_rate_limiter())
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{number}", get(orders::show))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index).post(account::update_profile))
        .route("/password", post(account::change_password))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .route("/categories/{slug}", get(categories::show))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .route("/track", get(orders::track_page).post(orders::track))
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use shopfront_core::PageRequest;

    use super::*;

    #[test]
    fn test_page_url_skips_empty_params_and_first_page() {
        assert_eq!(page_url("/products", &[("q", ""), ("sort", "")], 1), "/products");
        assert_eq!(
            page_url("/products", &[("q", "blue mug"), ("sort", "name")], 3),
            "/products?q=blue+mug&sort=name&page=3"
        );
    }

    #[test]
    fn test_pagination_links() {
        let page: Page<u8> = Page::new(vec![1, 2], PageRequest::new(2, 2), 6);
        let view = PaginationView::new(&page, "/products", &[("sort", "name")]);

        assert_eq!(view.total_pages, 3);
        assert_eq!(view.prev_url.as_deref(), Some("/products?sort=name"));
        assert_eq!(view.next_url.as_deref(), Some("/products?sort=name&page=3"));
        assert!(view.is_paginated());
    }

    #[tokio::test]
    async fn test_limited_submit_throttles_only_submissions() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let app: Router = Router::new().route(
            "/form",
            limited_submit(
                get(|| async { "form" }),
                post(|| async { "sent" }),
                &auth_rate_limiter(),
            ),
        );
        let request = |method: &str| {
            Request::builder()
                .method(method)
                .uri("/form")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..20 {
            let resp = app.clone().oneshot(request("GET")).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let mut statuses = Vec::new();
        for _ in 0..6 {
            let resp = app.clone().oneshot(request("POST")).await.unwrap();
            statuses.push(resp.status());
        }
        assert!(statuses[..5].iter().all(|s| *s == StatusCode::OK), "{statuses:?}");
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_single_page_has_no_links() {
        let page: Page<u8> = Page::new(vec![1], PageRequest::first(), 1);
        let view = PaginationView::new(&page, "/products", &[]);
        assert_eq!(view.prev_url, None);
        assert_eq!(view.next_url, None);
        assert!(!view.is_paginated());
    }
}
