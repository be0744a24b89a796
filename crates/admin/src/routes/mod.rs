//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Health check
//! GET  /health/ready               - Readiness (database)
//!
//! # Auth (password login, role must be admin)
//! GET  /auth/login                 - Login page
//! POST /auth/login                 - Sign in
//! POST /auth/logout                - Sign out
//!
//! # Dashboard
//! GET  /                           - Order counts, revenue, low stock
//!
//! # Products
//! GET  /products                   - Product listing (search, pages)
//! GET  /products/new               - New product form
//! POST /products                   - Create product
//! GET  /products/{id}/edit         - Edit form
//! POST /products/{id}              - Update product
//! POST /products/{id}/image        - Upload product image (multipart)
//! POST /products/{id}/delete       - Delete product
//!
//! # Categories
//! GET  /categories                 - Category listing
//! GET  /categories/new             - New category form
//! POST /categories                 - Create category
//! GET  /categories/{id}/edit       - Edit form
//! POST /categories/{id}            - Update category
//! POST /categories/{id}/delete     - Delete category
//!
//! # Orders
//! GET  /orders                     - Order listing (status, search, pages)
//! GET  /orders/{id}                - Order detail
//! POST /orders/{id}/status         - Change status, notify customer
//!
//! # Users
//! GET  /users                      - User listing (search, pages)
//! GET  /users/{id}                 - User detail with orders
//! POST /users/{id}/role            - Change role
//! ```

pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod users;

use askama::Template;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Html,
    routing::{get, post},
};
use serde::Deserialize;

use shopfront_commerce::storage::MAX_IMAGE_BYTES;
use shopfront_core::{Page, PageRequest};

use crate::state::AppState;

/// Rows per page on admin listings.
pub const ADMIN_PAGE_SIZE: u32 = 25;

/// Build the admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/auth/login", get(auth::login_page).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/products", get(products::index).post(products::create))
        .route("/products/new", get(products::new_product))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit))
        .route("/products/{id}/delete", post(products::delete))
        .route(
            "/products/{id}/image",
            // Room for the multipart framing around the image
            post(products::upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
        .route(
            "/categories",
            get(categories::index).post(categories::create),
        )
        .route("/categories/new", get(categories::new_category))
        .route("/categories/{id}", post(categories::update))
        .route("/categories/{id}/edit", get(categories::edit))
        .route("/categories/{id}/delete", post(categories::delete))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/users", get(users::index))
        .route("/users/{id}", get(users::show))
        .route("/users/{id}/role", post(users::update_role))
}

/// Render a template to HTML, logging render failures.
pub fn render(template: &impl Template) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

// =============================================================================
// Listing queries
// =============================================================================

/// Query parameters shared by the listing pages.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub status: String,
    pub page: Option<u32>,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl ListQuery {
    /// The search term, if not blank.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        Some(self.q.trim()).filter(|q| !q.is_empty())
    }

    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::from_query(self.page, Some(ADMIN_PAGE_SIZE))
    }

    #[must_use]
    pub fn flash(&self) -> Option<Flash> {
        Flash::from_query(self.error.as_deref(), self.success.as_deref())
    }
}

/// Query parameters for pages that only show messages.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

impl MessageQuery {
    #[must_use]
    pub fn flash(&self) -> Option<Flash> {
        Flash::from_query(self.error.as_deref(), self.success.as_deref())
    }
}

// =============================================================================
// Flash messages
// =============================================================================

/// A one-off message shown after a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub is_error: bool,
    pub message: &'static str,
}

impl Flash {
    /// Message for `?error=code` or `?success=code`; errors win.
    #[must_use]
    pub fn from_query(error: Option<&str>, success: Option<&str>) -> Option<Self> {
        if let Some(code) = error {
            return Some(Self {
                is_error: true,
                message: error_message(code),
            });
        }
        success.map(|code| Self {
            is_error: false,
            message: success_message(code),
        })
    }
}

fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Incorrect email or password.",
        "not_admin" => "This account does not have admin access.",
        "storage_disabled" => "Image uploads are not configured.",
        "image_missing" => "Choose an image to upload.",
        "image_type" => "Images must be JPG, PNG, WebP or GIF.",
        "image_size" => "Images must be 5 MB or smaller.",
        "upload_failed" => "The image could not be uploaded. Try again.",
        "invalid_status" => "That status change is not allowed.",
        "own_role" => "You cannot change your own role.",
        "invalid_role" => "Unknown role.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> &'static str {
    match code {
        "created" => "Created.",
        "updated" => "Saved.",
        "deleted" => "Deleted.",
        "image" => "Image uploaded.",
        "status" => "Order status updated. The customer has been notified.",
        "role" => "Role updated.",
        "signed_out" => "You have been signed out.",
        _ => "Done.",
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Previous/next links for a listing.
#[derive(Debug, Clone)]
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

    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.total_pages > 1
    }
}

fn page_url(path: &str, params: &[(&str, &str)], page: u32) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_prefers_errors() {
        let flash = Flash::from_query(Some("own_role"), Some("role"));
        assert_eq!(
            flash,
            Some(Flash {
                is_error: true,
                message: "You cannot change your own role.",
            })
        );
        assert_eq!(
            Flash::from_query(None, Some("deleted")).map(|f| f.message),
            Some("Deleted.")
        );
        assert_eq!(Flash::from_query(None, None), None);
    }

    #[test]
    fn test_list_query_blank_search_is_none() {
        let query = ListQuery {
            q: "   ".to_string(),
            ..ListQuery::default()
        };
        assert_eq!(query.search(), None);
        assert_eq!(query.page_request().page, 1);
        assert_eq!(query.page_request().size, ADMIN_PAGE_SIZE);
    }

    #[test]
    fn test_pagination_keeps_filters() {
        let page: Page<u8> = Page::new(vec![], PageRequest::new(2, 25), 80);
        let view = PaginationView::new(&page, "/orders", &[("status", "shipped"), ("q", "")]);

        assert_eq!(view.total_pages, 4);
        assert_eq!(view.prev_url.as_deref(), Some("/orders?status=shipped"));
        assert_eq!(view.next_url.as_deref(), Some("/orders?status=shipped&page=3"));
    }
}
