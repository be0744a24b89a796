//! Home page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use shopfront_commerce::models::CategorySummary;

use crate::error::Result;
use crate::filters;
use crate::routes::{PageContext, ProductView};
use crate::state::AppState;

/// Category link for templates.
#[derive(Clone)]
pub struct CategoryLink {
    pub name: String,
    pub slug: String,
    pub product_count: i64,
}

impl From<&CategorySummary> for CategoryLink {
    fn from(summary: &CategorySummary) -> Self {
        Self {
            name: summary.category.name.clone(),
            slug: summary.category.slug.to_string(),
            product_count: summary.product_count,
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub featured: Vec<ProductView>,
    pub categories: Vec<CategoryLink>,
}

/// Display the home page.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let featured = state.catalog().featured().await?;
    let categories = state.catalog().categories().await?;

    Ok(HomeTemplate {
        page,
        featured: ProductView::list(&featured, state.shop()),
        categories: categories
            .iter()
            .filter(|c| c.product_count > 0)
            .map(CategoryLink::from)
            .collect(),
    })
}
