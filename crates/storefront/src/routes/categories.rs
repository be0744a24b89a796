//! Category pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::instrument;

use shopfront_commerce::models::ProductFilter;
use shopfront_core::Slug;

use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::products::{ListQuery, SortOption, sort_options};
use crate::routes::{PageContext, PaginationView, ProductView};
use crate::state::AppState;

/// Category page template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/show.html")]
pub struct CategoryShowTemplate {
    pub page: PageContext,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub products: Vec<ProductView>,
    pub sort_options: Vec<SortOption>,
    pub pagination: PaginationView,
}

/// Display the published products in a category.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let not_found = || AppError::NotFound(format!("category {slug}"));
    let parsed = Slug::parse(&slug).map_err(|_| not_found())?;
    let category = state
        .catalog()
        .category(&parsed)
        .await?
        .ok_or_else(not_found)?;

    let sort = query.sort();
    let products = state
        .catalog()
        .list_products(&ProductFilter {
            query: None,
            category: Some(category.id),
            sort,
            page: query.page_request(),
        })
        .await?;

    let path = format!("/categories/{}", category.slug);
    let pagination = PaginationView::new(&products, &path, &[("sort", sort.as_str())]);

    Ok(CategoryShowTemplate {
        page,
        name: category.name,
        slug: category.slug.to_string(),
        description: category.description,
        products: ProductView::list(&products.items, state.shop()),
        sort_options: sort_options(sort),
        pagination,
    })
}
