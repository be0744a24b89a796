//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_commerce::models::{ProductFilter, ProductSort};
use shopfront_core::{Page, PageRequest, Slug};

use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::home::CategoryLink;
use crate::routes::{PageContext, PaginationView, ProductView};
use crate::state::AppState;

/// Product listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

impl ListQuery {
    /// Search text, trimmed; `None` when blank.
    #[must_use]
    pub fn search(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from)
    }

    /// Requested sort; unknown values fall back to newest.
    #[must_use]
    pub fn sort(&self) -> ProductSort {
        self.sort
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::from_query(self.page, None)
    }
}

/// Sort option for the select box.
#[derive(Clone)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Sort options with the current one selected.
#[must_use]
pub fn sort_options(current: ProductSort) -> Vec<SortOption> {
    ProductSort::ALL
        .into_iter()
        .map(|sort| SortOption {
            value: sort.as_str(),
            label: sort.label(),
            selected: sort == current,
        })
        .collect()
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub products: Vec<ProductView>,
    pub categories: Vec<CategoryLink>,
    pub query: String,
    pub category: String,
    pub sort_options: Vec<SortOption>,
    pub pagination: PaginationView,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: ProductView,
    pub category_slug: Option<String>,
}

/// Display the product listing.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    // An unknown category filter matches nothing rather than everything.
    let category_slug = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let category = match category_slug.map(Slug::parse) {
        None => None,
        Some(Ok(slug)) => Some(state.catalog().category(&slug).await?),
        Some(Err(_)) => Some(None),
    };

    let categories = state.catalog().categories().await?;
    let sort = query.sort();
    let search = query.search();

    let products = match category {
        Some(None) => Page::empty(query.page_request()),
        found => {
            state
                .catalog()
                .list_products(&ProductFilter {
                    query: search.clone(),
                    category: found.flatten().map(|c| c.id),
                    sort,
                    page: query.page_request(),
                })
                .await?
        }
    };

    let search = search.unwrap_or_default();
    let category = category_slug.unwrap_or_default().to_string();
    let pagination = PaginationView::new(
        &products,
        "/products",
        &[("q", &search), ("category", &category), ("sort", sort.as_str())],
    );

    Ok(ProductsIndexTemplate {
        page,
        products: ProductView::list(&products.items, state.shop()),
        categories: categories.iter().map(CategoryLink::from).collect(),
        query: search,
        category,
        sort_options: sort_options(sort),
        pagination,
    })
}

/// Display a product.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let not_found = || AppError::NotFound(format!("product {slug}"));
    let parsed = Slug::parse(&slug).map_err(|_| not_found())?;
    let product = state
        .catalog()
        .product(&parsed)
        .await?
        .ok_or_else(not_found)?;

    let category_slug = match product.category_id {
        Some(_) => state
            .catalog()
            .categories()
            .await?
            .into_iter()
            .find(|c| Some(c.category.id) == product.category_id)
            .map(|c| c.category.slug.to_string()),
        None => None,
    };

    Ok(ProductShowTemplate {
        product: ProductView::new(&product, state.shop()),
        page,
        category_slug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_ignored() {
        let query = ListQuery {
            q: Some("   ".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(query.search(), None);

        let query = ListQuery {
            q: Some(" mug ".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(query.search().as_deref(), Some("mug"));
    }

    #[test]
    fn test_unknown_sort_falls_back() {
        let query = ListQuery {
            sort: Some("cheapest".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(query.sort(), ProductSort::Newest);

        let query = ListQuery {
            sort: Some("price_desc".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(query.sort(), ProductSort::PriceDesc);
    }

    #[test]
    fn test_sort_options_mark_selected() {
        let options = sort_options(ProductSort::Name);
        assert_eq!(options.len(), ProductSort::ALL.len());
        assert_eq!(options.iter().filter(|o| o.selected).count(), 1);
        assert!(options.iter().any(|o| o.selected && o.value == "name"));
    }
}
