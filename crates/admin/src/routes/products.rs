//! Product management routes.

use askama::Template;
use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use shopfront_commerce::db::{CategoryRepository, ProductRepository, RepositoryError};
use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::{CategorySummary, Product, ProductInput};
use shopfront_commerce::storage::{
    StorageError, content_type_for, image_extension, object_path_for, validate_image_size,
};
use shopfront_commerce::validation::{FieldErrors, validate_form};
use shopfront_core::{CategoryId, ProductId, Slug};

use crate::{
    components::data_table::{DataTableConfig, products_table_config},
    error::{AppError, Result},
    filters,
    middleware::RequireAdmin,
    state::AppState,
};

use super::dashboard::{AdminUserView, invalidate_cache};
use super::{Flash, ListQuery, MessageQuery, PaginationView, render};

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

// =============================================================================
// Form
// =============================================================================

/// Product form as submitted. Checkboxes are absent when unticked.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ProductForm {
    #[validate(
        custom(function = "shopfront_commerce::validation::rules::not_blank"),
        length(max = 200, message = "Use at most 200 characters")
    )]
    pub name: String,

    /// Derived from the name when blank.
    pub slug: String,

    #[validate(length(max = 5000, message = "Use at most 5000 characters"))]
    pub description: String,

    #[validate(custom(function = "shopfront_commerce::validation::rules::money"))]
    pub price: String,

    #[validate(custom(function = "shopfront_commerce::validation::rules::non_negative_integer"))]
    pub stock: String,

    /// Blank for no category.
    pub category_id: String,

    pub is_published: Option<String>,
    pub is_featured: Option<String>,
}

impl ProductForm {
    /// A blank form for a new product.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            stock: "0".to_string(),
            ..Self::default()
        }
    }

    /// The form prefilled with a product's fields.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            slug: product.slug.to_string(),
            description: product.description.clone(),
            price: product.price.to_string(),
            stock: product.stock.to_string(),
            category_id: product
                .category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            is_published: product.is_published.then(|| "on".to_string()),
            is_featured: product.is_featured.then(|| "on".to_string()),
        }
    }

    #[must_use]
    pub const fn published(&self) -> bool {
        self.is_published.is_some()
    }

    #[must_use]
    pub const fn featured(&self) -> bool {
        self.is_featured.is_some()
    }

    /// Validate every field and build the repository input.
    ///
    /// # Errors
    ///
    /// Returns the message for each invalid field.
    pub fn to_input(&self) -> std::result::Result<ProductInput, FieldErrors> {
        let mut errors = validate_form(self).err().unwrap_or_default();

        let slug = if self.slug.trim().is_empty() {
            Slug::from_title(&self.name)
        } else {
            Slug::parse(self.slug.trim())
        };
        if slug.is_err() && !errors.has("name") {
            errors.insert(
                "slug",
                "Use lowercase letters, digits and single hyphens (at most 120 characters)",
            );
        }

        let category_id = match self.category_id.trim() {
            "" => Ok(None),
            id => id.parse::<i32>().map(|id| Some(CategoryId::new(id))),
        };
        if category_id.is_err() {
            errors.insert("category_id", "Choose a category");
        }

        let price = self.price.trim().parse::<Decimal>();
        let stock = self.stock.trim().parse::<i32>();

        match (slug, category_id, price, stock) {
            (Ok(slug), Ok(category_id), Ok(price), Ok(stock)) if errors.is_empty() => {
                Ok(ProductInput {
                    category_id,
                    name: self.name.trim().to_string(),
                    slug,
                    description: self.description.trim().to_string(),
                    price,
                    stock,
                    is_published: self.published(),
                    is_featured: self.featured(),
                })
            }
            _ => Err(errors),
        }
    }
}

// =============================================================================
// Views
// =============================================================================

/// Product row for the listing.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub price: String,
    pub stock: i32,
    pub low_stock: bool,
    pub is_published: bool,
    pub is_featured: bool,
    pub image_url: Option<String>,
}

impl ProductView {
    fn new(product: &Product, shop: &ShopConfig, low_stock_threshold: i32) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            slug: product.slug.to_string(),
            category: product.category_name.clone().unwrap_or_default(),
            price: shop.format(product.price),
            stock: product.stock,
            low_stock: product.stock <= low_stock_threshold,
            is_published: product.is_published,
            is_featured: product.is_featured,
            image_url: product.image_url.clone(),
        }
    }
}

/// Category choice in the product form.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

fn category_options(categories: &[CategorySummary], selected: &str) -> Vec<CategoryOption> {
    categories
        .iter()
        .map(|c| {
            let id = c.category.id.to_string();
            CategoryOption {
                selected: id == selected.trim(),
                name: c.category.name.clone(),
                id,
            }
        })
        .collect()
}

/// Products list page template.
#[derive(Template)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub table: DataTableConfig,
    pub products: Vec<ProductView>,
    pub pagination: PaginationView,
    pub flash: Option<Flash>,
}

/// New/edit product page template.
#[derive(Template)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub title: String,
    pub action: String,
    pub form: ProductForm,
    pub errors: FieldErrors,
    pub categories: Vec<CategoryOption>,
    /// Set when editing an existing product.
    pub product_id: Option<i32>,
    pub image_url: Option<String>,
    pub storage_enabled: bool,
    pub flash: Option<Flash>,
}

struct FormPage {
    title: &'static str,
    action: String,
    product: Option<Product>,
}

impl FormPage {
    fn new_product() -> Self {
        Self {
            title: "New product",
            action: "/products".to_string(),
            product: None,
        }
    }

    fn edit(product: Product) -> Self {
        Self {
            title: "Edit product",
            action: format!("/products/{}", product.id),
            product: Some(product),
        }
    }
}

async fn render_form(
    state: &AppState,
    admin_user: AdminUserView,
    page: FormPage,
    form: ProductForm,
    errors: FieldErrors,
    flash: Option<Flash>,
) -> Result<Response> {
    let categories = CategoryRepository::new(state.pool()).list(false).await?;
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    let template = ProductFormTemplate {
        admin_user,
        current_path: "/products".to_string(),
        title: page.title.to_string(),
        action: page.action,
        categories: category_options(&categories, &form.category_id),
        product_id: page.product.as_ref().map(|p| p.id.as_i32()),
        image_url: page.product.and_then(|p| p.image_url),
        storage_enabled: state.storage().is_some(),
        form,
        errors,
        flash,
    };
    Ok((status, render(&template)).into_response())
}

async fn find_product(state: &AppState, id: i32) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_id(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Whether `input` names a category that does not exist.
async fn unknown_category(state: &AppState, input: &ProductInput) -> Result<bool> {
    let Some(id) = input.category_id else {
        return Ok(false);
    };
    Ok(CategoryRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .is_none())
}

/// Field errors for a failed write, or the error itself.
fn write_errors(err: RepositoryError) -> Result<FieldErrors> {
    match err {
        RepositoryError::Conflict(_) => {
            let mut errors = FieldErrors::new();
            errors.insert("slug", "Another product already uses this slug");
            Ok(errors)
        }
        other => Err(other.into()),
    }
}

fn edit_redirect(id: ProductId, key: &str, code: &str) -> Response {
    Redirect::to(&format!("/products/{id}/edit?{key}={code}")).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Products list page handler.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>> {
    let page = ProductRepository::new(state.pool())
        .list_admin(query.search(), query.page_request())
        .await?;
    let threshold = state.config().low_stock_threshold;

    let template = ProductsIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/products".to_string(),
        table: products_table_config(&query.q),
        pagination: PaginationView::new(&page, "/products", &[("q", query.q.trim())]),
        products: page
            .items
            .iter()
            .map(|p| ProductView::new(p, state.shop(), threshold))
            .collect(),
        flash: query.flash(),
    };
    Ok(render(&template))
}

/// New product form.
#[instrument(skip(admin, state))]
pub async fn new_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Response> {
    render_form(
        &state,
        AdminUserView::from(&admin),
        FormPage::new_product(),
        ProductForm::blank(),
        FieldErrors::new(),
        None,
    )
    .await
}

/// Create a product, then continue on its edit page for the image.
#[instrument(skip(admin, state, form), fields(name = %form.name))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let admin_user = AdminUserView::from(&admin);
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => {
            return render_form(&state, admin_user, FormPage::new_product(), form, errors, None)
                .await;
        }
    };
    if unknown_category(&state, &input).await? {
        let mut errors = FieldErrors::new();
        errors.insert("category_id", "Choose a category");
        return render_form(&state, admin_user, FormPage::new_product(), form, errors, None).await;
    }

    let product = match ProductRepository::new(state.pool()).create(&input).await {
        Ok(product) => product,
        Err(e) => {
            let errors = write_errors(e)?;
            return render_form(&state, admin_user, FormPage::new_product(), form, errors, None)
                .await;
        }
    };

    invalidate_cache(state.pool()).await;
    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product created");
    Ok(edit_redirect(product.id, "success", "created"))
}

/// Edit product form.
#[instrument(skip(admin, state, query))]
pub async fn edit(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    let product = find_product(&state, id).await?;
    let form = ProductForm::from_product(&product);

    render_form(
        &state,
        AdminUserView::from(&admin),
        FormPage::edit(product),
        form,
        FieldErrors::new(),
        query.flash(),
    )
    .await
}

/// Update a product's fields.
#[instrument(skip(admin, state, form))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let product = find_product(&state, id).await?;
    let admin_user = AdminUserView::from(&admin);

    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => {
            return render_form(&state, admin_user, FormPage::edit(product), form, errors, None)
                .await;
        }
    };
    if unknown_category(&state, &input).await? {
        let mut errors = FieldErrors::new();
        errors.insert("category_id", "Choose a category");
        return render_form(&state, admin_user, FormPage::edit(product), form, errors, None).await;
    }

    if let Err(e) = ProductRepository::new(state.pool())
        .update(product.id, &input)
        .await
    {
        let errors = write_errors(e)?;
        return render_form(&state, admin_user, FormPage::edit(product), form, errors, None).await;
    }

    invalidate_cache(state.pool()).await;
    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product updated");
    Ok(Redirect::to("/products?success=updated").into_response())
}

/// Delete a product and its stored image.
#[instrument(skip(admin, state))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response> {
    let image_path = ProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await?;

    if let (Some(path), Some(storage)) = (image_path, state.storage()) {
        if let Err(e) = storage.delete(&path).await {
            tracing::warn!(path, error = %e, "Failed to delete product image");
        }
    }

    invalidate_cache(state.pool()).await;
    tracing::info!(product_id = id, admin_id = %admin.id, "Product deleted");
    Ok(Redirect::to("/products?success=deleted").into_response())
}

/// An image read from the upload form.
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Option<Upload>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if filename.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Upload {
            filename,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

/// Error code shown on the edit page for a rejected upload.
const fn upload_error_code(err: &StorageError) -> &'static str {
    match err {
        StorageError::UnsupportedType(_) => "image_type",
        StorageError::TooLarge(_) => "image_size",
        StorageError::Empty => "image_missing",
        StorageError::Http(_) | StorageError::Api { .. } => "upload_failed",
    }
}

/// Upload a product image, replacing (and deleting) the previous one.
#[instrument(skip(admin, state, multipart))]
pub async fn upload_image(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response> {
    let product = find_product(&state, id).await?;
    let Some(storage) = state.storage() else {
        return Ok(edit_redirect(product.id, "error", "storage_disabled"));
    };
    let Some(upload) = read_upload(multipart).await? else {
        return Ok(edit_redirect(product.id, "error", "image_missing"));
    };

    let checked = validate_image_size(upload.bytes.len())
        .and_then(|()| image_extension(&upload.filename))
        .and_then(|ext| Ok((object_path_for(product.id, &upload.filename)?, ext)));
    let (path, ext) = match checked {
        Ok(checked) => checked,
        Err(e) => {
            tracing::info!(error = %e, "Image upload rejected");
            return Ok(edit_redirect(product.id, "error", upload_error_code(&e)));
        }
    };

    let url = match storage
        .upload(&path, upload.bytes, content_type_for(&ext))
        .await
    {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(product_id = %product.id, error = %e, "Image upload failed");
            return Ok(edit_redirect(product.id, "error", upload_error_code(&e)));
        }
    };

    ProductRepository::new(state.pool())
        .set_image(product.id, Some(&url), Some(&path))
        .await?;

    if let Some(old) = product.image_path.filter(|old| *old != path) {
        if let Err(e) = storage.delete(&old).await {
            tracing::warn!(path = old, error = %e, "Failed to delete replaced image");
        }
    }

    invalidate_cache(state.pool()).await;
    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product image uploaded");
    Ok(edit_redirect(product.id, "success", "image"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_form() -> ProductForm {
        ProductForm {
            name: "Blue Mug".to_string(),
            price: "12.50".to_string(),
            stock: "4".to_string(),
            is_published: Some("on".to_string()),
            ..ProductForm::default()
        }
    }

    #[test]
    fn test_blank_slug_is_derived_from_name() {
        let input = valid_form().to_input().unwrap();
        assert_eq!(input.slug.as_str(), "blue-mug");
        assert_eq!(input.price, Decimal::new(1250, 2));
        assert_eq!(input.stock, 4);
        assert_eq!(input.category_id, None);
        assert!(input.is_published);
        assert!(!input.is_featured);
    }

    #[test]
    fn test_explicit_slug_must_be_well_formed() {
        let form = ProductForm {
            slug: "Not A Slug".to_string(),
            ..valid_form()
        };
        let errors = form.to_input().unwrap_err();
        assert!(errors.has("slug"));

        let form = ProductForm {
            slug: "mug-blue".to_string(),
            ..valid_form()
        };
        assert_eq!(form.to_input().unwrap().slug.as_str(), "mug-blue");
    }

    #[test]
    fn test_invalid_fields_are_reported() {
        let form = ProductForm {
            name: " ".to_string(),
            price: "-1".to_string(),
            stock: "2.5".to_string(),
            category_id: "abc".to_string(),
            ..ProductForm::default()
        };
        let errors = form.to_input().unwrap_err();

        assert!(errors.has("name"));
        assert!(errors.has("price"));
        assert!(errors.has("stock"));
        assert!(errors.has("category_id"));
        assert!(!errors.has("slug"));
    }

    #[test]
    fn test_name_length_is_bounded() {
        let form = ProductForm {
            name: "x".repeat(201),
            ..valid_form()
        };
        assert!(form.to_input().unwrap_err().has("name"));
    }

    #[test]
    fn test_upload_error_codes() {
        assert_eq!(
            upload_error_code(&StorageError::UnsupportedType("a.txt".to_string())),
            "image_type"
        );
        assert_eq!(upload_error_code(&StorageError::TooLarge(1)), "image_size");
        assert_eq!(upload_error_code(&StorageError::Empty), "image_missing");
    }

    #[test]
    fn test_write_errors_maps_slug_conflict() {
        let errors = write_errors(RepositoryError::Conflict("slug".to_string())).unwrap();
        assert_eq!(
            errors.get("slug"),
            Some("Another product already uses this slug")
        );
        assert!(write_errors(RepositoryError::NotFound).is_err());
    }
}
