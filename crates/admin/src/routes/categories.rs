//! Category management routes.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use shopfront_commerce::db::{CategoryRepository, RepositoryError};
use shopfront_commerce::models::{Category, CategoryInput};
use shopfront_commerce::validation::{FieldErrors, validate_form};
use shopfront_core::{CategoryId, Slug};

use crate::{
    components::data_table::{DataTableConfig, categories_table_config},
    error::{AppError, Result},
    filters,
    middleware::RequireAdmin,
    state::AppState,
};

use super::dashboard::{AdminUserView, invalidate_cache};
use super::{Flash, MessageQuery, render};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CategoryForm {
    #[validate(
        custom(function = "shopfront_commerce::validation::rules::not_blank"),
        length(max = 120, message = "Use at most 120 characters")
    )]
    pub name: String,

    /// Derived from the name when blank.
    pub slug: String,

    #[validate(length(max = 2000, message = "Use at most 2000 characters"))]
    pub description: String,
}

impl CategoryForm {
    #[must_use]
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            slug: category.slug.to_string(),
            description: category.description.clone(),
        }
    }

    /// Validate and build the repository input.
    ///
    /// # Errors
    ///
    /// Returns the message for each invalid field.
    pub fn to_input(&self) -> std::result::Result<CategoryInput, FieldErrors> {
        let mut errors = validate_form(self).err().unwrap_or_default();

        let slug = if self.slug.trim().is_empty() {
            Slug::from_title(&self.name)
        } else {
            Slug::parse(self.slug.trim())
        };

        match slug {
            Ok(slug) if errors.is_empty() => Ok(CategoryInput {
                name: self.name.trim().to_string(),
                slug,
                description: self.description.trim().to_string(),
            }),
            Ok(_) => Err(errors),
            Err(_) => {
                if !errors.has("name") {
                    errors.insert("slug", "Use lowercase letters, digits and single hyphens");
                }
                Err(errors)
            }
        }
    }
}

/// Category row for the listing.
#[derive(Debug, Clone)]
pub struct CategoryView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub product_count: i64,
}

#[derive(Template)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub table: DataTableConfig,
    pub categories: Vec<CategoryView>,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "categories/form.html")]
pub struct CategoryFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub title: String,
    pub action: String,
    pub category_id: Option<i32>,
    pub form: CategoryForm,
    pub errors: FieldErrors,
}

fn form_page(
    admin_user: AdminUserView,
    category_id: Option<CategoryId>,
    form: CategoryForm,
    errors: FieldErrors,
) -> Response {
    let (title, action) = match category_id {
        Some(id) => ("Edit category", format!("/categories/{id}")),
        None => ("New category", "/categories".to_string()),
    };
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    let template = CategoryFormTemplate {
        admin_user,
        current_path: "/categories".to_string(),
        title: title.to_string(),
        action,
        category_id: category_id.map(|id| id.as_i32()),
        form,
        errors,
    };
    (status, render(&template)).into_response()
}

fn slug_conflict(err: RepositoryError) -> Result<FieldErrors> {
    match err {
        RepositoryError::Conflict(_) => {
            let mut errors = FieldErrors::new();
            errors.insert("slug", "Another category already uses this slug");
            Ok(errors)
        }
        other => Err(other.into()),
    }
}

/// Categories list page handler.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>> {
    let categories = CategoryRepository::new(state.pool()).list(false).await?;

    let template = CategoriesIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/categories".to_string(),
        table: categories_table_config(),
        categories: categories
            .into_iter()
            .map(|c| CategoryView {
                id: c.category.id.as_i32(),
                name: c.category.name,
                slug: c.category.slug.into_inner(),
                product_count: c.product_count,
            })
            .collect(),
        flash: query.flash(),
    };
    Ok(render(&template))
}

/// New category form.
#[instrument(skip(admin))]
pub async fn new_category(RequireAdmin(admin): RequireAdmin) -> Response {
    form_page(
        AdminUserView::from(&admin),
        None,
        CategoryForm::default(),
        FieldErrors::new(),
    )
}

/// Create a category.
#[instrument(skip(admin, state, form), fields(name = %form.name))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let admin_user = AdminUserView::from(&admin);
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return Ok(form_page(admin_user, None, form, errors)),
    };

    let category = match CategoryRepository::new(state.pool()).create(&input).await {
        Ok(category) => category,
        Err(e) => return Ok(form_page(admin_user, None, form, slug_conflict(e)?)),
    };

    invalidate_cache(state.pool()).await;
    tracing::info!(category_id = %category.id, admin_id = %admin.id, "Category created");
    Ok(Redirect::to("/categories?success=created").into_response())
}

/// Edit category form.
#[instrument(skip(admin, state))]
pub async fn edit(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response> {
    let category = CategoryRepository::new(state.pool())
        .get_by_id(CategoryId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;

    Ok(form_page(
        AdminUserView::from(&admin),
        Some(category.id),
        CategoryForm::from_category(&category),
        FieldErrors::new(),
    ))
}

/// Update a category.
#[instrument(skip(admin, state, form))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let id = CategoryId::new(id);
    let admin_user = AdminUserView::from(&admin);
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return Ok(form_page(admin_user, Some(id), form, errors)),
    };

    if let Err(e) = CategoryRepository::new(state.pool())
        .update(id, &input)
        .await
    {
        return Ok(form_page(admin_user, Some(id), form, slug_conflict(e)?));
    }

    invalidate_cache(state.pool()).await;
    tracing::info!(category_id = %id, admin_id = %admin.id, "Category updated");
    Ok(Redirect::to("/categories?success=updated").into_response())
}

/// Delete a category. Its products stay, uncategorised.
#[instrument(skip(admin, state))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response> {
    CategoryRepository::new(state.pool())
        .delete(CategoryId::new(id))
        .await?;

    invalidate_cache(state.pool()).await;
    tracing::info!(category_id = id, admin_id = %admin.id, "Category deleted");
    Ok(Redirect::to("/categories?success=deleted").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_defaults_to_name() {
        let form = CategoryForm {
            name: "Kitchen & Dining".to_string(),
            ..CategoryForm::default()
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.slug.as_str(), "kitchen-dining");
        assert_eq!(input.name, "Kitchen & Dining");
    }

    #[test]
    fn test_blank_name_is_rejected_without_slug_noise() {
        let errors = CategoryForm::default().to_input().unwrap_err();
        assert!(errors.has("name"));
        assert!(!errors.has("slug"));
    }

    #[test]
    fn test_bad_explicit_slug_is_rejected() {
        let form = CategoryForm {
            name: "Mugs".to_string(),
            slug: "--mugs".to_string(),
            ..CategoryForm::default()
        };
        assert!(form.to_input().unwrap_err().has("slug"));
    }
}
