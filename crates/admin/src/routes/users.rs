//! User management routes.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_commerce::db::{OrderRepository, UserRepository};
use shopfront_commerce::models::User;
use shopfront_core::{UserId, UserRole};

use crate::{
    components::data_table::{DataTableConfig, users_table_config},
    error::{AppError, Result},
    filters,
    middleware::RequireAdmin,
    state::AppState,
};

use super::dashboard::{AdminUserView, RecentOrderView, invalidate_cache};
use super::{Flash, ListQuery, MessageQuery, PaginationView, render};

/// User row for the listing and detail page.
#[derive(Debug, Clone)]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub is_admin: bool,
    pub joined: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.as_i32(),
            name: user.full_name.clone(),
            email: user.email.to_string(),
            role: user.role.as_str(),
            is_admin: user.is_admin(),
            joined: user.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "users/index.html")]
pub struct UsersIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub table: DataTableConfig,
    pub users: Vec<UserView>,
    pub pagination: PaginationView,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "users/show.html")]
pub struct UserShowTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub user: UserView,
    /// Whether this is the signed-in admin, whose role is locked.
    pub is_self: bool,
    pub orders: Vec<RecentOrderView>,
    pub flash: Option<Flash>,
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

/// Users list page handler.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>> {
    let page = UserRepository::new(state.pool())
        .list(query.search(), query.page_request())
        .await?;

    let template = UsersIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/users".to_string(),
        table: users_table_config(&query.q),
        pagination: PaginationView::new(&page, "/users", &[("q", query.q.trim())]),
        users: page.items.iter().map(UserView::from).collect(),
        flash: query.flash(),
    };
    Ok(render(&template))
}

/// User detail page with their orders.
#[instrument(skip(admin, state, query))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(UserId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    let template = UserShowTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/users".to_string(),
        is_self: user.id == admin.id,
        user: UserView::from(&user),
        orders: orders
            .iter()
            .map(|o| RecentOrderView::new(o, state.shop()))
            .collect(),
        flash: query.flash(),
    };
    Ok(render(&template))
}

/// Change a user's role. Admins cannot change their own.
#[instrument(skip(admin, state, form), fields(role = %form.role))]
pub async fn update_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<RoleForm>,
) -> Result<Response> {
    let id = UserId::new(id);
    let back = |key: &str, code: &str| {
        Redirect::to(&format!("/users/{id}?{key}={code}")).into_response()
    };

    let Ok(role) = form.role.parse::<UserRole>() else {
        return Ok(back("error", "invalid_role"));
    };
    if id == admin.id {
        return Ok(back("error", "own_role"));
    }

    let user = UserRepository::new(state.pool()).set_role(id, role).await?;

    invalidate_cache(state.pool()).await;
    tracing::info!(user_id = %user.id, role = %user.role, admin_id = %admin.id, "User role changed");
    Ok(back("success", "role"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use shopfront_core::Email;

    use super::*;

    #[test]
    fn test_user_view() {
        let user = User {
            id: UserId::new(2),
            email: Email::parse("admin@example.com").unwrap(),
            full_name: "Ada Admin".to_string(),
            role: UserRole::Admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let view = UserView::from(&user);
        assert_eq!(view.role, "admin");
        assert!(view.is_admin);
        assert_eq!(view.name, "Ada Admin");
    }
}
