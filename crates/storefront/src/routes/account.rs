//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_commerce::auth::{AuthError, AuthService};
use shopfront_commerce::db::OrderRepository;

use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::CurrentUser;
use crate::routes::PageContext;
use crate::routes::orders::OrderSummaryView;
use crate::state::AppState;

/// Orders shown on the account page.
const RECENT_ORDERS: usize = 5;

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
}

/// Change password form data.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub page: PageContext,
    pub email: String,
    pub full_name: String,
    pub member_since: String,
    pub recent_orders: Vec<OrderSummaryView>,
    pub has_more_orders: bool,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

fn error_message(code: &str) -> &'static str {
    match code {
        "invalid_name" => "Enter your name (up to 120 characters).",
        "wrong_password" => "Your current password is incorrect.",
        "password_too_short" => "Passwords must be at least 8 characters.",
        "password_mismatch" => "The new passwords do not match.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> &'static str {
    match code {
        "welcome" => "Welcome! Your account is ready.",
        "profile" => "Your profile has been updated.",
        "password" => "Your password has been changed.",
        _ => "Saved.",
    }
}

fn account_redirect(key: &str, code: &str) -> Response {
    Redirect::to(&format!("/account?{key}={code}")).into_response()
}

/// Display account overview page.
#[instrument(skip(state, page, current_user, query))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current_user): RequireAuth,
    Query(query): Query<AccountQuery>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .get_user(current_user.id)
        .await?;
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(AccountIndexTemplate {
        page,
        email: user.email.to_string(),
        full_name: user.full_name,
        member_since: user.created_at.format("%B %Y").to_string(),
        has_more_orders: orders.len() > RECENT_ORDERS,
        recent_orders: orders
            .iter()
            .take(RECENT_ORDERS)
            .map(|o| OrderSummaryView::new(o, state.shop()))
            .collect(),
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().map(success_message),
    })
}

/// Update the display name.
#[instrument(skip(state, session, current_user, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current_user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .update_profile(current_user.id, &form.full_name)
        .await
    {
        Ok(user) => {
            set_current_user(&session, &CurrentUser::from(&user)).await?;
            Ok(account_redirect("success", "profile"))
        }
        Err(AuthError::InvalidName(_)) => Ok(account_redirect("error", "invalid_name")),
        Err(e) => Err(e.into()),
    }
}

/// Change the password after checking the current one.
#[instrument(skip(state, current_user, form))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Response> {
    if form.new_password != form.new_password_confirm {
        return Ok(account_redirect("error", "password_mismatch"));
    }

    match AuthService::new(state.pool())
        .change_password(current_user.id, &form.current_password, &form.new_password)
        .await
    {
        Ok(()) => {
            crate::error::add_breadcrumb(
                "auth",
                "Password changed",
                &[("user_id", &current_user.id.to_string())],
            );
            Ok(account_redirect("success", "password"))
        }
        Err(AuthError::InvalidCredentials) => Ok(account_redirect("error", "wrong_password")),
        Err(AuthError::WeakPassword(_)) => Ok(account_redirect("error", "password_too_short")),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_for_known_codes() {
        assert_eq!(error_message("wrong_password"), "Your current password is incorrect.");
        assert_eq!(success_message("password"), "Your password has been changed.");
        assert_eq!(error_message("other"), "Something went wrong. Please try again.");
    }
}
