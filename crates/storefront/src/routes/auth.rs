//! Authentication route handlers.
//!
//! Login, registration, logout and password resets. Failures redirect back
//! to the form with an `error` code in the query string.

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
use shopfront_commerce::models::User;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::auth::is_safe_redirect;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::PageContext;
use crate::services::cart::merge_guest_cart;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub password_confirm: String,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

/// Query parameters for the reset link.
#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Message for an `error` code.
#[must_use]
pub fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Incorrect email or password.",
        "password_mismatch" => "The passwords do not match.",
        "password_too_short" => "Passwords must be at least 8 characters.",
        "email_taken" => "An account with this email already exists.",
        "invalid_email" => "Enter a valid email address.",
        "invalid_name" => "Enter your name (up to 120 characters).",
        "invalid_reset_link" => "This reset link is invalid or has expired.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Message for a `success` code.
#[must_use]
pub fn success_message(code: &str) -> &'static str {
    match code {
        "email_sent" => "If an account exists for that email, a reset link is on its way.",
        "password_reset" => "Your password has been changed. You can sign in now.",
        _ => "Done.",
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub error: Option<&'static str>,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub page: PageContext,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub page: PageContext,
    pub error: Option<&'static str>,
    pub token: String,
}

// =============================================================================
// Session
// =============================================================================

/// Put the user in the session and move their guest cart over.
async fn sign_in(state: &AppState, session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    if let Err(e) = merge_guest_cart(state.pool(), session, user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to merge guest cart");
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

fn login_redirect(error: &str, next: &str) -> Response {
    if next.is_empty() {
        return Redirect::to(&format!("/auth/login?error={error}")).into_response();
    }
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("/auth/login?error={error}&next={next}")).into_response()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(page: PageContext, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        page,
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().map(success_message),
        next: query.next.filter(|n| is_safe_redirect(n)).unwrap_or_default(),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let user = match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials | AuthError::UserNotFound | AuthError::InvalidEmail(_)) => {
            tracing::info!("Login failed");
            return Ok(login_redirect("credentials", &form.next));
        }
        Err(e) => return Err(e.into()),
    };

    sign_in(&state, &session, &user).await?;
    add_breadcrumb("auth", "User logged in", &[("user_id", &user.id.to_string())]);
    tracing::info!(user_id = %user.id, "User logged in");

    let destination = if is_safe_redirect(&form.next) {
        form.next.as_str()
    } else {
        "/account"
    };
    Ok(Redirect::to(destination).into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    page: PageContext,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    RegisterTemplate {
        page,
        error: query.error.as_deref().map(error_message),
    }
}

/// Handle registration form submission.
///
/// Signs the new customer in and sends a welcome email in the background.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    if form.password != form.password_confirm {
        return Ok(Redirect::to("/auth/register?error=password_mismatch").into_response());
    }

    let user = match AuthService::new(state.pool())
        .register(&form.email, &form.full_name, &form.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            let code = match e {
                AuthError::UserAlreadyExists => "email_taken",
                AuthError::WeakPassword(_) => "password_too_short",
                AuthError::InvalidEmail(_) => "invalid_email",
                AuthError::InvalidName(_) => "invalid_name",
                other => return Err(other.into()),
            };
            tracing::info!(reason = code, "Registration rejected");
            return Ok(Redirect::to(&format!("/auth/register?error={code}")).into_response());
        }
    };

    sign_in(&state, &session, &user).await?;

    let email = state.email().clone();
    tokio::spawn(async move {
        if let Err(e) = email.send_welcome(&user).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send welcome email");
        }
    });

    Ok(Redirect::to("/account?success=welcome").into_response())
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(
    page: PageContext,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    ForgotPasswordTemplate {
        page,
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().map(success_message),
    }
}

/// Handle forgot password form submission.
///
/// Always reports success so the form cannot be used to discover accounts.
#[instrument(skip(state, form))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    match AuthService::new(state.pool())
        .start_password_reset(&form.email)
        .await
    {
        Ok(Some((user, token))) => {
            let email = state.email().clone();
            tokio::spawn(async move {
                if let Err(e) = email.send_password_reset(&user, &token).await {
                    tracing::error!(user_id = %user.id, error = %e, "Failed to send reset email");
                }
            });
        }
        Ok(None) => tracing::debug!("Password reset requested for unknown email"),
        Err(e) => tracing::error!(error = %e, "Password reset request failed"),
    }

    Redirect::to("/auth/forgot-password?success=email_sent").into_response()
}

/// Display the reset password page.
#[instrument(skip(state, page, query))]
pub async fn reset_password_page(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ResetQuery>,
) -> Result<Response> {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Ok(Redirect::to("/auth/forgot-password?error=invalid_reset_link").into_response());
    };
    if !AuthService::new(state.pool())
        .reset_token_is_valid(&token)
        .await?
    {
        return Ok(Redirect::to("/auth/forgot-password?error=invalid_reset_link").into_response());
    }

    Ok(ResetPasswordTemplate {
        page,
        error: query.error.as_deref().map(error_message),
        token,
    }
    .into_response())
}

/// Handle reset password form submission.
#[instrument(skip(state, form))]
pub async fn reset_password(
    State(state): State<AppState>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response> {
    let retry = |code: &str| {
        let token: String = url::form_urlencoded::byte_serialize(form.token.as_bytes()).collect();
        Redirect::to(&format!("/auth/reset-password?token={token}&error={code}")).into_response()
    };

    if form.password != form.password_confirm {
        return Ok(retry("password_mismatch"));
    }

    match AuthService::new(state.pool())
        .reset_password(&form.token, &form.password)
        .await
    {
        Ok(user) => {
            add_breadcrumb("auth", "Password reset", &[("user_id", &user.id.to_string())]);
            Ok(Redirect::to("/auth/login?success=password_reset").into_response())
        }
        Err(AuthError::WeakPassword(_)) => Ok(retry("password_too_short")),
        Err(AuthError::InvalidResetToken) => {
            Ok(Redirect::to("/auth/forgot-password?error=invalid_reset_link").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_codes_get_generic_messages() {
        assert_eq!(error_message("credentials"), "Incorrect email or password.");
        assert_eq!(error_message("nope"), "Something went wrong. Please try again.");
        assert_eq!(success_message("nope"), "Done.");
    }

    #[test]
    fn test_login_redirect_keeps_next() {
        let response = login_redirect("credentials", "/orders");
        let location = response.headers()["location"].to_str().unwrap_or_default();
        assert_eq!(location, "/auth/login?error=credentials&next=%2Forders");
    }
}
