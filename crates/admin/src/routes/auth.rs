//! Admin authentication routes.
//!
//! Admins sign in with the same email and password as on the storefront;
//! only accounts with the `admin` role are let in.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_commerce::auth::{AuthError, AuthService};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;
use crate::state::AppState;

use super::{Flash, MessageQuery, render};

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub flash: Option<Flash>,
}

/// Display the login page.
pub async fn login_page(Query(query): Query<MessageQuery>) -> Html<String> {
    render(&LoginTemplate {
        flash: query.flash(),
    })
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
            tracing::info!("Admin login failed");
            return Ok(Redirect::to("/auth/login?error=credentials").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let Some(admin) = CurrentAdmin::for_admin(&user) else {
        tracing::warn!(user_id = %user.id, "Non-admin attempted admin login");
        return Ok(Redirect::to("/auth/login?error=not_admin").into_response());
    };

    set_current_admin(&session, &admin).await?;
    set_sentry_user(&admin.id, Some(admin.email.as_str()));
    tracing::info!(user_id = %admin.id, "Admin logged in");

    Ok(Redirect::to("/").into_response())
}

/// Handle logout.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login?success=signed_out").into_response())
}
