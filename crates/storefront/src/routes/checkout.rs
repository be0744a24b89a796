//! Checkout route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use shopfront_commerce::validation::FieldErrors;
use shopfront_core::PaymentMethod;

use crate::error::Result;
use crate::filters;
use crate::routes::cart::CartView;
use crate::routes::orders::{OrderDetailView, visible_order};
use crate::routes::PageContext;
use crate::services::cart::Cart;
use crate::services::checkout::{CheckoutError, CheckoutForm, place_order};
use crate::state::AppState;

/// Payment method radio option.
#[derive(Clone)]
pub struct PaymentOption {
    pub value: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

fn payment_options(selected: &str) -> Vec<PaymentOption> {
    PaymentMethod::ALL
        .into_iter()
        .map(|method| PaymentOption {
            value: method.as_str(),
            label: method.label(),
            checked: method.as_str() == selected,
        })
        .collect()
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub form: CheckoutForm,
    pub errors: FieldErrors,
    pub payment_options: Vec<PaymentOption>,
    /// Problem with the order as a whole (e.g. stock ran out).
    pub message: Option<String>,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/complete.html")]
pub struct CompleteTemplate {
    pub page: PageContext,
    pub order: OrderDetailView,
}

async fn render_form(
    state: &AppState,
    session: &Session,
    page: PageContext,
    form: CheckoutForm,
    errors: FieldErrors,
    message: Option<String>,
) -> Result<Response> {
    let user_id = page.user.as_ref().map(|u| u.id);
    let lines = Cart::new(state.pool(), session, user_id).lines().await?;
    if lines.is_empty() {
        return Ok(Redirect::to("/cart?error=empty").into_response());
    }

    let status = if errors.is_empty() && message.is_none() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let template = CheckoutTemplate {
        cart: CartView::new(&lines, state.shop()),
        payment_options: payment_options(&form.payment_method),
        page,
        form,
        errors,
        message,
    };
    Ok((status, template).into_response())
}

/// Display the checkout form. Redirects to the cart when it is empty.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
) -> Result<Response> {
    let form = CheckoutForm::for_customer(page.user.as_ref());
    render_form(&state, &session, page, form, FieldErrors::new(), None).await
}

/// Place the order.
#[instrument(skip(state, session, page, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let details = match form.validate_details() {
        Ok(details) => details,
        Err(errors) => {
            tracing::debug!(fields = errors.len(), "Checkout form invalid");
            return render_form(&state, &session, page, form, errors, None).await;
        }
    };

    let placed = place_order(
        state.pool(),
        &session,
        page.user.as_ref(),
        state.shop(),
        details,
    )
    .await;

    let detail = match placed {
        Ok(detail) => detail,
        Err(CheckoutError::EmptyCart) => return Ok(Redirect::to("/cart?error=empty").into_response()),
        Err(CheckoutError::Unavailable(message)) => {
            return render_form(&state, &session, page, form, FieldErrors::new(), Some(message))
                .await;
        }
        Err(err) => return Err(err.into()),
    };

    crate::error::add_breadcrumb(
        "checkout",
        "Order placed",
        &[("order_number", &detail.order.order_number)],
    );

    let number = detail.order.order_number.clone();
    let email = state.email().clone();
    tokio::spawn(async move {
        if let Err(e) = email.send_order_confirmation(&detail).await {
            tracing::warn!(
                order_number = %detail.order.order_number,
                error = %e,
                "Failed to send order confirmation"
            );
        }
    });

    Ok(Redirect::to(&format!("/checkout/complete/{number}")).into_response())
}

/// Confirmation page after placing an order.
#[instrument(skip(state, session, page))]
pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Path(number): Path<String>,
) -> Result<impl IntoResponse> {
    let detail = visible_order(&state, &session, page.user.as_ref(), &number).await?;

    Ok(CompleteTemplate {
        order: OrderDetailView::new(&detail, state.shop()),
        page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_options_check_submitted_value() {
        let options = payment_options("bank_transfer");
        assert_eq!(options.len(), PaymentMethod::ALL.len());
        assert!(options.iter().any(|o| o.checked && o.value == "bank_transfer"));
        assert_eq!(options.iter().filter(|o| o.checked).count(), 1);

        assert!(payment_options("bogus").iter().all(|o| !o.checked));
    }
}
