//! Checkout: form validation and order placement.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;
use validator::Validate;

use shopfront_commerce::db::{OrderError, OrderRepository};
use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::{NewOrder, NewOrderLine, OrderDetail, ShippingAddress};
use shopfront_commerce::validation::{FieldErrors, validate_form};
use shopfront_core::{Email, PaymentMethod};

use crate::models::{CurrentUser, keys};
use crate::services::cart::{Cart, CartError};

/// Order numbers remembered per session for guest access to the order page.
const MAX_REMEMBERED_ORDERS: usize = 20;

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    /// A product sold out or was unpublished since it was added.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Order(OrderError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl From<OrderError> for CheckoutError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Empty => Self::EmptyCart,
            OrderError::ProductUnavailable(_) | OrderError::InsufficientStock { .. } => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Order(other),
        }
    }
}

/// The checkout form as submitted.
///
/// Optional inputs arrive as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CheckoutForm {
    #[validate(
        custom(function = "shopfront_commerce::validation::rules::not_blank"),
        length(max = 120, message = "Use at most 120 characters")
    )]
    pub full_name: String,

    /// Checked by [`Email::parse`] in [`CheckoutForm::validate_details`].
    pub email: String,

    #[validate(custom(function = "shopfront_commerce::validation::rules::optional_phone"))]
    pub phone: String,

    #[validate(
        custom(function = "shopfront_commerce::validation::rules::not_blank"),
        length(max = 200, message = "Use at most 200 characters")
    )]
    pub address_line1: String,

    #[validate(length(max = 200, message = "Use at most 200 characters"))]
    pub address_line2: String,

    #[validate(
        custom(function = "shopfront_commerce::validation::rules::not_blank"),
        length(max = 100, message = "Use at most 100 characters")
    )]
    pub city: String,

    #[validate(custom(function = "shopfront_commerce::validation::rules::postal_code"))]
    pub postal_code: String,

    #[validate(custom(function = "shopfront_commerce::validation::rules::country_code"))]
    pub country: String,

    pub payment_method: String,

    #[validate(length(max = 500, message = "Use at most 500 characters"))]
    pub notes: String,
}

/// A checkout form that passed validation.
#[derive(Debug, Clone)]
pub struct CheckoutDetails {
    pub email: Email,
    pub payment_method: PaymentMethod,
    pub address: ShippingAddress,
    pub notes: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl CheckoutForm {
    /// A blank form, prefilled with the customer's name and email.
    #[must_use]
    pub fn for_customer(user: Option<&CurrentUser>) -> Self {
        Self {
            full_name: user.map(|u| u.full_name.clone()).unwrap_or_default(),
            email: user.map(|u| u.email.as_str().to_string()).unwrap_or_default(),
            payment_method: PaymentMethod::default().as_str().to_string(),
            ..Self::default()
        }
    }

    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the message for each invalid field.
    pub fn validate_details(&self) -> Result<CheckoutDetails, FieldErrors> {
        let mut errors = validate_form(self).err().unwrap_or_default();

        let email = Email::parse(self.email.trim());
        if email.is_err() {
            errors.insert("email", "Enter a valid email address");
        }
        let payment_method = self.payment_method.parse::<PaymentMethod>();
        if payment_method.is_err() {
            errors.insert("payment_method", "Choose a payment method");
        }

        match (email, payment_method) {
            (Ok(email), Ok(payment_method)) if errors.is_empty() => Ok(CheckoutDetails {
                email,
                payment_method,
                address: ShippingAddress {
                    full_name: self.full_name.trim().to_string(),
                    phone: non_empty(&self.phone),
                    line1: self.address_line1.trim().to_string(),
                    line2: non_empty(&self.address_line2),
                    city: self.city.trim().to_string(),
                    postal_code: self.postal_code.trim().to_uppercase(),
                    country: self.country.trim().to_ascii_uppercase(),
                },
                notes: non_empty(&self.notes),
            }),
            _ => Err(errors),
        }
    }
}

/// Place an order for everything in the visitor's cart.
///
/// Empties the cart and remembers the order number in the session so a
/// guest can view the order page.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart`, `CheckoutError::Unavailable` when
/// stock ran out, or a database/session error.
#[tracing::instrument(skip(pool, session, user, shop, details))]
pub async fn place_order(
    pool: &PgPool,
    session: &Session,
    user: Option<&CurrentUser>,
    shop: &ShopConfig,
    details: CheckoutDetails,
) -> Result<OrderDetail, CheckoutError> {
    let cart = Cart::new(pool, session, user.map(|u| u.id));
    let lines = cart.lines().await?;
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let order = NewOrder {
        user_id: user.map(|u| u.id),
        email: details.email,
        payment_method: details.payment_method,
        address: details.address,
        notes: details.notes,
        lines: lines
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .collect(),
    };

    let detail = OrderRepository::new(pool)
        .place(&order, &shop.shipping, shop.tax_rate)
        .await?;

    cart.clear().await?;
    remember_order(session, &detail.order.order_number).await?;

    tracing::info!(
        order_number = %detail.order.order_number,
        total = %detail.order.total,
        guest = user.is_none(),
        "Order placed"
    );
    Ok(detail)
}

async fn remember_order(session: &Session, number: &str) -> Result<(), CheckoutError> {
    let mut numbers = placed_orders(session).await?;
    numbers.retain(|n| n != number);
    numbers.push(number.to_string());
    if numbers.len() > MAX_REMEMBERED_ORDERS {
        numbers.drain(..numbers.len() - MAX_REMEMBERED_ORDERS);
    }
    session.insert(keys::PLACED_ORDERS, numbers).await?;
    Ok(())
}

async fn placed_orders(session: &Session) -> Result<Vec<String>, tower_sessions::session::Error> {
    Ok(session
        .get::<Vec<String>>(keys::PLACED_ORDERS)
        .await?
        .unwrap_or_default())
}

/// Whether this session placed the order.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn placed_in_session(
    session: &Session,
    number: &str,
) -> Result<bool, tower_sessions::session::Error> {
    Ok(placed_orders(session).await?.iter().any(|n| n == number))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{ProductId, UserId};

    use super::*;

    fn valid_form() -> CheckoutForm {
        CheckoutForm {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: String::new(),
            address_line1: "12 Analytical Row".to_string(),
            address_line2: String::new(),
            city: "London".to_string(),
            postal_code: "sw1a 1aa".to_string(),
            country: "gb".to_string(),
            payment_method: "cash_on_delivery".to_string(),
            notes: "  ".to_string(),
        }
    }

    #[test]
    fn test_valid_form_normalizes_fields() {
        let details = valid_form().validate_details().unwrap();
        assert_eq!(details.email.as_str(), "ada@example.com");
        assert_eq!(details.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(details.address.country, "GB");
        assert_eq!(details.address.postal_code, "SW1A 1AA");
        assert_eq!(details.address.phone, None);
        assert_eq!(details.address.line2, None);
        assert_eq!(details.notes, None);
    }

    #[test]
    fn test_errors_are_reported_per_field() {
        let form = CheckoutForm {
            full_name: " ".to_string(),
            email: "not-an-email".to_string(),
            phone: "12".to_string(),
            country: "GBR".to_string(),
            payment_method: "bitcoin".to_string(),
            notes: "x".repeat(501),
            ..valid_form()
        };
        let errors = form.validate_details().unwrap_err();

        for field in ["full_name", "email", "phone", "country", "payment_method", "notes"] {
            assert!(errors.has(field), "expected an error for {field}");
        }
        assert!(!errors.has("city"));
        assert!(!errors.has("postal_code"));
    }

    #[test]
    fn test_email_with_surrounding_spaces_is_accepted() {
        let form = CheckoutForm {
            email: "  Ada@Example.com ".to_string(),
            ..valid_form()
        };
        let details = form.validate_details().unwrap();
        assert_eq!(details.email.as_str(), "ada@example.com");
    }

    #[test]
    fn test_name_length_limit() {
        let form = CheckoutForm {
            full_name: "n".repeat(121),
            ..valid_form()
        };
        assert!(form.validate_details().unwrap_err().has("full_name"));
    }

    #[test]
    fn test_prefill_for_customer() {
        let user = CurrentUser {
            id: UserId::new(4),
            email: Email::parse("grace@example.com").unwrap(),
            full_name: "Grace Hopper".to_string(),
            is_admin: false,
        };
        let form = CheckoutForm::for_customer(Some(&user));
        assert_eq!(form.email, "grace@example.com");
        assert_eq!(form.full_name, "Grace Hopper");
        assert_eq!(form.payment_method, "cash_on_delivery");

        assert!(CheckoutForm::for_customer(None).email.is_empty());
    }

    #[test]
    fn test_stock_errors_become_unavailable() {
        let err = CheckoutError::from(OrderError::ProductUnavailable(ProductId::new(3)));
        assert!(matches!(err, CheckoutError::Unavailable(_)));
        assert!(matches!(
            CheckoutError::from(OrderError::Empty),
            CheckoutError::EmptyCart
        ));
        assert!(matches!(
            CheckoutError::from(OrderError::NotFound),
            CheckoutError::Order(_)
        ));
    }
}
