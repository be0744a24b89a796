//! Email service for transactional messages.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain text
//! templates. When SMTP is not configured the service logs each message
//! instead of sending it, so development setups work without a mail server.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use shopfront_core::OrderStatus;

use crate::env::{EmailConfig, ShopConfig};
use crate::models::{OrderDetail, User};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

// =============================================================================
// Templates
// =============================================================================

/// An order line formatted for email.
struct EmailLine {
    name: String,
    quantity: i32,
    unit_price: String,
    line_total: String,
}

/// Shared fields for order emails.
struct OrderSummary {
    order_number: String,
    customer_name: String,
    status: String,
    payment_method: String,
    lines: Vec<EmailLine>,
    subtotal: String,
    shipping: String,
    tax: String,
    total: String,
    address: Vec<String>,
    order_url: String,
}

impl OrderSummary {
    fn new(detail: &OrderDetail, shop: &ShopConfig, base_url: &str) -> Self {
        let order = &detail.order;
        let address = &order.address;
        let mut address_lines = vec![address.full_name.clone(), address.line1.clone()];
        address_lines.extend(address.line2.clone());
        address_lines.push(format!("{} {}", address.postal_code, address.city));
        address_lines.push(address.country.clone());

        Self {
            order_number: order.order_number.clone(),
            customer_name: address.full_name.clone(),
            status: order.status.label().to_string(),
            payment_method: order.payment_method.label().to_string(),
            lines: detail
                .items
                .iter()
                .map(|item| EmailLine {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: shop.format(item.unit_price),
                    line_total: shop.format(item.line_total),
                })
                .collect(),
            subtotal: shop.format(order.subtotal),
            shipping: shop.format(order.shipping),
            tax: shop.format(order.tax),
            total: shop.format(order.total),
            address: address_lines,
            order_url: format!("{base_url}/orders/{}", order.order_number),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    shop_name: &'a str,
    order: &'a OrderSummary,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    shop_name: &'a str,
    order: &'a OrderSummary,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    shop_name: &'a str,
    order: &'a OrderSummary,
    message: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    shop_name: &'a str,
    order: &'a OrderSummary,
    message: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    shop_name: &'a str,
    name: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    shop_name: &'a str,
    name: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    shop_name: &'a str,
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    shop_name: &'a str,
    name: &'a str,
    shop_url: &'a str,
}

/// Sentence describing a status change to the customer.
fn status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "We have received your order.",
        OrderStatus::Processing => "We are preparing your order.",
        OrderStatus::Shipped => "Your order is on its way.",
        OrderStatus::Delivered => "Your order has been delivered. Enjoy!",
        OrderStatus::Cancelled => "Your order has been cancelled.",
    }
}

// =============================================================================
// Service
// =============================================================================

/// A rendered message ready to send.
struct Rendered {
    to: String,
    subject: String,
    text: String,
    html: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    shop: ShopConfig,
    /// Storefront URL used for links (no trailing slash).
    storefront_url: String,
}

impl EmailService {
    /// Create a new email service. Without SMTP configuration messages are
    /// logged instead of sent.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(
        config: Option<&EmailConfig>,
        shop: ShopConfig,
        storefront_url: &str,
    ) -> Result<Self, SmtpError> {
        let storefront_url = storefront_url.trim_end_matches('/').to_string();

        let Some(config) = config else {
            tracing::warn!("SMTP not configured; emails will be logged, not sent");
            return Ok(Self {
                mailer: None,
                from_address: format!("{} <noreply@localhost>", shop.name),
                shop,
                storefront_url,
            });
        };

        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer: Some(mailer),
            from_address: config.from_address.clone(),
            shop,
            storefront_url,
        })
    }

    /// Whether messages are actually delivered.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Send the order confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(&self, detail: &OrderDetail) -> Result<(), EmailError> {
        let order = OrderSummary::new(detail, &self.shop, &self.storefront_url);
        let shop_name = self.shop.name.as_str();
        let rendered = Rendered {
            to: detail.order.email.to_string(),
            subject: format!("{shop_name} order {} confirmed", order.order_number),
            html: OrderConfirmationHtml { shop_name, order: &order }.render()?,
            text: OrderConfirmationText { shop_name, order: &order }.render()?,
        };
        self.deliver(rendered).await
    }

    /// Tell the customer their order moved to a new status.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_status_update(&self, detail: &OrderDetail) -> Result<(), EmailError> {
        let order = OrderSummary::new(detail, &self.shop, &self.storefront_url);
        let shop_name = self.shop.name.as_str();
        let message = status_message(detail.order.status);
        let rendered = Rendered {
            to: detail.order.email.to_string(),
            subject: format!("{shop_name} order {}: {}", order.order_number, order.status),
            html: OrderStatusHtml { shop_name, order: &order, message }.render()?,
            text: OrderStatusText { shop_name, order: &order, message }.render()?,
        };
        self.deliver(rendered).await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(&self, user: &User, token: &str) -> Result<(), EmailError> {
        let reset_url = format!("{}/auth/reset-password?token={token}", self.storefront_url);
        let shop_name = self.shop.name.as_str();
        let name = user.full_name.as_str();
        let rendered = Rendered {
            to: user.email.to_string(),
            subject: format!("Reset your {shop_name} password"),
            html: PasswordResetHtml { shop_name, name, reset_url: &reset_url }.render()?,
            text: PasswordResetText { shop_name, name, reset_url: &reset_url }.render()?,
        };
        self.deliver(rendered).await
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome(&self, user: &User) -> Result<(), EmailError> {
        let shop_name = self.shop.name.as_str();
        let name = user.full_name.as_str();
        let shop_url = self.storefront_url.as_str();
        let rendered = Rendered {
            to: user.email.to_string(),
            subject: format!("Welcome to {shop_name}"),
            html: WelcomeHtml { shop_name, name, shop_url }.render()?,
            text: WelcomeText { shop_name, name, shop_url }.render()?,
        };
        self.deliver(rendered).await
    }

    async fn deliver(&self, message: Rendered) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(
                to = %message.to,
                subject = %message.subject,
                body = %message.text,
                "Email not sent (SMTP not configured)"
            );
            return Ok(());
        };

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(message
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(message.to.clone()))?)
            .subject(&message.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(message.html),
                    ),
            )?;

        mailer.send(email).await?;

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shopfront_core::{Email, OrderId, OrderItemId, PaymentMethod, ProductId};

    use super::*;
    use crate::models::{Order, OrderItem, ShippingAddress};

    fn sample_detail() -> OrderDetail {
        let now = Utc::now();
        OrderDetail {
            order: Order {
                id: OrderId::new(7),
                order_number: "SF-ABCDEFGH23".to_string(),
                user_id: None,
                email: Email::parse("buyer@shop.test").unwrap(),
                status: OrderStatus::Shipped,
                payment_method: PaymentMethod::BankTransfer,
                address: ShippingAddress {
                    full_name: "Grace Hopper".to_string(),
                    phone: None,
                    line1: "1 Harbor Way".to_string(),
                    line2: Some("Unit 4".to_string()),
                    city: "Arlington".to_string(),
                    postal_code: "22201".to_string(),
                    country: "US".to_string(),
                },
                notes: None,
                subtotal: Decimal::new(2000, 2),
                shipping: Decimal::new(500, 2),
                tax: Decimal::ZERO,
                total: Decimal::new(2500, 2),
                created_at: now,
                updated_at: now,
            },
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(7),
                product_id: Some(ProductId::new(3)),
                product_name: "Tea <Pot>".to_string(),
                unit_price: Decimal::new(1000, 2),
                quantity: 2,
                line_total: Decimal::new(2000, 2),
            }],
        }
    }

    #[test]
    fn test_order_summary_formats_amounts_and_address() {
        let summary = OrderSummary::new(&sample_detail(), &ShopConfig::default(), "https://shop.test");
        assert_eq!(summary.total, "$25.00");
        assert_eq!(summary.lines.first().map(|l| l.line_total.as_str()), Some("$20.00"));
        assert_eq!(summary.address.len(), 5);
        assert_eq!(summary.order_url, "https://shop.test/orders/SF-ABCDEFGH23");
    }

    #[test]
    fn test_confirmation_templates_render() {
        let summary = OrderSummary::new(&sample_detail(), &ShopConfig::default(), "https://shop.test");
        let html = OrderConfirmationHtml { shop_name: "Shopfront", order: &summary }
            .render()
            .unwrap();
        let text = OrderConfirmationText { shop_name: "Shopfront", order: &summary }
            .render()
            .unwrap();

        assert!(html.contains("SF-ABCDEFGH23"));
        assert!(html.contains("Tea &#60;Pot&#62;") || html.contains("Tea &lt;Pot&gt;"));
        assert!(text.contains("Tea <Pot>"));
        assert!(text.contains("$25.00"));
    }

    #[test]
    fn test_status_message_for_every_status() {
        for status in OrderStatus::ALL {
            assert!(!status_message(status).is_empty());
        }
    }

    #[tokio::test]
    async fn test_unconfigured_service_logs_instead_of_sending() {
        let service =
            EmailService::new(None, ShopConfig::default(), "http://localhost:3000/").unwrap();
        assert!(!service.is_enabled());
        assert!(service.send_order_confirmation(&sample_detail()).await.is_ok());
    }
}
