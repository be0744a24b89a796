//! Shopping carts.
//!
//! Guests keep their cart in the session as a [`GuestCart`]. Signed-in users
//! have a persistent cart in `cart_items`; the guest cart is merged into it
//! when they log in or register. [`Cart`] hides the difference from handlers.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;

use shopfront_commerce::db::carts::MAX_LINE_QUANTITY;
use shopfront_commerce::db::{CartRepository, ProductRepository, RepositoryError};
use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::models::CartLine;
use shopfront_core::{OrderTotals, ProductId, UserId};

use crate::models::keys;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity outside `1..=99`.
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    /// The product does not exist or is not published.
    #[error("this product is no longer available")]
    ProductUnavailable,

    /// Not enough stock for the requested quantity.
    #[error("only {available} left in stock")]
    InsufficientStock { available: u32 },

    /// Repository/database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Session store error.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// One line of a guest cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Cart kept in the session for visitors who are not signed in.
///
/// Each product appears at most once; lines keep the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCart {
    lines: Vec<GuestLine>,
}

impl GuestCart {
    /// Quantity of a product in the cart (0 when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map_or(0, |line| line.quantity)
    }

    /// Add units of a product, capped at [`MAX_LINE_QUANTITY`]. Returns the
    /// new line quantity.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) -> u32 {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY);
            return line.quantity;
        }
        let quantity = quantity.min(MAX_LINE_QUANTITY);
        self.lines.push(GuestLine {
            product_id,
            quantity,
        });
        quantity
    }

    /// Set a line's quantity. Zero removes the line.
    pub fn set(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        let quantity = quantity.min(MAX_LINE_QUANTITY);
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = quantity,
            None => self.lines.push(GuestLine {
                product_id,
                quantity,
            }),
        }
    }

    /// Remove a product.
    pub fn remove(&mut self, product_id: ProductId) {
        self.lines.retain(|line| line.product_id != product_id);
    }

    /// Drop lines whose products are not in `keep`.
    pub fn retain_products(&mut self, keep: &[ProductId]) {
        self.lines.retain(|line| keep.contains(&line.product_id));
    }

    /// Total units.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Product IDs in cart order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|line| line.product_id).collect()
    }

    /// Lines as `(product, quantity)` pairs.
    #[must_use]
    pub fn pairs(&self) -> Vec<(ProductId, u32)> {
        self.lines
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect()
    }
}

/// Read the guest cart from the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_guest_cart(session: &Session) -> Result<GuestCart, CartError> {
    Ok(session
        .get::<GuestCart>(keys::GUEST_CART)
        .await?
        .unwrap_or_default())
}

async fn save_guest_cart(session: &Session, cart: &GuestCart) -> Result<(), CartError> {
    if cart.is_empty() {
        session.remove::<GuestCart>(keys::GUEST_CART).await?;
    } else {
        session.insert(keys::GUEST_CART, cart).await?;
    }
    Ok(())
}

/// Move the session cart into a user's persistent cart.
///
/// Called after login and registration.
///
/// # Errors
///
/// Returns an error if the merge or the session update fails.
pub async fn merge_guest_cart(
    pool: &PgPool,
    session: &Session,
    user_id: UserId,
) -> Result<(), CartError> {
    let guest = load_guest_cart(session).await?;
    if guest.is_empty() {
        return Ok(());
    }

    CartRepository::new(pool).merge(user_id, &guest.pairs()).await?;
    session.remove::<GuestCart>(keys::GUEST_CART).await?;
    tracing::info!(user_id = %user_id, lines = guest.pairs().len(), "Guest cart merged");
    Ok(())
}

/// Validate a requested line quantity.
///
/// # Errors
///
/// Returns `CartError::InvalidQuantity` outside `1..=99`.
pub const fn validate_quantity(quantity: u32) -> Result<u32, CartError> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity);
    }
    Ok(quantity)
}

/// Subtotal, shipping, tax and total for cart lines.
#[must_use]
pub fn totals(lines: &[CartLine], shop: &ShopConfig) -> OrderTotals {
    OrderTotals::compute(
        lines.iter().map(|line| (line.unit_price, line.quantity)),
        &shop.shipping,
        shop.tax_rate,
    )
}

/// Stock as an unsigned quantity.
fn available(stock: i32) -> u32 {
    u32::try_from(stock).unwrap_or(0)
}

/// The current visitor's cart.
pub struct Cart<'a> {
    pool: &'a PgPool,
    session: &'a Session,
    user_id: Option<UserId>,
}

impl<'a> Cart<'a> {
    /// Cart for a signed-in user (`Some`) or a guest (`None`).
    #[must_use]
    pub const fn new(pool: &'a PgPool, session: &'a Session, user_id: Option<UserId>) -> Self {
        Self {
            pool,
            session,
            user_id,
        }
    }

    /// Cart lines with current product data. Unpublished and deleted
    /// products are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or session store fails.
    pub async fn lines(&self) -> Result<Vec<CartLine>, CartError> {
        if let Some(user_id) = self.user_id {
            return Ok(CartRepository::new(self.pool).list(user_id).await?);
        }

        let mut guest = load_guest_cart(self.session).await?;
        if guest.is_empty() {
            return Ok(Vec::new());
        }

        let products = ProductRepository::new(self.pool)
            .get_published_many(&guest.product_ids())
            .await?;

        let lines: Vec<CartLine> = guest
            .pairs()
            .into_iter()
            .filter_map(|(product_id, quantity)| {
                products
                    .iter()
                    .find(|p| p.id == product_id)
                    .map(|p| CartLine {
                        product_id,
                        name: p.name.clone(),
                        slug: p.slug.clone(),
                        image_url: p.image_url.clone(),
                        unit_price: p.price,
                        quantity,
                        stock: p.stock,
                    })
            })
            .collect();

        // Forget products that disappeared from the catalog.
        if lines.len() != guest.pairs().len() {
            let keep: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
            guest.retain_products(&keep);
            save_guest_cart(self.session, &guest).await?;
        }

        Ok(lines)
    }

    async fn quantity_of(&self, product_id: ProductId) -> Result<u32, CartError> {
        match self.user_id {
            Some(user_id) => Ok(CartRepository::new(self.pool)
                .quantity_of(user_id, product_id)
                .await?),
            None => Ok(load_guest_cart(self.session).await?.quantity_of(product_id)),
        }
    }

    /// Stock of a published product.
    async fn stock_of(&self, product_id: ProductId) -> Result<u32, CartError> {
        let product = ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .filter(|p| p.is_published)
            .ok_or(CartError::ProductUnavailable)?;
        Ok(available(product.stock))
    }

    /// Add units of a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity`, `CartError::ProductUnavailable`
    /// or `CartError::InsufficientStock` when the line would exceed stock.
    pub async fn add(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        let quantity = validate_quantity(quantity)?;
        let stock = self.stock_of(product_id).await?;
        let in_cart = self.quantity_of(product_id).await?;
        if in_cart.saturating_add(quantity) > stock {
            return Err(CartError::InsufficientStock { available: stock });
        }

        match self.user_id {
            Some(user_id) => {
                CartRepository::new(self.pool)
                    .add(user_id, product_id, quantity)
                    .await?;
            }
            None => {
                let mut guest = load_guest_cart(self.session).await?;
                guest.add(product_id, quantity);
                save_guest_cart(self.session, &guest).await?;
            }
        }

        tracing::debug!(product_id = %product_id, quantity, "Added to cart");
        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` above the line limit and
    /// `CartError::InsufficientStock` above the available stock.
    pub async fn update(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product_id).await;
        }
        let quantity = validate_quantity(quantity)?;
        let stock = self.stock_of(product_id).await?;
        if quantity > stock {
            return Err(CartError::InsufficientStock { available: stock });
        }

        match self.user_id {
            Some(user_id) => {
                CartRepository::new(self.pool)
                    .set_quantity(user_id, product_id, quantity)
                    .await?;
            }
            None => {
                let mut guest = load_guest_cart(self.session).await?;
                guest.set(product_id, quantity);
                save_guest_cart(self.session, &guest).await?;
            }
        }
        Ok(())
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or session store fails.
    pub async fn remove(&self, product_id: ProductId) -> Result<(), CartError> {
        match self.user_id {
            Some(user_id) => {
                CartRepository::new(self.pool)
                    .remove(user_id, product_id)
                    .await?;
            }
            None => {
                let mut guest = load_guest_cart(self.session).await?;
                guest.remove(product_id);
                save_guest_cart(self.session, &guest).await?;
            }
        }
        Ok(())
    }

    /// Total units in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or session store fails.
    pub async fn count(&self) -> Result<u32, CartError> {
        match self.user_id {
            Some(user_id) => Ok(CartRepository::new(self.pool).count(user_id).await?),
            None => Ok(load_guest_cart(self.session).await?.count()),
        }
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or session store fails.
    pub async fn clear(&self) -> Result<(), CartError> {
        match self.user_id {
            Some(user_id) => CartRepository::new(self.pool).clear(user_id).await?,
            None => {
                self.session.remove::<GuestCart>(keys::GUEST_CART).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(n: i32) -> ProductId {
        ProductId::new(n)
    }

    #[test]
    fn test_add_merges_lines() {
        let mut cart = GuestCart::default();
        assert_eq!(cart.add(id(1), 2), 2);
        assert_eq!(cart.add(id(2), 1), 1);
        assert_eq!(cart.add(id(1), 3), 5);

        assert_eq!(cart.pairs(), vec![(id(1), 5), (id(2), 1)]);
        assert_eq!(cart.count(), 6);
    }

    #[test]
    fn test_add_caps_quantity() {
        let mut cart = GuestCart::default();
        cart.add(id(1), 90);
        assert_eq!(cart.add(id(1), 20), MAX_LINE_QUANTITY);
        assert_eq!(cart.add(id(2), 500), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_set_zero_removes() {
        let mut cart = GuestCart::default();
        cart.add(id(1), 2);
        cart.set(id(1), 4);
        assert_eq!(cart.quantity_of(id(1)), 4);

        cart.set(id(1), 0);
        assert!(cart.is_empty());
        assert_eq!(cart.quantity_of(id(1)), 0);
    }

    #[test]
    fn test_retain_products() {
        let mut cart = GuestCart::default();
        cart.add(id(1), 1);
        cart.add(id(2), 1);
        cart.add(id(3), 1);
        cart.retain_products(&[id(1), id(3)]);
        assert_eq!(cart.product_ids(), vec![id(1), id(3)]);
    }

    #[test]
    fn test_validate_quantity() {
        assert!(matches!(validate_quantity(0), Err(CartError::InvalidQuantity)));
        assert!(matches!(validate_quantity(100), Err(CartError::InvalidQuantity)));
        assert_eq!(validate_quantity(1).unwrap(), 1);
        assert_eq!(validate_quantity(99).unwrap(), 99);
    }

    #[test]
    fn test_guest_cart_session_encoding() {
        let mut cart = GuestCart::default();
        cart.add(id(7), 3);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "lines": [{ "product_id": 7, "quantity": 3 }] })
        );
        let back: GuestCart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn test_available_clamps_negative_stock() {
        assert_eq!(available(-3), 0);
        assert_eq!(available(12), 12);
    }

    #[test]
    fn test_totals_use_shop_shipping_and_tax() {
        use rust_decimal::Decimal;
        use shopfront_core::{ShippingPolicy, Slug, TaxRate};

        let line = CartLine {
            product_id: id(1),
            name: "Mug".to_string(),
            slug: Slug::parse("mug").unwrap(),
            image_url: None,
            unit_price: Decimal::new(1250, 2),
            quantity: 2,
            stock: 10,
        };
        let shop = ShopConfig {
            shipping: ShippingPolicy::new(Decimal::new(500, 2), None).unwrap(),
            tax_rate: TaxRate::from_percent(Decimal::new(10, 0)).unwrap(),
            ..ShopConfig::default()
        };

        let totals = totals(&[line], &shop);
        assert_eq!(totals.subtotal, Decimal::new(2500, 2));
        assert_eq!(totals.shipping, Decimal::new(500, 2));
        assert_eq!(totals.tax, Decimal::new(250, 2));
        assert_eq!(totals.total, Decimal::new(3250, 2));
        assert_eq!(totals.item_count, 2);
    }
}
