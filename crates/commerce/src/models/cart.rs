//! Cart domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{ProductId, Slug};

/// A cart line joined with the product data needed to render and price it.
///
/// Used for both persistent carts (signed-in users) and session carts
/// (guests); the storefront resolves guest lines against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Units currently in stock.
    pub stock: i32,
}

impl CartLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Whether the requested quantity is still available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        i64::from(self.stock) >= i64::from(self.quantity)
    }
}
