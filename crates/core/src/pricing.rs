//! Order totals: subtotal, shipping and tax.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors from pricing configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// The tax rate is not a number between 0 and 100.
    #[error("tax rate must be a percentage between 0 and 100")]
    InvalidTaxRate,
    /// A shipping amount is negative.
    #[error("shipping amounts cannot be negative")]
    NegativeShipping,
}

/// Flat-rate shipping with an optional free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Charged for any non-empty order below the threshold.
    pub flat_rate: Decimal,
    /// Orders with a subtotal at or above this ship free.
    pub free_over: Option<Decimal>,
}

impl ShippingPolicy {
    /// Create a shipping policy.
    ///
    /// # Errors
    ///
    /// Returns an error if either amount is negative.
    pub fn new(flat_rate: Decimal, free_over: Option<Decimal>) -> Result<Self, PricingError> {
        if flat_rate.is_sign_negative() || free_over.is_some_and(|f| f.is_sign_negative()) {
            return Err(PricingError::NegativeShipping);
        }
        Ok(Self {
            flat_rate,
            free_over,
        })
    }

    /// No shipping charge at all.
    #[must_use]
    pub const fn free() -> Self {
        Self {
            flat_rate: Decimal::ZERO,
            free_over: None,
        }
    }

    /// Shipping for a cart with the given subtotal and item count.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal, item_count: u32) -> Decimal {
        if item_count == 0 {
            return Decimal::ZERO;
        }
        match self.free_over {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.flat_rate,
        }
    }
}

/// A tax rate expressed as a percentage (e.g. `8.25`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Zero tax.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a tax rate from a percentage.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 <= percent <= 100`.
    pub fn from_percent(percent: Decimal) -> Result<Self, PricingError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(PricingError::InvalidTaxRate);
        }
        Ok(Self(percent))
    }

    /// The rate as a percentage.
    #[must_use]
    pub const fn percent(self) -> Decimal {
        self.0
    }

    /// Tax owed on `amount`, rounded half-even to cents.
    #[must_use]
    pub fn apply(self, amount: Decimal) -> Decimal {
        (amount * self.0 / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
    }
}

impl TryFrom<Decimal> for TaxRate {
    type Error = PricingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_percent(value)
    }
}

impl From<TaxRate> for Decimal {
    fn from(rate: TaxRate) -> Self {
        rate.0
    }
}

impl FromStr for TaxRate {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let percent = Decimal::from_str(s.trim().trim_end_matches('%'))
            .map_err(|_| PricingError::InvalidTaxRate)?;
        Self::from_percent(percent)
    }
}

/// Computed totals for a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of unit price times quantity.
    pub subtotal: Decimal,
    /// Shipping charge.
    pub shipping: Decimal,
    /// Tax on the subtotal.
    pub tax: Decimal,
    /// `subtotal + shipping + tax`.
    pub total: Decimal,
    /// Number of units across all lines.
    pub item_count: u32,
}

impl OrderTotals {
    /// Compute totals for `(unit_price, quantity)` lines.
    ///
    /// ```
    /// use rust_decimal::Decimal;
    /// use shopfront_core::{OrderTotals, ShippingPolicy, TaxRate};
    ///
    /// let shipping = ShippingPolicy::new(Decimal::new(500, 2), None).unwrap();
    /// let tax = TaxRate::from_percent(Decimal::new(10, 0)).unwrap();
    /// let totals = OrderTotals::compute([(Decimal::new(1000, 2), 2)], &shipping, tax);
    ///
    /// assert_eq!(totals.subtotal, Decimal::new(2000, 2));
    /// assert_eq!(totals.total, Decimal::new(2700, 2));
    /// ```
    #[must_use]
    pub fn compute(
        lines: impl IntoIterator<Item = (Decimal, u32)>,
        shipping: &ShippingPolicy,
        tax: TaxRate,
    ) -> Self {
        let (subtotal, item_count) = lines
            .into_iter()
            .fold((Decimal::ZERO, 0_u32), |(sum, count), (unit, qty)| {
                (sum + unit * Decimal::from(qty), count.saturating_add(qty))
            });
        let shipping = shipping.shipping_for(subtotal, item_count);
        let tax = tax.apply(subtotal);

        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
            item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_empty_cart_is_free() {
        let shipping = ShippingPolicy::new(dec(599), None).unwrap();
        let totals = OrderTotals::compute([], &shipping, TaxRate::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.item_count, 0);
    }

    #[test]
    fn test_free_shipping_threshold() {
        let shipping = ShippingPolicy::new(dec(599), Some(dec(5000))).unwrap();
        assert_eq!(shipping.shipping_for(dec(4999), 1), dec(599));
        assert_eq!(shipping.shipping_for(dec(5000), 1), Decimal::ZERO);
    }

    #[test]
    fn test_tax_rounds_half_even() {
        let rate = TaxRate::from_percent(Decimal::new(5, 0)).unwrap();
        // 0.25 * 5% = 0.0125 -> 0.01
        assert_eq!(rate.apply(dec(25)), dec(1));
        // 0.70 * 5% = 0.035 -> 0.04
        assert_eq!(rate.apply(dec(70)), dec(4));
    }

    #[test]
    fn test_compute_lines() {
        let shipping = ShippingPolicy::new(dec(500), Some(dec(10_000))).unwrap();
        let rate: TaxRate = "8.25%".parse().unwrap();
        let totals = OrderTotals::compute([(dec(1999), 2), (dec(350), 1)], &shipping, rate);

        assert_eq!(totals.subtotal, dec(4348));
        assert_eq!(totals.shipping, dec(500));
        assert_eq!(totals.tax, dec(359));
        assert_eq!(totals.total, dec(5207));
        assert_eq!(totals.item_count, 3);
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            TaxRate::from_percent(Decimal::new(101, 0)),
            Err(PricingError::InvalidTaxRate)
        );
        assert!("abc".parse::<TaxRate>().is_err());
        assert_eq!(
            ShippingPolicy::new(dec(-1), None),
            Err(PricingError::NegativeShipping)
        );
    }
}
