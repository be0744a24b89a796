//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are stored in the currency's standard unit (dollars, not cents)
//! with two decimal places. A store sells in a single currency, so the
//! database only persists the amount; the currency comes from configuration.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a price or currency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number")]
    NotANumber,
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("price cannot have more than two decimal places")]
    TooPrecise,
    /// The currency code is not supported.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Create a price from an amount in cents.
    ///
    /// # Example
    ///
    /// ```
    /// use shopfront_core::{CurrencyCode, Price};
    ///
    /// let price = Price::from_cents(1999, CurrencyCode::USD);
    /// assert_eq!(price.display(), "$19.99");
    /// ```
    #[must_use]
    pub fn from_cents(cents: i64, currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(cents, 2),
            currency,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Parse a user-supplied amount such as `"19.99"` or `"$19.99"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a number, is negative, or has
    /// more than two decimal places.
    pub fn parse(input: &str, currency: CurrencyCode) -> Result<Self, PriceError> {
        let trimmed = input.trim().trim_start_matches(currency.symbol()).trim();
        let amount = Decimal::from_str(trimmed).map_err(|_| PriceError::NotANumber)?;

        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }

        Ok(Self {
            amount: amount.round_dp(2),
            currency,
        })
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        format!("{}{:.2}", self.currency.symbol(), rounded)
    }

    /// The price of `quantity` units.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self {
            amount: self.amount * Decimal::from(quantity),
            currency: self.currency,
        }
    }

    /// Add two prices of the same currency.
    ///
    /// Returns `None` on currency mismatch or overflow.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if self.currency != other.currency {
            return None;
        }
        Some(Self {
            amount: self.amount.checked_add(other.amount)?,
            currency: self.currency,
        })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// The display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// The three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            other => Err(PriceError::UnsupportedCurrency(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(1999, CurrencyCode::USD).display(), "$19.99");
        assert_eq!(Price::from_cents(500, CurrencyCode::EUR).display(), "€5.00");
        assert_eq!(Price::zero(CurrencyCode::GBP).to_string(), "£0.00");
    }

    #[test]
    fn test_parse_accepts_symbol_and_whitespace() {
        let price = Price::parse(" $12.50 ", CurrencyCode::USD).unwrap();
        assert_eq!(price.amount, Decimal::new(1250, 2));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(
            Price::parse("-1.00", CurrencyCode::USD),
            Err(PriceError::Negative)
        );
    }

    #[test]
    fn test_parse_rejects_garbage_and_precision() {
        assert_eq!(
            Price::parse("abc", CurrencyCode::USD),
            Err(PriceError::NotANumber)
        );
        assert_eq!(
            Price::parse("1.999", CurrencyCode::USD),
            Err(PriceError::TooPrecise)
        );
        assert!(Price::parse("1.500", CurrencyCode::USD).is_ok());
    }

    #[test]
    fn test_times_and_add() {
        let unit = Price::from_cents(250, CurrencyCode::USD);
        let line = unit.times(3);
        assert_eq!(line.amount, Decimal::new(750, 2));

        let total = line.checked_add(&unit).unwrap();
        assert_eq!(total.display(), "$10.00");

        let euros = Price::from_cents(100, CurrencyCode::EUR);
        assert!(unit.checked_add(&euros).is_none());
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!("GBP".parse::<CurrencyCode>().unwrap(), CurrencyCode::GBP);
        assert!(matches!(
            "XYZ".parse::<CurrencyCode>(),
            Err(PriceError::UnsupportedCurrency(_))
        ));
    }
}
