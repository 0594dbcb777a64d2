//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// The amount is held in the currency's standard unit (rupees, not paise).
/// Use [`Price::minor_units`] when talking to a payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A whole-rupee price.
    #[must_use]
    pub fn inr(rupees: i64) -> Self {
        Self::new(Decimal::from(rupees), CurrencyCode::INR)
    }

    /// Whether this price is zero.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.amount.is_zero()
    }

    /// Amount in the smallest currency unit (e.g. paise), rounded half away
    /// from zero. Returns `None` if the result does not fit in an `i64`.
    #[must_use]
    pub fn minor_units(&self) -> Option<i64> {
        let scaled = self.amount.checked_mul(Decimal::from(100))?;
        scaled.round().to_i64()
    }
}

impl fmt::Display for Price {
    /// `Free` for zero, otherwise the symbol followed by the amount with
    /// trailing zeros removed, e.g. `₹80` or `₹80.5`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_free() {
            return f.write_str("Free");
        }
        write!(f, "{}{}", self.currency_code.symbol(), self.amount.normalize())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
}

impl CurrencyCode {
    /// The three-letter code, as payment gateways expect it.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        assert_eq!(Price::inr(80).minor_units(), Some(8000));
        assert_eq!(Price::inr(900).minor_units(), Some(90_000));
        assert_eq!(Price::inr(0).minor_units(), Some(0));
        assert_eq!(
            Price::new(Decimal::new(8050, 2), CurrencyCode::INR).minor_units(),
            Some(8050)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::inr(0).to_string(), "Free");
        assert_eq!(Price::inr(80).to_string(), "₹80");
        assert_eq!(
            Price::new(Decimal::new(8050, 2), CurrencyCode::INR).to_string(),
            "₹80.5"
        );
    }

    #[test]
    fn test_default_currency_is_inr() {
        assert_eq!(CurrencyCode::default().code(), "INR");
    }
}
