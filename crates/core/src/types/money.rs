//! Type-safe money representation using decimal arithmetic.
//!
//! All prices in Threadline are stored as [`Decimal`] in the currency's
//! standard unit (dollars, not cents). Totals are rounded to two decimal
//! places with midpoint-away-from-zero rounding, matching what
//! a customer sees on a receipt.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Largest difference tolerated between a client-computed total and the
/// server-computed one.
pub const ROUNDING_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// An amount with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Round to two decimal places (half away from zero).
    #[must_use]
    pub fn round(self) -> Self {
        Self::new(round_amount(self.amount), self.currency_code)
    }

    /// Whether two amounts agree within [`ROUNDING_TOLERANCE`].
    ///
    /// Amounts in different currencies never agree.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.currency_code == other.currency_code
            && approx_eq(self.amount, other.amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            round_amount(self.amount)
        )
    }
}

/// Round a bare amount to two decimal places.
#[must_use]
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether two bare amounts agree within [`ROUNDING_TOLERANCE`].
#[must_use]
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= ROUNDING_TOLERANCE
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
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// The three-letter code.
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

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_tolerance_is_one_cent() {
        assert_eq!(ROUNDING_TOLERANCE, dec("0.01"));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let m = Money::new(dec("10.005"), CurrencyCode::USD).round();
        assert_eq!(m.amount, dec("10.01"));
        let m = Money::new(dec("10.004"), CurrencyCode::USD).round();
        assert_eq!(m.amount, dec("10.00"));
    }

    #[test]
    fn test_approx_eq_within_a_cent() {
        let a = Money::new(dec("59.97"), CurrencyCode::USD);
        assert!(a.approx_eq(&Money::new(dec("59.98"), CurrencyCode::USD)));
        assert!(a.approx_eq(&Money::new(dec("59.96"), CurrencyCode::USD)));
        assert!(!a.approx_eq(&Money::new(dec("59.99"), CurrencyCode::USD)));
    }

    #[test]
    fn test_approx_eq_requires_same_currency() {
        let a = Money::new(dec("1.00"), CurrencyCode::USD);
        let b = Money::new(dec("1.00"), CurrencyCode::EUR);
        assert!(!a.approx_eq(&b));
    }

    #[test]
    fn test_display() {
        let m = Money::new(dec("19.9"), CurrencyCode::GBP);
        assert_eq!(m.to_string(), "£19.90");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!(CurrencyCode::from_str(" eur").unwrap(), CurrencyCode::EUR);
        assert!(CurrencyCode::from_str("XYZ").is_err());
    }
}
