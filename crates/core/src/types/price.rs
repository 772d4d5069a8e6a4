//! Currency codes and minor-unit conversion.
//!
//! Amounts are carried as [`Decimal`] in the currency's standard unit
//! (e.g. riel, dollars). Payment providers want integer minor units, which
//! the shop computes as `amount × 100` for every supported currency.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Multiplier from standard units to minor units.
const MINOR_UNITS_PER_UNIT: i64 = 100;

/// Convert a standard-unit amount into provider minor units.
///
/// The result is rounded half away from zero (banker's rounding is not used
/// so that `0.005` becomes `1`). Returns `None` if the amount does not fit in
/// an `i64`.
///
/// ```
/// use rust_decimal::Decimal;
/// use sdach_core::to_minor_units;
///
/// assert_eq!(to_minor_units(Decimal::new(1000, 0)), Some(100_000));
/// assert_eq!(to_minor_units(Decimal::new(1999, 2)), Some(1999));
/// ```
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::from(MINOR_UNITS_PER_UNIT))?
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Error returned when a currency code is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency code: {0}")]
pub struct CurrencyCodeError(pub String);

/// ISO 4217 currency codes accepted by the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum CurrencyCode {
    /// Cambodian riel.
    #[default]
    KHR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Upper-case ISO code, as stored on orders.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KHR => "KHR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Lower-case ISO code, as expected by Stripe.
    #[must_use]
    pub const fn as_lowercase(self) -> &'static str {
        match self {
            Self::KHR => "khr",
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::KHR => "៛",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Format an amount for display, e.g. `៛7000.00`.
    #[must_use]
    pub fn format(self, amount: Decimal) -> String {
        format!("{}{:.2}", self.symbol(), amount)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KHR" => Ok(Self::KHR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(CurrencyCodeError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_owned()
    }
}
