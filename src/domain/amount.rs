//! Ledger amounts in the smallest native unit.
//!
//! Amounts travel as decimal strings so that 128-bit values survive JSON clients that
//! parse numbers as doubles. Ether-denominated inputs are converted with rust_decimal.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits of one whole native unit.
pub const NATIVE_DECIMALS: u32 = 18;

/// Unsigned amount in the ledger's smallest unit (wei for the native ledger).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("amount has more than 18 fractional digits: {0}")]
    TooPrecise(String),
    #[error("amount out of range: {0}")]
    Overflow(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(value: u128) -> Self {
        Amount(value)
    }

    pub fn get(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// Convert a whole-unit decimal string (e.g. `"0.25"` ether) into the smallest unit.
    ///
    /// The conversion is exact; inputs that cannot be represented without rounding are rejected.
    pub fn from_ether_str(s: &str) -> Result<Self, AmountParseError> {
        let value = RustDecimal::from_str(s.trim())
            .map_err(|e| AmountParseError::Invalid(format!("{}: {}", s, e)))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountParseError::Negative(s.to_string()));
        }
        if value.normalize().scale() > NATIVE_DECIMALS {
            return Err(AmountParseError::TooPrecise(s.to_string()));
        }
        let scaled = value
            .checked_mul(RustDecimal::from(10u64.pow(NATIVE_DECIMALS)))
            .ok_or_else(|| AmountParseError::Overflow(s.to_string()))?;
        scaled
            .to_u128()
            .map(Amount)
            .ok_or_else(|| AmountParseError::Overflow(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|e| AmountParseError::Invalid(format!("{}: {}", s, e)))
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.0.to_string()
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}
