use crate::error::InputError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A non-negative monetary value in the smallest currency unit.
///
/// QRIS amounts carry no fractional part, so the value is a plain integer and
/// all cart arithmetic on it is exact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Rounds a decimal to the nearest whole unit, halves away from zero.
    pub fn from_decimal(value: Decimal) -> Result<Self, InputError> {
        if value < Decimal::ZERO {
            return Err(InputError::NegativeAmount);
        }
        value
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .map(Self)
            .ok_or(InputError::Overflow)
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, InputError> {
        self.0.checked_add(rhs.0).map(Self).ok_or(InputError::Overflow)
    }

    pub fn checked_mul(self, quantity: u32) -> Result<Self, InputError> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Self)
            .ok_or(InputError::Overflow)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        Decimal::from(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str(s.trim()).map_err(|_| InputError::InvalidNumber(s.to_owned()))?;
        Self::from_decimal(value)
    }
}

/// Platform fee as a percentage of the subtotal, e.g. `0.5` for half a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeePercent(Decimal);

impl FeePercent {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, InputError> {
        if value < Decimal::ZERO {
            Err(InputError::NegativeFee)
        } else {
            Ok(Self(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `round(subtotal × percent / 100)`, computed in decimal so no binary
    /// floating point error can creep in.
    pub fn fee_for(&self, subtotal: Amount) -> Result<Amount, InputError> {
        let fee = Decimal::from(subtotal)
            .checked_mul(self.0)
            .and_then(|v| v.checked_div(dec!(100)))
            .ok_or(InputError::Overflow)?;
        Amount::from_decimal(fee)
    }
}

impl fmt::Display for FeePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for FeePercent {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str(s.trim()).map_err(|_| InputError::InvalidNumber(s.to_owned()))?;
        Self::new(value)
    }
}
