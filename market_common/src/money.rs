use std::{
    fmt::Display,
    iter::Sum,
    ops::Add,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The number of minor units (cents) in one major currency unit.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount, held as a whole number of currency minor units (e.g. cents).
///
/// All arithmetic is integer arithmetic. Line totals are computed with [`Money::checked_mul`] and
/// [`Money::checked_add`] so that an overflow surfaces as an error rather than wrapping.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Value cannot be represented as a monetary amount: {0}")]
    InvalidFormat(String),
    #[error("Too many decimal places in {0}. At most 2 are allowed")]
    TooPrecise(String),
    #[error("Monetary calculation overflowed")]
    Overflow,
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value).map(Self).map_err(|_| MoneyError::Overflow)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / MINOR_UNITS_PER_MAJOR as u64;
        let minor = abs % MINOR_UNITS_PER_MAJOR as u64;
        write!(f, "{sign}{major}.{minor:02}")
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    /// Parses a decimal string such as `"10"`, `"10.5"` or `"-3.25"` into minor units. Floating point is never used.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (major, minor) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if major.is_empty() || !all_digits(major) || !all_digits(minor) {
            return Err(MoneyError::InvalidFormat(s.to_string()));
        }
        if minor.len() > 2 {
            return Err(MoneyError::TooPrecise(s.to_string()));
        }
        let major = major.parse::<i64>().map_err(|_| MoneyError::Overflow)?;
        let minor = match minor.len() {
            0 => 0,
            1 => minor.parse::<i64>().map_err(|_| MoneyError::InvalidFormat(s.to_string()))? * 10,
            _ => minor.parse::<i64>().map_err(|_| MoneyError::InvalidFormat(s.to_string()))?,
        };
        let value = major
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|v| v.checked_add(minor))
            .ok_or(MoneyError::Overflow)?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * MINOR_UNITS_PER_MAJOR)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, returning an error on overflow.
    pub fn checked_mul(&self, quantity: i64) -> Result<Self, MoneyError> {
        self.0.checked_mul(quantity).map(Self).ok_or(MoneyError::Overflow)
    }

    pub fn checked_add(&self, other: Money) -> Result<Self, MoneyError> {
        self.0.checked_add(other.0).map(Self).ok_or(MoneyError::Overflow)
    }

    /// Sums an iterator of amounts, returning an error on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(iter: I) -> Result<Self, MoneyError> {
        iter.into_iter().try_fold(Self::default(), |acc, m| acc.checked_add(m))
    }
}
