//! Monetary amounts in minor units.

use serde::{Deserialize, Serialize};

use crate::error::{DomainResult, ProcurementError};
use crate::value_object::ValueObject;

/// Amount in the smallest currency unit (e.g. cents).
///
/// Signed so ledger deltas and adjustment entries can be expressed, but the
/// validation boundary rejects negative amounts wherever the domain requires
/// a magnitude (prices, reservations, payments).
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| ProcurementError::validation("monetary overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| ProcurementError::validation("monetary overflow"))
    }

    /// Multiply by a quantity (line totals, stock valuation).
    pub fn checked_mul(self, qty: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(qty)
            .map(Money)
            .ok_or_else(|| ProcurementError::validation("monetary overflow"))
    }

    /// Rounded division, used to derive a weighted-average unit cost from an
    /// authoritative total value.
    pub fn div_round(self, divisor: i64) -> DomainResult<Money> {
        if divisor == 0 {
            return Err(ProcurementError::validation("division by zero"));
        }
        // Round half away from zero.
        let d = self.0 as i128;
        let q = divisor as i128;
        let rounded = (d + q.signum() * d.signum() * q.abs() / 2) / q;
        Ok(Money(rounded as i64))
    }

    /// Absolute difference between two amounts.
    pub fn abs_diff(self, other: Money) -> Money {
        Money((self.0 - other.0).abs())
    }
}

impl ValueObject for Money {}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let whole = self.0 / 100;
        let frac = (self.0 % 100).abs();
        write!(f, "{whole}.{frac:02}")
    }
}

impl core::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl core::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplication() {
        let unit = Money::from_minor(12_50);
        assert_eq!(unit.checked_mul(4).unwrap(), Money::from_minor(50_00));
    }

    #[test]
    fn rounded_division_derives_average() {
        // 1650.00 over 15 units -> 110.00 exactly.
        let total = Money::from_minor(165_000);
        assert_eq!(total.div_round(15).unwrap(), Money::from_minor(11_000));
        // 100 over 3 -> 33 remainder 1, rounds to 33.
        assert_eq!(Money::from_minor(100).div_round(3).unwrap(), Money::from_minor(33));
        // 200 over 3 -> 66.67 rounds to 67.
        assert_eq!(Money::from_minor(200).div_round(3).unwrap(), Money::from_minor(67));
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)).is_err());
    }

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from_minor(123_456).to_string(), "1234.56");
    }
}
