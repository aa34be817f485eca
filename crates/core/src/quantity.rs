//! Inventory quantities.

use core::ops::{Neg, Sub};
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A decimal quantity of product units.
///
/// The same type carries signed movement deltas and stored stock levels; the
/// sign rules live with the operations that produce them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// A strictly positive magnitude (movement sizes, transfer quantities).
    pub fn positive(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity must be greater than 0 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_add(self, other: Quantity) -> DomainResult<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| DomainError::validation("quantity overflow"))
    }

    /// Total of many quantities; fails instead of wrapping when the sum leaves
    /// the decimal range (each stored entry is in range, their sum may not be).
    pub fn checked_sum<I>(quantities: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Quantity>,
    {
        quantities
            .into_iter()
            .try_fold(Self::ZERO, |acc, q| acc.checked_add(q))
    }

    /// Clamp to zero from below.
    pub fn floor_zero(self) -> Self {
        if self.is_negative() { Self::ZERO } else { self }
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::validation(format!("invalid quantity '{s}': {e}")))
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn positive_rejects_zero_and_negative() {
        assert!(Quantity::positive(Decimal::ZERO).is_err());
        assert!(Quantity::positive(Decimal::from(-3)).is_err());
        assert_eq!(Quantity::positive(Decimal::from(3)).unwrap(), Quantity::from(3));
    }

    #[test]
    fn display_is_normalized() {
        let q: Quantity = "12.500".parse().unwrap();
        assert_eq!(q.to_string(), "12.5");
    }

    #[test]
    fn floor_zero_clamps_negative_values() {
        assert_eq!(Quantity::from(-4).floor_zero(), Quantity::ZERO);
        assert_eq!(Quantity::from(4).floor_zero(), Quantity::from(4));
    }

    #[test]
    fn decimal_equality_ignores_scale() {
        let a: Quantity = "70.0".parse().unwrap();
        assert_eq!(a, Quantity::from(70));
    }

    #[test]
    fn checked_sum_reports_overflow() {
        let half_max: Quantity = "50000000000000000000000000000".parse().unwrap();
        assert!(half_max.checked_add(half_max).is_err());
        let err = Quantity::checked_sum([half_max, Quantity::from(1), half_max]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(
            Quantity::checked_sum([half_max, -half_max, half_max]).unwrap(),
            half_max
        );
    }

    proptest! {
        #[test]
        fn sum_of_deltas_matches_fold(values in prop::collection::vec(-1_000i64..1_000i64, 0..50)) {
            let total = Quantity::checked_sum(values.iter().copied().map(Quantity::from)).unwrap();
            prop_assert_eq!(total, Quantity::from(values.iter().sum::<i64>()));
        }
    }
}
