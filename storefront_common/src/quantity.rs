use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------      Quantity       ---------------------------------------------------------
/// A count of product units.
///
/// Stock levels are never negative, but a `Quantity` is signed so that it can also carry ledger deltas (negative for
/// deductions, positive for restocks and transfers in).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Quantity(i64);

op!(binary Quantity, Add, add);
op!(binary Quantity, Sub, sub);
op!(inplace Quantity, AddAssign, add_assign);
op!(inplace Quantity, SubAssign, sub_assign);
op!(unary Quantity, Neg, neg);

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a quantity: {0}")]
pub struct QuantityConversionError(String);

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Quantity {
    type Error = QuantityConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| QuantityConversionError(format!("{value} is too large to be a stock quantity")))
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The magnitude of a delta, e.g. the number of units a deduction removes.
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Returns `None` if the addition overflows.
    pub fn checked_add(&self, rhs: Quantity) -> Option<Quantity> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Returns `None` for the one value that has no negation, `i64::MIN`.
    pub fn checked_neg(&self) -> Option<Quantity> {
        self.0.checked_neg().map(Self)
    }
}
