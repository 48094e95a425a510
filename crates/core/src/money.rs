//! Monetary amounts in the smallest currency unit.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Non-negative amount in minor units (e.g. cents).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub fn minor(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("monetary amount overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0.checked_sub(other.0).map(Money).ok_or_else(|| {
            DomainError::validation(format!("cannot subtract {} from {}", other.0, self.0))
        })
    }

    /// Multiply a unit price by a (positive) quantity.
    pub fn times(self, quantity: i64) -> DomainResult<Money> {
        let qty = u64::try_from(quantity)
            .map_err(|_| DomainError::validation("quantity must be non-negative"))?;
        self.0
            .checked_mul(qty)
            .map(Money)
            .ok_or_else(|| DomainError::validation("monetary amount overflow"))
    }

    /// Conversion for storage backends that only speak signed 64-bit integers.
    pub fn to_i64(self) -> DomainResult<i64> {
        i64::try_from(self.0).map_err(|_| DomainError::validation("amount exceeds storage range"))
    }

    pub fn from_i64(value: i64) -> DomainResult<Money> {
        u64::try_from(value)
            .map(Money)
            .map_err(|_| DomainError::invariant(format!("negative stored amount: {value}")))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
