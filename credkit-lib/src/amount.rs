//! Safe financial arithmetic using fixed-point decimal
//!
//! Fees are expressed in minor currency units (e.g. paise, cents) and must
//! never be handled as floating point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Financial amount in minor currency units with fixed-point precision
///
/// # Security
///
/// - Uses `Decimal` internally (28-29 significant digits)
/// - All arithmetic is exact (no rounding errors)
/// - Checked operations (never overflow/panic)
/// - Serializes as string (preserves precision)
///
/// # Examples
///
/// ```rust
/// use credkit_lib::Amount;
///
/// let fee = Amount::from_minor_units(1649);
/// let recovery = Amount::from_minor_units(34900);
/// let total = fee.checked_add(&recovery).unwrap();
/// assert_eq!(total.as_minor_units(), 36549);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount {
    // Decimal automatically serializes as string with serde feature
    value: Decimal,
}

impl Amount {
    /// Create from minor units (smallest currency denomination).
    pub fn from_minor_units(units: i64) -> Self {
        Self {
            value: Decimal::from(units),
        }
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self::from_minor_units(0)
    }

    /// Create from a decimal string (e.g., "1649").
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as a valid decimal.
    pub fn from_str_checked(s: &str) -> Result<Self, String> {
        Decimal::from_str(s)
            .map(|value| Self { value })
            .map_err(|e| format!("Invalid amount: {}", e))
    }

    /// Get the value in minor units.
    ///
    /// If the value exceeds i64::MAX, returns i64::MAX.
    pub fn as_minor_units(&self) -> i64 {
        use std::convert::TryInto;
        self.value.try_into().unwrap_or(i64::MAX)
    }

    /// True if this amount is zero (a free operation).
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Checked addition (returns None on overflow).
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.value
            .checked_add(other.value)
            .map(|value| Self { value })
    }

    /// Checked subtraction (returns None on underflow).
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.value
            .checked_sub(other.value)
            .map(|value| Self { value })
    }

    /// Check if this amount is covered by `available`.
    pub fn is_covered_by(&self, available: &Self) -> bool {
        self.value <= available.value
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
