//! Monetary amounts in minor currency units.
//!
//! All ledger arithmetic runs on integers: an amount is a count of minor
//! units (two decimal places, e.g. halalas per riyal). Conversions from
//! decimal input round once at the boundary, after which every comparison
//! is exact.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// A signed monetary amount in minor units.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Accepted rounding residual for a journal entry: one minor unit
    /// (0.01). Residuals inside the tolerance are settled into an existing
    /// line before storage; larger imbalances are rejected.
    pub const TOLERANCE: Money = Money(1);

    /// Minor units per major unit (two decimal places).
    const SCALE: i64 = 100;

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Convert a decimal amount of major units, rounding half away from
    /// zero to two decimal places.
    pub fn from_major(major: f64) -> Self {
        let scaled = major * Self::SCALE as f64;
        Self(if scaled.is_sign_negative() {
            (scaled - 0.5).ceil().max(i64::MIN as f64) as i64
        } else {
            (scaled + 0.5).floor().min(i64::MAX as f64) as i64
        })
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn abs(self) -> Money {
        Money(self.0.abs())
    }

    /// Scale by basis points (1 bp = 0.01%), rounding half away from zero.
    /// A 15% VAT split is `basis_points(1_500)`.
    pub fn basis_points(self, bp: u32) -> Money {
        let raw = self.0 as i128 * bp as i128;
        let half = 5_000i128;
        let rounded = if raw >= 0 {
            (raw + half) / 10_000
        } else {
            (raw - half) / 10_000
        };
        Money(rounded as i64)
    }
}

impl ValueObject for Money {}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
