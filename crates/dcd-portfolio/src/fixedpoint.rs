//! Fixed-point money type.
//!
//! # Scale
//!
//! 1 USD = 1_000_000 Micros. Pool capital, invested amounts, adjusted close
//! prices and snapshot values all use this scale. Ratios and percentages
//! (returns, time-in-market) leave the fixed-point domain through
//! [`Micros::to_f64`] and are computed as `f64`.
//!
//! # Arithmetic
//!
//! - `Add`, `Sub`, `AddAssign`, `SubAssign` and `Sum` are closed over
//!   `Micros`; they panic on overflow in debug builds. Code that handles
//!   caller-supplied amounts uses [`Micros::checked_add`] instead.
//! - [`Micros::mul_ratio`] scales an amount by `num / den` through an `i128`
//!   intermediate. This is the only multiplicative operation: a position worth
//!   `invested` bought at `buy_px` is worth `invested.mul_ratio(px, buy_px)`.
//! - [`Micros::split_even`] divides an amount into `n` parts whose sum is
//!   exactly the original amount.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Micros per whole currency unit.
pub const MICROS_SCALE: i64 = 1_000_000;

/// A fixed-point monetary amount (or price) at 1e-6 scale.
///
/// There is intentionally no `From<i64>`: use [`Micros::new`] for raw micros
/// or [`Micros::from_units`] for whole dollars.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Whole currency units, e.g. `Micros::from_units(1_000)` is $1,000.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Micros(units * MICROS_SCALE)
    }

    /// Round an `f64` currency amount to the nearest micro.
    ///
    /// Returns `None` for NaN, infinities and values outside the `i64` range.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * MICROS_SCALE as f64).round();
        if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
            return None;
        }
        Some(Micros(scaled as i64))
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Currency units as `f64` (for ratios and reporting only).
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MICROS_SCALE as f64
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    #[inline]
    pub fn saturating_add(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_add(rhs.0))
    }

    /// `self * num / den`, truncated toward zero.
    ///
    /// Returns `None` when `den` is zero or the result does not fit in `i64`.
    pub fn mul_ratio(self, num: Micros, den: Micros) -> Option<Micros> {
        if den.0 == 0 {
            return None;
        }
        let v = (self.0 as i128) * (num.0 as i128) / (den.0 as i128);
        i64::try_from(v).ok().map(Micros)
    }

    /// Split into `n` parts that sum to `self`.
    ///
    /// Remainder micros go one each to the lowest-index parts, so parts differ
    /// by at most one micro. `n == 0` yields an empty vector.
    pub fn split_even(self, n: usize) -> Vec<Micros> {
        if n == 0 {
            return Vec::new();
        }
        let n_i = n as i64;
        let base = self.0.div_euclid(n_i);
        let rem = self.0.rem_euclid(n_i) as usize;
        (0..n)
            .map(|i| Micros(base + if i < rem { 1 } else { 0 }))
            .collect()
    }
}

impl Add for Micros {
    type Output = Micros;
    #[inline]
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}

impl Sub for Micros {
    type Output = Micros;
    #[inline]
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}

impl AddAssign for Micros {
    #[inline]
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Micros {
    #[inline]
    fn sub_assign(&mut self, rhs: Micros) {
        self.0 -= rhs.0;
    }
}

impl Sum for Micros {
    fn sum<I: Iterator<Item = Micros>>(iter: I) -> Micros {
        iter.fold(Micros::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Micros> for Micros {
    fn sum<I: Iterator<Item = &'a Micros>>(iter: I) -> Micros {
        iter.copied().sum()
    }
}

impl std::fmt::Display for Micros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let units = self.0 / MICROS_SCALE;
        let frac = (self.0 % MICROS_SCALE).abs();
        // -0.5 truncates to 0 units; keep the sign.
        if self.0 < 0 && units == 0 {
            write!(f, "-{units}.{frac:06}")
        } else {
            write!(f, "{units}.{frac:06}")
        }
    }
}
