pub mod cost;
pub mod energy;
pub mod power;
pub mod rate;
pub mod time;

use std::ops::{Div, Mul};

use serde::{Deserialize, Serialize};

/// Dimensioned floating-point value.
///
/// The exponents track kilowatts, hours, and currency units, so that, for example,
/// kilowatts times hours may only ever produce kilowatt-hours.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    PartialEq,
    PartialOrd,
    Serialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Neg,
    derive_more::Sub,
    derive_more::SubAssign,
    derive_more::Sum,
)]
#[serde(transparent)]
#[must_use]
pub struct Quantity<const POWER: isize, const TIME: isize, const COST: isize>(pub f64);

impl<const POWER: isize, const TIME: isize, const COST: isize> Quantity<POWER, TIME, COST> {
    pub const ZERO: Self = Self(0.0);

    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn abs(mut self) -> Self {
        self.0 = self.0.abs();
        self
    }

    pub fn min(self, rhs: Self) -> Self {
        if rhs.0 < self.0 { rhs } else { self }
    }

    pub fn max(self, rhs: Self) -> Self {
        if rhs.0 > self.0 { rhs } else { self }
    }

    pub fn clamp(self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Mul<f64>
    for Quantity<POWER, TIME, COST>
{
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Div<f64>
    for Quantity<POWER, TIME, COST>
{
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Div<Self>
    for Quantity<POWER, TIME, COST>
{
    type Output = f64;

    fn div(self, rhs: Self) -> Self::Output {
        self.0 / rhs.0
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::{Debug, Formatter};

    use super::*;

    pub type Bare = Quantity<0, 0, 0>;

    impl Debug for Bare {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    #[test]
    fn test_min() {
        assert_eq!(Bare::from(1.0).min(Bare::from(2.0)), Bare::from(1.0));
        assert_eq!(Bare::from(2.0).min(Bare::from(1.0)), Bare::from(1.0));
    }

    #[test]
    fn test_max() {
        assert_eq!(Bare::from(1.0).max(Bare::from(2.0)), Bare::from(2.0));
        assert_eq!(Bare::from(2.0).max(Bare::from(1.0)), Bare::from(2.0));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(Bare::from(1.0).clamp(Bare::from(2.0), Bare::from(3.0)), Bare::from(2.0));
        assert_eq!(Bare::from(4.0).clamp(Bare::from(2.0), Bare::from(3.0)), Bare::from(3.0));
        assert_eq!(Bare::from(2.0).clamp(Bare::from(1.0), Bare::from(3.0)), Bare::from(2.0));
    }

    #[test]
    fn test_same_unit_ratio() {
        assert_eq!(Bare::from(3.0) / Bare::from(2.0), 1.5);
    }
}
