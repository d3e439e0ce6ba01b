// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Musical resolutions and exact step arithmetic.
//!
//! Step positions are kept as exact rationals (`StepTime`) so that a finer
//! resolution landing between two base steps is represented without any
//! floating point rounding at bar or step boundaries.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

use num_rational::Ratio;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Steps per bar of a straight resolution's base unit
pub const STRAIGHT_BASE: u32 = 32;

/// Steps per bar of a triplet resolution's base unit
pub const TRIPLET_BASE: u32 = 48;

/// An exact rational position or offset measured in steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "StepTimeRepr", into = "StepTimeRepr")]
pub struct StepTime(Ratio<i64>);

impl StepTime {
    /// Zero offset
    pub const ZERO: StepTime = StepTime::from_integer(0);

    /// Create a reduced rational. Panics if `den` is zero.
    pub fn new(num: i64, den: i64) -> Self {
        Self(Ratio::new(num, den))
    }

    /// Create a whole number of steps
    pub const fn from_integer(steps: i64) -> Self {
        Self(Ratio::new_raw(steps, 1))
    }

    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    /// Whether this falls exactly on a whole step
    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// Largest whole step not after this position
    pub fn floor(&self) -> i64 {
        self.0.floor().to_integer()
    }

    /// Smallest whole step not before this position
    pub fn ceil(&self) -> i64 {
        self.0.ceil().to_integer()
    }

    /// Lossy conversion for display and audio scheduling
    pub fn to_f64(&self) -> f64 {
        self.numer() as f64 / self.denom() as f64
    }
}

impl Default for StepTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for StepTime {
    fn from(steps: i64) -> Self {
        Self::from_integer(steps)
    }
}

impl From<u64> for StepTime {
    fn from(steps: u64) -> Self {
        Self::from_integer(steps as i64)
    }
}

macro_rules! forward_binop {
    ($($trait:ident :: $method:ident),*) => {$(
        impl $trait for StepTime {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(self.0.$method(rhs.0))
            }
        }
    )*};
}

forward_binop!(Add::add, Sub::sub, Mul::mul, Div::div);

impl Neg for StepTime {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl fmt::Display for StepTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numer())
        } else {
            write!(f, "{}/{}", self.numer(), self.denom())
        }
    }
}

impl FromStr for StepTime {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let text = s.trim();
        let parsed = if text.contains('/') {
            text.parse::<Ratio<i64>>().map_err(|e| e.to_string())
        } else {
            text.parse::<i64>().map(Ratio::from_integer).map_err(|e| e.to_string())
        };
        parsed
            .map(Self)
            .map_err(|e| format!("invalid step time '{}': {}", s, e))
    }
}

/// Serialized form: a bare integer or an `"n/d"` string
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StepTimeRepr {
    Integer(i64),
    Fraction(String),
}

impl TryFrom<StepTimeRepr> for StepTime {
    type Error = String;

    fn try_from(repr: StepTimeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            StepTimeRepr::Integer(n) => Ok(StepTime::from_integer(n)),
            StepTimeRepr::Fraction(s) => s.parse(),
        }
    }
}

impl From<StepTime> for StepTimeRepr {
    fn from(time: StepTime) -> Self {
        if time.is_integer() {
            StepTimeRepr::Integer(time.numer())
        } else {
            StepTimeRepr::Fraction(time.to_string())
        }
    }
}

/// A musical subdivision of the bar, e.g. 1/16 or 1/16 triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ResolutionRepr", into = "ResolutionRepr")]
pub struct Resolution {
    resolution: u32,
    is_triplet: bool,
}

/// The finest scheduling granularity: one base step is a 1/32 note
pub const BASE_RESOLUTION: Resolution = Resolution::THIRTY_SECOND;

impl Resolution {
    pub const QUARTER: Resolution = Resolution { resolution: 4, is_triplet: false };
    pub const EIGHTH: Resolution = Resolution { resolution: 8, is_triplet: false };
    pub const SIXTEENTH: Resolution = Resolution { resolution: 16, is_triplet: false };
    pub const THIRTY_SECOND: Resolution = Resolution { resolution: 32, is_triplet: false };
    pub const SIXTY_FOURTH: Resolution = Resolution { resolution: 64, is_triplet: false };

    /// Create a resolution of `1/resolution` notes
    pub fn new(resolution: u32, is_triplet: bool) -> Result<Self> {
        if resolution == 0 {
            return Err(EngineError::InvalidResolution(resolution));
        }
        Ok(Self { resolution, is_triplet })
    }

    /// Subdivision denominator (16 for 1/16)
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn is_triplet(&self) -> bool {
        self.is_triplet
    }

    /// Base unit the subdivision is measured against
    pub fn base_resolution(&self) -> u32 {
        if self.is_triplet {
            TRIPLET_BASE
        } else {
            STRAIGHT_BASE
        }
    }

    /// Number of events of this resolution per bar
    pub fn num_steps(&self) -> StepTime {
        if self.is_triplet {
            StepTime::new(self.resolution as i64 * TRIPLET_BASE as i64, STRAIGHT_BASE as i64)
        } else {
            StepTime::from_integer(self.resolution as i64)
        }
    }

    /// The triplet sibling of a straight resolution, or vice versa
    pub fn triplet_or_non_triplet(&self) -> Self {
        Self {
            resolution: self.resolution,
            is_triplet: !self.is_triplet,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::SIXTEENTH
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1/{}{}", self.resolution, if self.is_triplet { "t" } else { "" })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolutionRepr {
    resolution: u32,
    #[serde(default)]
    is_triplet: bool,
    /// Derived on the way in, written on the way out for readers that expect it
    #[serde(default)]
    base_resolution: Option<u32>,
}

impl TryFrom<ResolutionRepr> for Resolution {
    type Error = EngineError;

    fn try_from(repr: ResolutionRepr) -> Result<Self> {
        Resolution::new(repr.resolution, repr.is_triplet)
    }
}

impl From<Resolution> for ResolutionRepr {
    fn from(res: Resolution) -> Self {
        ResolutionRepr {
            resolution: res.resolution,
            is_triplet: res.is_triplet,
            base_resolution: Some(res.base_resolution()),
        }
    }
}

/// Rescale `step` by the ratio `from.num_steps() / to.num_steps()`.
///
/// A step counted in `to` units comes out in `from` units, so
/// `transform_step(n, &target, &BASE_RESOLUTION)` is where base step `n`
/// falls on the `target` grid. The result is exact; a fine tick can land
/// between two base steps and the fraction is meaningful.
pub fn transform_step(step: StepTime, from: &Resolution, to: &Resolution) -> StepTime {
    step * from.num_steps() / to.num_steps()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_time_normalises() {
        let t = StepTime::new(4, -8);
        assert_eq!(t.numer(), -1);
        assert_eq!(t.denom(), 2);
        assert_eq!(StepTime::new(0, 7), StepTime::ZERO);
        assert_eq!(StepTime::new(6, 3), StepTime::from_integer(2));
    }

    #[test]
    fn test_step_time_floor_ceil() {
        let t = StepTime::new(3, 2);
        assert_eq!(t.floor(), 1);
        assert_eq!(t.ceil(), 2);

        let neg = StepTime::new(-3, 2);
        assert_eq!(neg.floor(), -2);
        assert_eq!(neg.ceil(), -1);

        let whole = StepTime::from_integer(5);
        assert!(whole.is_integer());
        assert_eq!(whole.floor(), 5);
        assert_eq!(whole.ceil(), 5);
    }

    #[test]
    fn test_step_time_arithmetic_and_order() {
        let a = StepTime::new(1, 3);
        let b = StepTime::new(1, 6);
        assert_eq!(a + b, StepTime::new(1, 2));
        assert_eq!(a - b, b);
        assert_eq!(a * StepTime::from_integer(3), StepTime::from_integer(1));
        assert_eq!(a / b, StepTime::from_integer(2));
        assert!(b < a);
        assert!(StepTime::new(-1, 2) < StepTime::ZERO);
    }

    #[test]
    fn test_step_time_large_denominators_reduce() {
        // 1/48 and 1/64 grids combined stay exact across many bars
        let tick = StepTime::new(1, 48) + StepTime::new(1, 64);
        assert_eq!(tick, StepTime::new(7, 192));
        let far = StepTime::from_integer(1 << 40) * StepTime::new(3, 2) / StepTime::new(3, 2);
        assert_eq!(far, StepTime::from_integer(1 << 40));
        assert_eq!(StepTime::new(-7, 192).floor(), -1);
    }

    #[test]
    fn test_step_time_parse() {
        assert_eq!("3/4".parse::<StepTime>(), Ok(StepTime::new(3, 4)));
        assert_eq!("7".parse::<StepTime>(), Ok(StepTime::from_integer(7)));
        assert!("1/0".parse::<StepTime>().is_err());
        assert!("abc".parse::<StepTime>().is_err());
        assert_eq!(StepTime::new(2, 3).to_string(), "2/3");
    }

    #[test]
    fn test_num_steps() {
        assert_eq!(Resolution::SIXTEENTH.num_steps(), StepTime::from_integer(16));
        let triplet = Resolution::new(16, true).unwrap();
        assert_eq!(triplet.num_steps(), StepTime::from_integer(24));
        let odd_triplet = Resolution::new(1, true).unwrap();
        assert_eq!(odd_triplet.num_steps(), StepTime::new(3, 2));
    }

    #[test]
    fn test_num_steps_monotonic() {
        for triplet in [false, true] {
            let mut previous = StepTime::ZERO;
            for res in [1, 2, 4, 8, 16, 32, 64] {
                let steps = Resolution::new(res, triplet).unwrap().num_steps();
                assert!(steps > previous);
                previous = steps;
            }
        }
    }

    #[test]
    fn test_base_resolution() {
        assert_eq!(Resolution::SIXTEENTH.base_resolution(), 32);
        assert_eq!(Resolution::SIXTEENTH.triplet_or_non_triplet().base_resolution(), 48);
    }

    #[test]
    fn test_triplet_sibling_round_trip() {
        for res in [4, 8, 16, 32] {
            for triplet in [false, true] {
                let original = Resolution::new(res, triplet).unwrap();
                let sibling = original.triplet_or_non_triplet();
                assert_ne!(sibling.is_triplet(), original.is_triplet());
                assert_eq!(sibling.triplet_or_non_triplet(), original);
            }
        }
    }

    #[test]
    fn test_zero_resolution_rejected() {
        assert_eq!(Resolution::new(0, false), Err(EngineError::InvalidResolution(0)));
    }

    #[test]
    fn test_transform_step() {
        let sixteenth = Resolution::SIXTEENTH;
        assert_eq!(
            transform_step(StepTime::from_integer(2), &sixteenth, &BASE_RESOLUTION),
            StepTime::from_integer(1)
        );
        assert_eq!(
            transform_step(StepTime::from_integer(3), &sixteenth, &BASE_RESOLUTION),
            StepTime::new(3, 2)
        );
        assert_eq!(
            transform_step(StepTime::from_integer(1), &BASE_RESOLUTION, &sixteenth),
            StepTime::from_integer(2)
        );
        let triplet = Resolution::new(16, true).unwrap();
        assert_eq!(
            transform_step(StepTime::from_integer(4), &triplet, &BASE_RESOLUTION),
            StepTime::from_integer(3)
        );
    }

    #[test]
    fn test_resolution_deserialize() {
        let res: Resolution =
            serde_yaml::from_str("resolution: 16\nisTriplet: true\nbaseResolution: 48\n").unwrap();
        assert_eq!(res, Resolution::new(16, true).unwrap());

        let bad: std::result::Result<Resolution, _> = serde_yaml::from_str("resolution: 0\n");
        assert!(bad.is_err());
    }

    #[test]
    fn test_step_time_deserialize() {
        let whole: StepTime = serde_yaml::from_str("3").unwrap();
        assert_eq!(whole, StepTime::from_integer(3));
        let frac: StepTime = serde_yaml::from_str("\"1/3\"").unwrap();
        assert_eq!(frac, StepTime::new(1, 3));
    }
}
