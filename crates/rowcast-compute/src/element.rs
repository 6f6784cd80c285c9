//! Numeric element widths supported by the engines.
//!
//! Both the serial reference and the distributed path are generic over
//! [`Element`], so a tolerance comparison between them always compares
//! values of the same width.

use std::fmt::{Debug, Display};
use std::ops::AddAssign;

use num_traits::Float;

/// A floating-point matrix element (`f32` or `f64`).
pub trait Element: Float + AddAssign + Debug + Display + Send + Sync + 'static {
    /// Short name used in logs and result files.
    const NAME: &'static str;

    /// Default absolute tolerance when verifying results of this width.
    const DEFAULT_TOLERANCE: f64;

    /// Convert from `f64`, rounding to this width.
    fn from_f64(value: f64) -> Self;

    /// Widen to `f64` for comparisons and reporting.
    fn as_f64(self) -> f64;
}

impl Element for f32 {
    const NAME: &'static str = "f32";
    const DEFAULT_TOLERANCE: f64 = 1e-4;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Element for f64 {
    const NAME: &'static str = "f64";
    const DEFAULT_TOLERANCE: f64 = 1e-10;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn as_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_round_trip_rounds_to_width() {
        let x = <f32 as Element>::from_f64(0.1);
        assert_eq!(x, 0.1_f32);
        assert!((x.as_f64() - 0.1).abs() < 1e-7);
        assert!(x.as_f64() != 0.1);
    }

    #[test]
    fn test_default_tolerances_scale_with_width() {
        assert!(<f32 as Element>::DEFAULT_TOLERANCE > <f64 as Element>::DEFAULT_TOLERANCE);
        assert_eq!(<f64 as Element>::NAME, "f64");
    }
}
