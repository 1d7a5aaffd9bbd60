//! Numeric precision selection for the recovery pipeline.
//!
//! The reconstruction and metric kernels are generic over [`Scalar`] so a
//! run can execute in single precision (half the chunk memory, GPU-friendly
//! layouts) or double precision. Which one is used is a run-time choice
//! carried by [`Precision`] in the resource configuration; results are
//! always reported back as `f64`.

use serde::{Deserialize, Serialize};

/// Floating-point type the hot path is instantiated with.
pub trait Scalar: nalgebra::RealField + Copy + Send + Sync {
    /// Storage size of one value, used by the chunk planner.
    const BYTES: usize;

    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;

    fn is_finite(self) -> bool;
}

impl Scalar for f32 {
    const BYTES: usize = 4;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
}

impl Scalar for f64 {
    const BYTES: usize = 8;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

/// Numeric precision for a solver run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floats
    Single,
    /// 64-bit floats
    Double,
}

impl Default for Precision {
    fn default() -> Self {
        Self::Double
    }
}

impl Precision {
    /// Bytes per stored value at this precision
    pub fn bytes_per_value(self) -> usize {
        match self {
            Self::Single => f32::BYTES,
            Self::Double => f64::BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_value_match_types() {
        assert_eq!(Precision::Single.bytes_per_value(), 4);
        assert_eq!(Precision::Double.bytes_per_value(), 8);
    }

    #[test]
    fn round_trips_through_f64() {
        assert_eq!(<f32 as Scalar>::from_f64(1.5).to_f64(), 1.5);
        assert_eq!(<f64 as Scalar>::from_f64(1.5).to_f64(), 1.5);
    }
}
