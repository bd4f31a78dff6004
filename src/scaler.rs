//! Rescaling between a bounded box and the normalized box [-1, +1].
//!
//! Scaling is exact at the edges: `low` maps to exactly -1 and `high` to
//! exactly +1. Unscaling is not; `unscale(1.0)` may land one ulp away from
//! `high`, possibly outside the box. Both directions are monotonic, which a
//! textbook `high * t + low * (1 - t)` interpolation is not.
//!
//! ```ignore
//! let scaler = Scaler::new(BoxSpace::uniform(5.0, 10.0, 3))?;
//! assert_eq!(scaler.scale(&[5.0, 7.5, 10.0])?, vec![-1.0, 0.0, 1.0]);
//! assert_eq!(scaler.unscale(&[-1.0, 0.0, 1.0])?, vec![5.0, 7.5, 10.0]);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by [`BoxSpace`] and [`Scaler`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ScaleError {
    #[error("space is not bounded: {0}")]
    NotBounded(String),

    #[error("shape mismatch: expected {expected} element(s), got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("invalid bounds at index {index}: low {low} > high {high}")]
    InvalidBounds { index: usize, low: f32, high: f32 },
}

/// An axis-aligned box of `f32` values.
///
/// Deserialization runs the same checks as [`BoxSpace::new`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoxSpace")]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

#[derive(Deserialize)]
struct RawBoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl TryFrom<RawBoxSpace> for BoxSpace {
    type Error = ScaleError;

    fn try_from(raw: RawBoxSpace) -> Result<Self, ScaleError> {
        Self::new(raw.low, raw.high)
    }
}

impl BoxSpace {
    /// Bounds may be infinite; they must have equal lengths and
    /// `low <= high` element-wise.
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Result<Self, ScaleError> {
        if low.len() != high.len() {
            return Err(ScaleError::ShapeMismatch {
                expected: low.len(),
                got: high.len(),
            });
        }
        if let Some((index, (&l, &h))) = low.iter().zip(&high).enumerate().find(|(_, (l, h))| l > h) {
            return Err(ScaleError::InvalidBounds { index, low: l, high: h });
        }
        Ok(Self { low, high })
    }

    /// `dims` elements, all with the same bounds.
    pub fn uniform(low: f32, high: f32, dims: usize) -> Result<Self, ScaleError> {
        Self::new(vec![low; dims], vec![high; dims])
    }

    pub fn low(&self) -> &[f32] {
        &self.low
    }

    pub fn high(&self) -> &[f32] {
        &self.high
    }

    pub fn dims(&self) -> usize {
        self.low.len()
    }

    /// True if every bound is finite.
    pub fn is_bounded(&self) -> bool {
        self.low.iter().chain(&self.high).all(|b| b.is_finite())
    }

    pub fn contains(&self, point: &[f32]) -> bool {
        point.len() == self.dims()
            && point
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(x, (l, h))| l <= x && x <= h)
    }

    fn check_shape(&self, point: &[f32]) -> Result<(), ScaleError> {
        if point.len() != self.dims() {
            return Err(ScaleError::ShapeMismatch {
                expected: self.dims(),
                got: point.len(),
            });
        }
        Ok(())
    }
}

/// Scales points between a bounded [`BoxSpace`] and [-1, +1].
///
/// A dimension with `low == high` is accepted, but scaling divides by its
/// zero width: every coordinate in it scales to NaN. Unscaling it always
/// yields `low`.
#[derive(Clone, Debug, PartialEq)]
pub struct Scaler {
    space: BoxSpace,
}

impl Scaler {
    pub fn new(space: BoxSpace) -> Result<Self, ScaleError> {
        if !space.is_bounded() {
            return Err(ScaleError::NotBounded(format!(
                "BoxSpace(low={:?}, high={:?})",
                space.low, space.high
            )));
        }
        Ok(Self { space })
    }

    pub fn space(&self) -> &BoxSpace {
        &self.space
    }

    /// Map from [low, high] to [-1, +1].
    pub fn scale(&self, point: &[f32]) -> Result<Vec<f32>, ScaleError> {
        self.space.check_shape(point)?;
        Ok(point
            .iter()
            .zip(self.space.low.iter().zip(&self.space.high))
            .map(|(&x, (&low, &high))| 2.0 * ((x - low) / (high - low)) - 1.0)
            .collect())
    }

    /// Map from [-1, +1] to [low, high].
    pub fn unscale(&self, point: &[f32]) -> Result<Vec<f32>, ScaleError> {
        self.space.check_shape(point)?;
        Ok(point
            .iter()
            .zip(self.space.low.iter().zip(&self.space.high))
            .map(|(&y, (&low, &high))| low + (0.5 * (y + 1.0) * (high - low)))
            .collect())
    }

    pub fn scale_batch(&self, points: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ScaleError> {
        points.iter().map(|p| self.scale(p)).collect()
    }

    pub fn unscale_batch(&self, points: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ScaleError> {
        points.iter().map(|p| self.unscale(p)).collect()
    }
}

/// One-shot [`Scaler::scale`].
pub fn scale_from_box(space: &BoxSpace, point: &[f32]) -> Result<Vec<f32>, ScaleError> {
    Scaler::new(space.clone())?.scale(point)
}

/// One-shot [`Scaler::unscale`].
pub fn unscale_into_box(space: &BoxSpace, point: &[f32]) -> Result<Vec<f32>, ScaleError> {
    Scaler::new(space.clone())?.unscale(point)
}
