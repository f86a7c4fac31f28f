//! Box bounds on the Heston parameter vector.

use hcal_core::{
    errors::{Error, Result},
    Real,
};
use hcal_math::{Array, BoxConstraint};
use serde::{Deserialize, Serialize};

use crate::heston_model::{HestonParams, PARAMETER_NAMES};

/// Inclusive lower/upper bounds per Heston parameter.
///
/// A degenerate interval pins the parameter; the default pins `lambda` at 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    /// Lower bounds.
    pub lower: HestonParams,
    /// Upper bounds.
    pub upper: HestonParams,
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            lower: HestonParams::new(1e-4, 1e-4, 1e-4, 1e-4, -0.9, 0.0),
            upper: HestonParams::new(1.0, 15.0, 1.0, 2.0, 0.1, 0.0),
        }
    }
}

impl ParameterBounds {
    /// Create bounds, validating that each interval is finite and ordered.
    pub fn new(lower: HestonParams, upper: HestonParams) -> Result<Self> {
        let bounds = Self { lower, upper };
        bounds.to_constraint()?;
        Ok(bounds)
    }

    /// The equivalent optimizer box.
    pub fn to_constraint(&self) -> Result<BoxConstraint> {
        BoxConstraint::new(self.lower.to_array(), self.upper.to_array())
    }

    /// Whether `params` lies inside the box (non-finite values never do).
    pub fn contains(&self, params: &HestonParams) -> bool {
        self.check(params).is_ok()
    }

    /// Fail with [`Error::BoundsViolation`] naming the first parameter that
    /// is non-finite or outside its interval.
    pub fn check(&self, params: &HestonParams) -> Result<()> {
        let (lo, hi, x) = (self.lower.to_vec(), self.upper.to_vec(), params.to_vec());
        for i in 0..x.len() {
            if !(x[i] >= lo[i] && x[i] <= hi[i]) {
                return Err(Error::BoundsViolation {
                    parameter: PARAMETER_NAMES[i],
                    value: x[i],
                    lower: lo[i],
                    upper: hi[i],
                });
            }
        }
        Ok(())
    }

    /// Clamp every component into its interval.
    pub fn clamp(&self, params: &HestonParams) -> HestonParams {
        let (lo, hi, mut x) = (self.lower.to_vec(), self.upper.to_vec(), params.to_vec());
        for i in 0..x.len() {
            x[i] = x[i].clamp(lo[i], hi[i]);
        }
        HestonParams::new(x[0], x[1], x[2], x[3], x[4], x[5])
    }

    /// Clamp an optimizer coordinate vector and convert it.
    pub fn clamp_array(&self, x: &Array) -> Result<HestonParams> {
        Ok(self.clamp(&HestonParams::from_array(x)?))
    }

    /// Width of each interval.
    pub fn widths(&self) -> [Real; 6] {
        let (lo, hi) = (self.lower.to_vec(), self.upper.to_vec());
        std::array::from_fn(|i| hi[i] - lo[i])
    }
}
