//! # hcal-models
//!
//! The Heston parameter vector, its box bounds and the Feller test.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Equity models ────────────────────────────────────────────────────────
pub mod heston_model;
pub mod parameter_bounds;

// ── Re-exports ───────────────────────────────────────────────────────────
pub use heston_model::{HestonParams, PARAMETER_COUNT, PARAMETER_NAMES};
pub use parameter_bounds::ParameterBounds;
