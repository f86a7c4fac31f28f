//! Probability distributions, delegating special functions to `statrs`.

pub mod normal;

pub use normal::{normal_cdf, normal_pdf};
