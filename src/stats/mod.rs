//! Statistical utilities: descriptive statistics and two-sample tests.
//!
//! Distribution functions come from `statrs`; the test statistics themselves
//! are computed here so their edge cases (ties, tiny samples, zero variance)
//! surface as typed `StatError`s rather than NaNs.

use thiserror::Error;

pub mod descriptive;
pub mod mann_whitney;
pub mod normality;
pub mod welch;

pub use descriptive::*;
pub use mann_whitney::*;
pub use normality::*;
pub use welch::*;

/// Why a statistic could not be computed for a sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatError {
    #[error("need at least {needed} observations, got {got}")]
    TooFewObservations { needed: usize, got: usize },

    #[error("sample has zero range")]
    ZeroRange,

    #[error("test statistic has zero variance")]
    ZeroVariance,

    #[error("sample contains non-finite values")]
    NonFinite,

    #[error("distribution error: {0}")]
    Distribution(String),
}

pub type StatResult<T> = Result<T, StatError>;

/// Output of a two-sample hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestStatistic {
    pub statistic: f64,
    /// Two-sided p-value in `[0, 1]`.
    pub p_value: f64,
}

pub(crate) fn ensure_finite(sample: &[f64]) -> StatResult<()> {
    if sample.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(StatError::NonFinite)
    }
}
