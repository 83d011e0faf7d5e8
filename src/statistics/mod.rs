// Statistical primitives for trial aggregation and group comparison
//
// - Descriptive statistics (mean, sample std, linear-interpolation quantiles)
// - Shapiro-Wilk normality test (Royston 1995, algorithm AS R94)
// - Welch's unequal-variance t-test with Welch-Satterthwaite degrees of
//   freedom
// - Mann-Whitney U test (exact for small tie-free samples, normal
//   approximation with tie and continuity correction otherwise)
//
// Everything here works on plain f64 slices. Callers attach metric names to
// failures when converting TestError into PipelineError.

mod descriptive;
mod hypothesis;
mod normality;

pub use descriptive::{mean, percentile, sample_std, sorted_finite, Summary};
pub use hypothesis::{mann_whitney_u, welch_t_test, TestKind, TestOutcome};
pub use normality::{shapiro_wilk, NormalityTest};

use thiserror::Error;

/// Reasons a statistical test cannot produce a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    #[error("Too many samples: at most {max} supported, got {actual}")]
    TooManySamples { max: usize, actual: usize },

    #[error("All samples are identical")]
    ZeroRange,

    #[error("Both samples have zero variance")]
    ZeroVariance,

    #[error("Test computation failed: {0}")]
    Computation(String),
}
