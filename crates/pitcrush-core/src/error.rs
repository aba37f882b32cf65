//! Error types for transforms and result extraction.

use thiserror::Error;

/// A transform refused its input or failed to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TransformError {
    /// NaN or infinite deviate, usually an upstream sampler bug.
    #[error("non-finite input {value} to {transform}")]
    NonFinite { transform: &'static str, value: f64 },

    /// Finite deviate outside the distribution's support.
    #[error("input {value} outside the domain of {transform}")]
    OutOfDomain { transform: &'static str, value: f64 },

    /// The normal CDF series did not reach a fixed point.
    #[error("series for {transform} did not converge at x = {value} after {iterations} terms")]
    NonConvergence {
        transform: &'static str,
        value: f64,
        iterations: usize,
    },
}

/// A battery result record is missing a field the extractor must read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("{test} result has no {label} sub-result")]
    MissingSubResult { test: &'static str, label: &'static str },
}
