//! Battery error type.

use pitcrush_core::{ExtractError, TransformError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatteryError {
    /// The generator under test failed to produce a sample.
    #[error("generator failed: {0}")]
    Generator(#[from] TransformError),

    #[error("invalid parameters for {test}: {reason}")]
    InvalidParameters { test: &'static str, reason: String },

    /// A reference distribution could not be constructed.
    #[error("reference distribution for {test}: {reason}")]
    Distribution { test: &'static str, reason: String },

    #[error("malformed result: {0}")]
    Malformed(#[from] ExtractError),

    #[error("report output failed: {0}")]
    Io(#[from] std::io::Error),
}

impl BatteryError {
    pub(crate) fn invalid(test: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            test,
            reason: reason.into(),
        }
    }

    pub(crate) fn distribution(test: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Distribution {
            test,
            reason: reason.to_string(),
        }
    }
}
