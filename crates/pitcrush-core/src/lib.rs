//! # pitcrush-core
//!
//! **Battery-test non-uniform generators as if they were uniform ones.**
//!
//! Statistical batteries consume streams on [0, 1). Normal and exponential
//! samplers don't produce those, but their probability integral transform
//! (PIT) does: if `X ~ F` then `F(X) ~ U(0, 1)`. This crate provides the
//! pieces that turn a sampler into something a battery can read:
//!
//! ## Quick Start
//!
//! ```
//! use pitcrush_core::{NamedGenerator, NormalSource, SamplerState, UniformGenerator};
//!
//! let mut state = SamplerState::from_seed(117);
//! let mut generator = NamedGenerator::bind(NormalSource::new(&mut state));
//!
//! let u = generator.next_uniform().unwrap();
//! assert!((0.0..=1.0).contains(&u));
//! assert_eq!(generator.name(), "normal");
//! ```
//!
//! ## Architecture
//!
//! SamplerState → VariateSource → Transform → NamedGenerator → battery → TestResult → PValueSummary
//!
//! - [`transform`]: the normal and exponential CDFs, with explicit errors for
//!   non-finite input and series non-convergence.
//! - [`source`]: the shared seeded engine and the per-distribution sources.
//! - [`generator`]: the [`UniformGenerator`] capability and its adapter.
//! - [`result`] and [`extract`]: battery result shapes and the reduction to
//!   scalar p-values.

pub mod error;
pub mod extract;
pub mod generator;
pub mod result;
pub mod source;
pub mod transform;

pub use error::{ExtractError, TransformError};
pub use extract::{PValueSummary, WALK_LABELS, extract_p_values};
pub use generator::{NamedGenerator, UniformGenerator};
pub use result::{
    BasicResult, Chi2Result, GofSummary, GofTest, KnuthBasicResult, KnuthPoissonResult,
    PoissonResult, StringResult, TestResult, WalkResult,
};
pub use source::{
    DEFAULT_SEED, Distribution, ExponentialSource, NaiveExponentialSource, NormalSource,
    SamplerState, SourceKind, UniformSource, VariateSource, make_source,
};
pub use transform::{Transform, exponential_cdf, exponential_inverse, normal_cdf};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
