//! Variate sources and the shared sampler state.
//!
//! A [`SamplerState`] is built once per process from a seed and lent to one
//! [`VariateSource`] at a time. The normal and exponential sources use the
//! ziggurat samplers from `rand_distr`, whose tables are static and shared.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution as _;
use rand_distr::{Exp1, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::transform::exponential_inverse;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 117;

/// Distribution a deviate was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Uniform,
    Normal,
    Exponential,
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform => write!(f, "uniform"),
            Self::Normal => write!(f, "normal"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

/// Which source construction to exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Uniform,
    Normal,
    Exponential,
    /// Exp(1) built from the uniform engine by inverse transform, kept as a
    /// cross-check against the ziggurat exponential.
    NaiveExponential,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        Self::Uniform,
        Self::Normal,
        Self::Exponential,
        Self::NaiveExponential,
    ];

    /// The sources a default run exercises.
    pub const DEFAULT: [SourceKind; 3] = [Self::Uniform, Self::Normal, Self::Exponential];

    pub fn name(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Normal => "normal",
            Self::Exponential => "exponential",
            Self::NaiveExponential => "naive-exponential",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uniform" | "unif" | "u" => Ok(Self::Uniform),
            "normal" | "gaussian" | "randn" | "n" => Ok(Self::Normal),
            "exponential" | "exp" | "exprnd" | "e" => Ok(Self::Exponential),
            "naive-exponential" | "naive_exponential" | "naive" => Ok(Self::NaiveExponential),
            other => Err(format!("unknown distribution '{other}'")),
        }
    }
}

/// Seeded engine shared by every source in a run.
pub struct SamplerState {
    engine: StdRng,
    seed: u64,
}

impl SamplerState {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            engine: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rewind the engine to the start of its seeded stream.
    pub fn reset(&mut self) {
        self.engine = StdRng::seed_from_u64(self.seed);
    }

    fn uniform(&mut self) -> f64 {
        self.engine.random::<f64>()
    }

    fn normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.engine)
    }

    fn exponential(&mut self) -> f64 {
        Exp1.sample(&mut self.engine)
    }
}

impl std::fmt::Debug for SamplerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerState")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// Trait that every variate source implements.
pub trait VariateSource {
    /// Identifier used to name generators built on this source.
    fn name(&self) -> &'static str;

    /// Distribution of the deviates this source returns.
    fn distribution(&self) -> Distribution;

    /// Draw one raw deviate.
    fn next_deviate(&mut self) -> Result<f64, TransformError>;
}

macro_rules! engine_source {
    ($(#[$meta:meta])* $ty:ident, $name:literal, $dist:expr, $draw:ident) => {
        $(#[$meta])*
        pub struct $ty<'a> {
            state: &'a mut SamplerState,
        }

        impl<'a> $ty<'a> {
            pub fn new(state: &'a mut SamplerState) -> Self {
                Self { state }
            }
        }

        impl VariateSource for $ty<'_> {
            fn name(&self) -> &'static str {
                $name
            }

            fn distribution(&self) -> Distribution {
                $dist
            }

            fn next_deviate(&mut self) -> Result<f64, TransformError> {
                Ok(self.state.$draw())
            }
        }
    };
}

engine_source!(
    /// U[0, 1) doubles with 53 random bits.
    UniformSource,
    "uniform",
    Distribution::Uniform,
    uniform
);
engine_source!(
    /// N(0, 1) via the ziggurat method.
    NormalSource,
    "normal",
    Distribution::Normal,
    normal
);
engine_source!(
    /// Exp(1) via the ziggurat method.
    ExponentialSource,
    "exponential",
    Distribution::Exponential,
    exponential
);

/// Exp(1) as `−ln(1 − U)` over the uniform engine.
pub struct NaiveExponentialSource<'a> {
    state: &'a mut SamplerState,
}

impl<'a> NaiveExponentialSource<'a> {
    pub fn new(state: &'a mut SamplerState) -> Self {
        Self { state }
    }
}

impl VariateSource for NaiveExponentialSource<'_> {
    fn name(&self) -> &'static str {
        "naive-exponential"
    }

    fn distribution(&self) -> Distribution {
        Distribution::Exponential
    }

    fn next_deviate(&mut self) -> Result<f64, TransformError> {
        exponential_inverse(self.state.uniform())
    }
}

/// Build the source for `kind` over `state`.
pub fn make_source(kind: SourceKind, state: &mut SamplerState) -> Box<dyn VariateSource + '_> {
    match kind {
        SourceKind::Uniform => Box::new(UniformSource::new(state)),
        SourceKind::Normal => Box::new(NormalSource::new(state)),
        SourceKind::Exponential => Box::new(ExponentialSource::new(state)),
        SourceKind::NaiveExponential => Box::new(NaiveExponentialSource::new(state)),
    }
}
