//! The uniform generator capability and its adapter.
//!
//! A battery only ever sees a [`UniformGenerator`]: a name plus a way to draw
//! one value on [0, 1). [`NamedGenerator`] turns any [`VariateSource`] into
//! one by applying the matching probability integral transform.

use crate::error::TransformError;
use crate::source::VariateSource;
use crate::transform::Transform;

/// A named stream of uniform samples, as consumed by a test battery.
pub trait UniformGenerator {
    fn name(&self) -> &str;

    /// Draw one sample on [0, 1).
    fn next_uniform(&mut self) -> Result<f64, TransformError>;
}

impl<G: UniformGenerator + ?Sized> UniformGenerator for &mut G {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_uniform(&mut self) -> Result<f64, TransformError> {
        (**self).next_uniform()
    }
}

impl<S: VariateSource + ?Sized> VariateSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn distribution(&self) -> crate::source::Distribution {
        (**self).distribution()
    }

    fn next_deviate(&mut self) -> Result<f64, TransformError> {
        (**self).next_deviate()
    }
}

/// Binds a source and a transform into a [`UniformGenerator`].
///
/// Construction never draws. Each [`next_uniform`](UniformGenerator::next_uniform)
/// draws exactly one deviate and transforms it.
pub struct NamedGenerator<S> {
    name: String,
    source: S,
    transform: Transform,
    draws: u64,
}

impl<S: VariateSource> NamedGenerator<S> {
    /// Bind `source` under `name`. `None` means the source is already uniform.
    pub fn new(name: impl Into<String>, source: S, transform: Option<Transform>) -> Self {
        Self {
            name: name.into(),
            source,
            transform: transform.unwrap_or(Transform::Identity),
            draws: 0,
        }
    }

    /// Bind `source` under its own name with the transform its distribution needs.
    pub fn bind(source: S) -> Self {
        let transform = Transform::for_distribution(source.distribution());
        Self::new(source.name(), source, Some(transform))
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Samples drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Tear the binding down and hand the source back untouched.
    pub fn release(self) -> S {
        log::debug!(
            "released generator '{}' after {} draws",
            self.name,
            self.draws
        );
        self.source
    }
}

impl<S: VariateSource> UniformGenerator for NamedGenerator<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_uniform(&mut self) -> Result<f64, TransformError> {
        let deviate = self.source.next_deviate()?;
        self.draws += 1;
        self.transform.apply(deviate)
    }
}

impl<S> std::fmt::Debug for NamedGenerator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedGenerator")
            .field("name", &self.name)
            .field("transform", &self.transform)
            .field("draws", &self.draws)
            .finish()
    }
}
