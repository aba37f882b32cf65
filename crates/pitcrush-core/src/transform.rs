//! Probability integral transforms.
//!
//! Each transform maps a deviate of a known distribution to its cumulative
//! probability, which is `U(0, 1)` if the deviate really follows that
//! distribution. All functions here are pure.

use crate::error::TransformError;
use crate::source::Distribution;

/// `ln(sqrt(2 * pi))`.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Upper bound on series or continued-fraction terms before [`normal_cdf`]
/// gives up.
pub const MAX_SERIES_TERMS: usize = 10_000;

/// Beyond this |x| the tail probability `Φ(−|x|)` is below the smallest
/// normal `f64`, so the CDF saturates to 0 or 1.
pub const NORMAL_SATURATION: f64 = 37.5;

/// Below this |x| the Taylor series is used directly; above it the tail is
/// computed on its own and never by subtraction from 0.5.
const TAIL_CUTOFF: f64 = 3.0;

/// Double-double running sum (Knuth two-sum plus renormalisation).
#[derive(Debug, Clone, Copy, PartialEq)]
struct CompensatedSum {
    hi: f64,
    lo: f64,
}

impl CompensatedSum {
    fn new(value: f64) -> Self {
        Self { hi: value, lo: 0.0 }
    }

    fn add(&mut self, x: f64) {
        let s = self.hi + x;
        let bp = s - self.hi;
        let err = (self.hi - (s - bp)) + (x - bp);
        let lo = self.lo + err;
        let hi = s + lo;
        self.lo = lo - (hi - s);
        self.hi = hi;
    }

    fn value(self) -> f64 {
        self.hi + self.lo
    }
}

/// Standard normal CDF.
///
/// For `|x| < 3` this is Marsaglia (2004): sum the Taylor series
/// `x + x³/3 + x⁵/(3·5) + …` until the running sum reaches a fixed point,
/// then scale by the normal density:
///
/// `Φ(x) = 0.5 + s · exp(−x²/2 − ln√(2π))`
///
/// The sum is carried in double-double precision. Further out the upper tail
/// `Q(t) = Φ(−t)` comes from the Laplace continued fraction for the Mills
/// ratio, and `Φ(x)` is `Q(−x)` or `1 − Q(x)`. Returns exactly 0.5 at zero,
/// keeps full relative precision in the lower tail and saturates to 0 or 1
/// for `|x| > NORMAL_SATURATION`.
pub fn normal_cdf(x: f64) -> Result<f64, TransformError> {
    const NAME: &str = "normal_cdf";
    if !x.is_finite() {
        return Err(TransformError::NonFinite {
            transform: NAME,
            value: x,
        });
    }
    if x > NORMAL_SATURATION {
        return Ok(1.0);
    }
    if x < -NORMAL_SATURATION {
        return Ok(0.0);
    }
    if x.abs() >= TAIL_CUTOFF {
        let tail = upper_tail(x.abs()).ok_or(TransformError::NonConvergence {
            transform: NAME,
            value: x,
            iterations: MAX_SERIES_TERMS,
        })?;
        return Ok(if x < 0.0 { tail } else { 1.0 - tail });
    }

    let q = x * x;
    let mut sum = CompensatedSum::new(x);
    let mut term = x;
    let mut index = 1.0;
    for _ in 0..MAX_SERIES_TERMS {
        let previous = sum;
        index += 2.0;
        term *= q / index;
        sum.add(term);
        if sum == previous {
            let p = 0.5 + sum.value() * (-0.5 * q - LN_SQRT_2PI).exp();
            return Ok(p.clamp(0.0, 1.0));
        }
    }
    Err(TransformError::NonConvergence {
        transform: NAME,
        value: x,
        iterations: MAX_SERIES_TERMS,
    })
}

/// Normal density at `t`, with `t²` split so the bulk of the exponent is
/// exact.
fn normal_density(t: f64) -> f64 {
    let head = (t * 16.0).floor() / 16.0;
    let rest = (t - head) * (t + head);
    (-0.5 * head * head - LN_SQRT_2PI).exp() * (-0.5 * rest).exp()
}

/// `Φ(−t)` for `t ≥ TAIL_CUTOFF`: the density divided by
/// `t + 1/(t + 2/(t + 3/(t + …)))`, evaluated by modified Lentz.
fn upper_tail(t: f64) -> Option<f64> {
    let mut f = t;
    let mut c = t;
    let mut d = 0.0;
    for k in 1..=MAX_SERIES_TERMS {
        let a = k as f64;
        d = 1.0 / (t + a * d);
        c = t + a / c;
        let delta = c * d;
        f *= delta;
        if (delta - 1.0).abs() <= f64::EPSILON {
            return Some(normal_density(t) / f);
        }
    }
    None
}

/// Exp(1) CDF, `1 − e^(−x)` for `x ≥ 0`.
///
/// Evaluated as `−expm1(−x)`: exact zero at zero, and `e^(−x)` underflows to
/// zero for large `x` so the result saturates at 1.
pub fn exponential_cdf(x: f64) -> Result<f64, TransformError> {
    const NAME: &str = "exponential_cdf";
    if !x.is_finite() {
        return Err(TransformError::NonFinite {
            transform: NAME,
            value: x,
        });
    }
    if x < 0.0 {
        return Err(TransformError::OutOfDomain {
            transform: NAME,
            value: x,
        });
    }
    Ok(-(-x).exp_m1())
}

/// Inverse of [`exponential_cdf`]: maps `u ∈ [0, 1)` to `−ln(1 − u)`.
pub fn exponential_inverse(u: f64) -> Result<f64, TransformError> {
    const NAME: &str = "exponential_inverse";
    if !u.is_finite() {
        return Err(TransformError::NonFinite {
            transform: NAME,
            value: u,
        });
    }
    if !(0.0..1.0).contains(&u) {
        return Err(TransformError::OutOfDomain {
            transform: NAME,
            value: u,
        });
    }
    Ok(-(-u).ln_1p())
}

/// A transform a generator adapter can apply to each deviate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// The deviate is already uniform.
    Identity,
    NormalCdf,
    ExponentialCdf,
}

impl Transform {
    /// The transform that uniformises deviates of `distribution`.
    pub fn for_distribution(distribution: Distribution) -> Self {
        match distribution {
            Distribution::Uniform => Self::Identity,
            Distribution::Normal => Self::NormalCdf,
            Distribution::Exponential => Self::ExponentialCdf,
        }
    }

    pub fn apply(self, x: f64) -> Result<f64, TransformError> {
        match self {
            Self::Identity => Ok(x),
            Self::NormalCdf => normal_cdf(x),
            Self::ExponentialCdf => exponential_cdf(x),
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::NormalCdf => write!(f, "normal_cdf"),
            Self::ExponentialCdf => write!(f, "exponential_cdf"),
        }
    }
}
