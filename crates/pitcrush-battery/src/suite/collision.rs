//! Knuth's collision test: `n` points thrown into `k = d^t` cells; the
//! number of collisions is compared with its exact mean and variance
//! (normal approximation) and with a Poisson law of the same mean.

use pitcrush_core::{BasicResult, KnuthPoissonResult, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{cell, draw, normal_summary, poisson_result};

pub const NAME: &str = "Collision";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionParams {
    pub sampling: Sampling,
    /// `d`: divisions per coordinate.
    pub cells: u64,
    /// `t`: coordinates per point.
    pub dims: u32,
}

impl CollisionParams {
    /// Choose a power-of-two `d` so the expected collision count is near
    /// `expected`.
    pub fn for_expected(sampling: Sampling, dims: u32, expected: f64) -> Self {
        let dims = dims.max(1);
        let n = sampling.n as f64;
        let log2_k = (n * n / (2.0 * expected)).log2();
        let max_bits = (62 / dims).min(53 - sampling.offset_bits.min(52));
        let bits = ((log2_k / dims as f64).round() as u32).clamp(1, max_bits);
        Self {
            sampling,
            cells: 1u64 << bits,
            dims,
        }
    }

    /// Total cell count `k = d^t`.
    pub fn total_cells(&self) -> Option<u64> {
        self.cells
            .checked_pow(self.dims)
            .filter(|&k| k <= 1u64 << 62)
    }

    fn check(&self) -> Result<u64, BatteryError> {
        self.sampling.check(NAME)?;
        if self.cells < 2 || self.dims == 0 {
            return Err(BatteryError::invalid(NAME, "need d >= 2 and t >= 1"));
        }
        self.total_cells().ok_or_else(|| {
            BatteryError::invalid(
                NAME,
                format!("d^t = {}^{} exceeds 2^62 cells", self.cells, self.dims),
            )
        })
    }
}

impl std::fmt::Display for CollisionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, d = {}, t = {}", self.sampling, self.cells, self.dims)
    }
}

/// Exact mean and variance of the collision count for `n` balls in `k` urns.
pub(crate) fn collision_moments(n: f64, k: f64) -> (f64, f64) {
    let a = n * (-1.0 / k).ln_1p();
    let mean = k * a.exp_m1() + n;
    let pair = (n * (-1.0 / (k - 1.0)).ln_1p()).exp_m1();
    let square = (n * (-1.0 / ((k - 1.0) * (k - 1.0))).ln_1p()).exp_m1();
    let variance = -k * a.exp() * pair + k * k * (2.0 * a).exp() * square;
    (mean, variance)
}

fn count_collisions(points: &mut [u64]) -> u64 {
    points.sort_unstable();
    points.windows(2).filter(|w| w[0] == w[1]).count() as u64
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &CollisionParams,
) -> Result<TestResult, BatteryError> {
    let k = params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;
    let d = params.cells as usize;

    let (mean, variance) = collision_moments(n as f64, k as f64);
    if !(variance > 0.0 && variance.is_finite()) {
        return Err(BatteryError::distribution(
            NAME,
            format!("degenerate collision variance {variance} for n = {n}, k = {k}"),
        ));
    }
    let sd = variance.sqrt();
    log::debug!("{NAME}: k = {k}, mean = {mean:.3}, sd = {sd:.3}");

    let mut points = Vec::with_capacity(n);
    let mut z_scores = Vec::with_capacity(replications);
    let mut total = 0u64;
    for _ in 0..replications {
        points.clear();
        for _ in 0..n {
            let mut index = 0u64;
            for _ in 0..params.dims {
                index = index * params.cells + cell(draw(r#gen, offset_bits)?, d) as u64;
            }
            points.push(index);
        }
        let collisions = count_collisions(&mut points);
        z_scores.push((collisions as f64 - mean) / sd);
        total += collisions;
    }

    let basic = BasicResult {
        replications,
        gof: normal_summary(NAME, &z_scores)?,
    };
    let poisson = poisson_result(NAME, mean, replications, total)?;
    Ok(TestResult::KnuthPoisson(KnuthPoissonResult { basic, poisson }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::testing::{Constant, with_uniform};
    use pitcrush_core::{GofTest, extract_p_values};

    #[test]
    fn moments_small_case() {
        // Two balls, two urns: one collision with probability 1/2.
        let (mean, variance) = collision_moments(2.0, 2.0);
        assert!((mean - 0.5).abs() < 1e-12);
        assert!((variance - 0.25).abs() < 1e-12);
    }

    #[test]
    fn moments_sparse_limit() {
        let n = 10_000.0;
        let k = 2f64.powi(32);
        let (mean, variance) = collision_moments(n, k);
        let lambda = n * n / (2.0 * k);
        assert!((mean - lambda).abs() / lambda < 1e-3);
        assert!((variance - lambda).abs() / lambda < 1e-2);
    }

    #[test]
    fn count_collisions_after_sort() {
        let mut pts = vec![5, 1, 5, 3, 1, 5];
        assert_eq!(count_collisions(&mut pts), 3);
    }

    #[test]
    fn for_expected_picks_power_of_two() {
        let params = CollisionParams::for_expected(Sampling::new(1, 10_000, 0), 1, 100.0);
        assert_eq!(params.cells, 1 << 19);
        assert_eq!(params.total_cells(), Some(1 << 19));
    }

    #[test]
    fn good_generator_passes() {
        let params = CollisionParams::for_expected(Sampling::new(2, 20_000, 0), 2, 100.0);
        let result = with_uniform(23, |g| run(g, &params)).unwrap();
        let TestResult::KnuthPoisson(res) = &result else {
            panic!("expected a collision result");
        };
        assert_eq!(res.basic.replications, 2);
        let p = res.basic.gof[GofTest::Mean];
        assert!(p > 0.0001 && p < 0.9999, "p = {p}");
        assert_eq!(extract_p_values(&result).unwrap().values().len(), 1);
    }

    #[test]
    fn constant_generator_fails() {
        let params = CollisionParams::for_expected(Sampling::new(1, 2_000, 0), 1, 10.0);
        let result = run(&mut Constant(0.125), &params).unwrap();
        let TestResult::KnuthPoisson(res) = &result else {
            panic!("expected a collision result");
        };
        assert_eq!(res.poisson.observed, 1999.0);
        assert!(res.poisson.p_value < 1e-10);
        assert!(res.basic.gof[GofTest::Mean] < 1e-10);
    }

    #[test]
    fn rejects_overflowing_cell_count() {
        let params = CollisionParams {
            sampling: Sampling::new(1, 100, 0),
            cells: 1 << 32,
            dims: 2,
        };
        assert!(matches!(
            run(&mut Constant(0.5), &params),
            Err(BatteryError::InvalidParameters { .. })
        ));
    }
}
