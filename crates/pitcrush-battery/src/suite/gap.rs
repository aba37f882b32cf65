//! Gap test: lengths of runs of samples outside `[alpha, beta)` between
//! hits inside it are geometric with parameter `beta - alpha`.

use pitcrush_core::{Chi2Result, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{Lumping, MIN_EXPECTED, chi2_summary, draw};

pub const NAME: &str = "Gap";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapParams {
    /// `n` counts gaps, not draws.
    pub sampling: Sampling,
    pub alpha: f64,
    pub beta: f64,
}

impl GapParams {
    fn check(&self) -> Result<f64, BatteryError> {
        self.sampling.check(NAME)?;
        if !(0.0 <= self.alpha && self.alpha < self.beta && self.beta <= 1.0) {
            return Err(BatteryError::invalid(
                NAME,
                format!("need 0 <= alpha < beta <= 1, got [{}, {})", self.alpha, self.beta),
            ));
        }
        let p = self.beta - self.alpha;
        if p >= 1.0 {
            return Err(BatteryError::invalid(NAME, "the interval covers [0, 1)"));
        }
        Ok(p)
    }
}

impl std::fmt::Display for GapParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, interval = [{}, {})", self.sampling, self.alpha, self.beta)
    }
}

/// Longest tracked gap: beyond it the geometric tail expects under
/// [`MIN_EXPECTED`] hits.
fn max_gap(p: f64, n: usize) -> usize {
    let t = ((MIN_EXPECTED / n as f64).ln() / (-p).ln_1p()).ceil();
    if t.is_finite() && t >= 1.0 { t as usize } else { 1 }
}

/// `P(gap = j)` for `j < t` and `P(gap >= t)` in the last cell.
fn gap_probabilities(p: f64, t: usize) -> Vec<f64> {
    let q = 1.0 - p;
    let mut probs = Vec::with_capacity(t + 1);
    let mut tail = 1.0;
    for _ in 0..t {
        probs.push(p * tail);
        tail *= q;
    }
    probs.push(tail);
    probs
}

pub fn run(r#gen: &mut dyn UniformGenerator, params: &GapParams) -> Result<TestResult, BatteryError> {
    let p = params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;

    let t = max_gap(p, n);
    let lumping = Lumping::new(NAME, &gap_probabilities(p, t), n as f64)?;
    let cap = (100.0 * n as f64 / p) as u64 + 1_000_000;

    let mut counts = vec![0u64; t + 1];
    let mut statistics = Vec::with_capacity(replications);
    let mut observed = Vec::new();
    for rep in 0..replications {
        counts.iter_mut().for_each(|c| *c = 0);
        let mut gaps = 0;
        let mut length = 0usize;
        let mut draws = 0u64;
        while gaps < n {
            draws += 1;
            if draws > cap {
                log::warn!(
                    "{NAME} replication {rep}: {gaps} of {n} gaps after {cap} draws, stopping early"
                );
                break;
            }
            let u = draw(r#gen, offset_bits)?;
            if params.alpha <= u && u < params.beta {
                counts[length.min(t)] += 1;
                gaps += 1;
                length = 0;
            } else {
                length += 1;
            }
        }
        observed = lumping.lump(&counts);
        statistics.push(lumping.chi2(&observed));
    }

    Ok(TestResult::Chi2(Chi2Result {
        replications,
        degrees_of_freedom: lumping.degrees_of_freedom(),
        observed,
        expected: lumping.expected().to_vec(),
        gof: chi2_summary(NAME, lumping.degrees_of_freedom(), &statistics)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::testing::{Constant, FailsAfter, with_uniform};
    use pitcrush_core::GofTest;

    fn params(n: usize, alpha: f64, beta: f64) -> GapParams {
        GapParams {
            sampling: Sampling::new(1, n, 0),
            alpha,
            beta,
        }
    }

    #[test]
    fn probabilities_sum_to_one() {
        let probs = gap_probabilities(0.1, 50);
        assert_eq!(probs.len(), 51);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((probs[0] - 0.1).abs() < 1e-15);
    }

    #[test]
    fn max_gap_tail_expectation() {
        let t = max_gap(1.0 / 256.0, 200_000);
        let tail = (1.0f64 - 1.0 / 256.0).powi(t as i32) * 200_000.0;
        assert!(tail < MIN_EXPECTED && tail > MIN_EXPECTED * 0.99, "t = {t}");
    }

    #[test]
    fn good_generator_passes() {
        let result =
            with_uniform(5, |g| run(g, &params(20_000, 0.0, 1.0 / 16.0))).unwrap();
        let TestResult::Chi2(res) = result else {
            panic!("expected chi2");
        };
        let p = res.gof[GofTest::Mean];
        assert!(p > 0.0001 && p < 0.9999, "p = {p}");
        assert_eq!(res.observed.iter().sum::<u64>(), 20_000);
    }

    #[test]
    fn constant_inside_interval_fails() {
        let result = run(&mut Constant(0.1), &params(2_000, 0.0, 0.25)).unwrap();
        let TestResult::Chi2(res) = result else {
            panic!("expected chi2");
        };
        assert!(res.gof[GofTest::Mean] < 1e-10);
    }

    #[test]
    fn constant_outside_interval_stops_at_cap() {
        let result = run(&mut Constant(0.9), &params(1_000, 0.0, 0.25)).unwrap();
        let TestResult::Chi2(res) = result else {
            panic!("expected chi2");
        };
        assert_eq!(res.observed.iter().sum::<u64>(), 0);
        assert!(res.gof[GofTest::Mean] < 1e-10);
    }

    #[test]
    fn generator_error_propagates() {
        assert!(matches!(
            run(&mut FailsAfter(10), &params(1_000, 0.0, 0.25)),
            Err(BatteryError::Generator(_))
        ));
    }

    #[test]
    fn rejects_bad_interval() {
        assert!(run(&mut Constant(0.5), &params(1_000, 0.5, 0.5)).is_err());
        assert!(run(&mut Constant(0.5), &params(1_000, 0.0, 1.0)).is_err());
    }
}
