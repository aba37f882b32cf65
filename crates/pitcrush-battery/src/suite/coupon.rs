//! Coupon collector: the number of draws needed to see all `d` values.

use pitcrush_core::{Chi2Result, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{Lumping, MIN_EXPECTED, cell, chi2_summary, draw};

pub const NAME: &str = "CouponCollector";

/// Segment lengths are never tracked beyond this.
const MAX_LENGTH: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponParams {
    /// `n` counts collected segments.
    pub sampling: Sampling,
    /// `d`: distinct coupon values.
    pub cells: usize,
}

impl CouponParams {
    fn check(&self) -> Result<(), BatteryError> {
        self.sampling.check(NAME)?;
        if !(2..=1 << 12).contains(&self.cells) {
            return Err(BatteryError::invalid(
                NAME,
                format!("d = {} must be in 2..=4096", self.cells),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for CouponParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, d = {}", self.sampling, self.cells)
    }
}

/// `P(length = j)` for `j < T` followed by `P(length >= T)`, with `T` the
/// first length whose tail expects fewer than [`MIN_EXPECTED`] segments.
pub(crate) fn length_probabilities(d: usize, n: usize) -> Vec<f64> {
    let df = d as f64;
    // q[s]: probability of s distinct values without completing.
    let mut q = vec![0.0; d];
    q[0] = 1.0;
    let mut probs = vec![0.0];
    for j in 1..MAX_LENGTH {
        probs.push(q[d - 1] / df);
        for s in (1..=(d - 1).min(j)).rev() {
            q[s] = q[s] * s as f64 / df + q[s - 1] * (df - s as f64 + 1.0) / df;
        }
        q[0] = 0.0;
        let tail: f64 = q.iter().sum();
        if j >= d && tail * (n as f64) < MIN_EXPECTED {
            probs.push(tail);
            return probs;
        }
    }
    let tail: f64 = q.iter().sum();
    probs.push(tail);
    probs
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &CouponParams,
) -> Result<TestResult, BatteryError> {
    params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;
    let d = params.cells;

    let probabilities = length_probabilities(d, n);
    let limit = probabilities.len() - 1;
    let lumping = Lumping::new(NAME, &probabilities, n as f64)?;
    log::debug!("{NAME}: lengths tracked up to {limit}");

    let mut stamp = vec![0usize; d];
    let mut segment_id = 0usize;
    let mut counts = vec![0u64; probabilities.len()];
    let mut statistics = Vec::with_capacity(replications);
    let mut observed = Vec::new();
    for _ in 0..replications {
        counts.iter_mut().for_each(|c| *c = 0);
        for _ in 0..n {
            segment_id += 1;
            let mut seen = 0;
            let mut length = 0;
            loop {
                let v = cell(draw(r#gen, offset_bits)?, d);
                length += 1;
                if stamp[v] != segment_id {
                    stamp[v] = segment_id;
                    seen += 1;
                }
                if seen == d {
                    counts[length] += 1;
                    break;
                }
                if length == limit - 1 {
                    counts[limit] += 1;
                    break;
                }
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
