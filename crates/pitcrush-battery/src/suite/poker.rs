//! Simplified poker test: hands of `k` values in `0..d`, counting the
//! distinct values in each hand.

use pitcrush_core::{Chi2Result, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{Lumping, cell, chi2_summary, draw};

pub const NAME: &str = "SimplePoker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokerParams {
    /// `n` counts hands.
    pub sampling: Sampling,
    /// `d`: distinct card values.
    pub cells: usize,
    /// `k`: cards per hand.
    pub hand: usize,
}

impl PokerParams {
    fn check(&self) -> Result<(), BatteryError> {
        self.sampling.check(NAME)?;
        if self.cells < 2 || self.hand < 2 {
            return Err(BatteryError::invalid(NAME, "need d >= 2 and k >= 2"));
        }
        if self.cells > 1 << 20 || self.hand > 1 << 20 {
            return Err(BatteryError::invalid(NAME, "d and k are limited to 2^20"));
        }
        Ok(())
    }
}

impl std::fmt::Display for PokerParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, d = {}, k = {}", self.sampling, self.cells, self.hand)
    }
}

/// `P(s distinct values)` for `s` in `0..=min(k, d)`.
pub(crate) fn distinct_probabilities(d: usize, k: usize) -> Vec<f64> {
    let top = k.min(d);
    let df = d as f64;
    let mut q = vec![0.0; top + 1];
    q[0] = 1.0;
    for dealt in 0..k {
        for s in (1..=top.min(dealt + 1)).rev() {
            q[s] = q[s] * s as f64 / df + q[s - 1] * (df - s as f64 + 1.0) / df;
        }
        q[0] = 0.0;
    }
    q
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &PokerParams,
) -> Result<TestResult, BatteryError> {
    params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;
    let d = params.cells;

    let probabilities = distinct_probabilities(d, params.hand);
    let lumping = Lumping::new(NAME, &probabilities, n as f64)?;

    // Hand number at which each value was last seen.
    let mut stamp = vec![0usize; d];
    let mut counts = vec![0u64; probabilities.len()];
    let mut statistics = Vec::with_capacity(replications);
    let mut observed = Vec::new();
    let mut hand_id = 0usize;
    for _ in 0..replications {
        counts.iter_mut().for_each(|c| *c = 0);
        for _ in 0..n {
            hand_id += 1;
            let mut distinct = 0;
            for _ in 0..params.hand {
                let v = cell(draw(r#gen, offset_bits)?, d);
                if stamp[v] != hand_id {
                    stamp[v] = hand_id;
                    distinct += 1;
                }
            }
            counts[distinct] += 1;
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
