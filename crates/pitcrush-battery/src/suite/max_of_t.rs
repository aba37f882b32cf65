//! Maximum of `t`: for groups of `t` uniforms, `max^t` is uniform. Tested
//! with a `d`-cell chi-square and with Anderson-Darling on the values.

use pitcrush_core::{BasicResult, Chi2Result, KnuthBasicResult, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{Lumping, anderson_darling, anderson_darling_summary, cell, chi2_summary, draw};

pub const NAME: &str = "MaxOft";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxOfTParams {
    /// `n` counts groups.
    pub sampling: Sampling,
    /// `d`: chi-square cells.
    pub cells: usize,
    /// `t`: values per group.
    pub group: u32,
}

impl MaxOfTParams {
    fn check(&self) -> Result<(), BatteryError> {
        self.sampling.check(NAME)?;
        if self.cells < 2 || self.group == 0 {
            return Err(BatteryError::invalid(NAME, "need d >= 2 and t >= 1"));
        }
        if self.group > 1 << 16 {
            return Err(BatteryError::invalid(NAME, "t is limited to 65536"));
        }
        Ok(())
    }
}

impl std::fmt::Display for MaxOfTParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, d = {}, t = {}", self.sampling, self.cells, self.group)
    }
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &MaxOfTParams,
) -> Result<TestResult, BatteryError> {
    params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;
    let d = params.cells;

    let probabilities = vec![1.0 / d as f64; d];
    let lumping = Lumping::new(NAME, &probabilities, n as f64)?;

    let mut values = Vec::with_capacity(n);
    let mut counts = vec![0u64; d];
    let mut chi2_stats = Vec::with_capacity(replications);
    let mut ad_stats = Vec::with_capacity(replications);
    let mut observed = Vec::new();
    for _ in 0..replications {
        values.clear();
        counts.iter_mut().for_each(|c| *c = 0);
        for _ in 0..n {
            let mut max = 0.0f64;
            for _ in 0..params.group {
                max = max.max(draw(r#gen, offset_bits)?);
            }
            let v = max.powi(params.group as i32);
            counts[cell(v, d)] += 1;
            values.push(v);
        }
        observed = lumping.lump(&counts);
        chi2_stats.push(lumping.chi2(&observed));
        values.sort_by(|a, b| a.total_cmp(b));
        ad_stats.push(anderson_darling(&values));
    }

    let chi2 = Chi2Result {
        replications,
        degrees_of_freedom: lumping.degrees_of_freedom(),
        observed,
        expected: lumping.expected().to_vec(),
        gof: chi2_summary(NAME, lumping.degrees_of_freedom(), &chi2_stats)?,
    };
    let basic = BasicResult {
        replications,
        gof: anderson_darling_summary(&ad_stats),
    };
    Ok(TestResult::KnuthBasic(KnuthBasicResult { basic, chi2 }))
}
