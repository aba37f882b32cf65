//! Weight distribution: the number of samples out of `k` falling in
//! `[alpha, beta)` is binomial.

use pitcrush_core::{Chi2Result, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Binomial, Discrete};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{Lumping, chi2_summary, draw};

pub const NAME: &str = "WeightDistrib";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightParams {
    /// `n` counts groups.
    pub sampling: Sampling,
    /// `k`: samples per group.
    pub group: usize,
    pub alpha: f64,
    pub beta: f64,
}

impl WeightParams {
    fn check(&self) -> Result<f64, BatteryError> {
        self.sampling.check(NAME)?;
        if self.group == 0 {
            return Err(BatteryError::invalid(NAME, "k must be positive"));
        }
        if !(0.0 <= self.alpha && self.alpha < self.beta && self.beta <= 1.0) {
            return Err(BatteryError::invalid(
                NAME,
                format!("need 0 <= alpha < beta <= 1, got [{}, {})", self.alpha, self.beta),
            ));
        }
        Ok(self.beta - self.alpha)
    }
}

impl std::fmt::Display for WeightParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, k = {}, interval = [{}, {})",
            self.sampling, self.group, self.alpha, self.beta
        )
    }
}

/// Binomial pmf over `0..=k`.
pub(crate) fn binomial_probabilities(
    test: &'static str,
    p: f64,
    k: usize,
) -> Result<Vec<f64>, BatteryError> {
    let law = Binomial::new(p, k as u64).map_err(|e| BatteryError::distribution(test, e))?;
    Ok((0..=k as u64).map(|j| law.pmf(j)).collect())
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &WeightParams,
) -> Result<TestResult, BatteryError> {
    let p = params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;

    let probabilities = binomial_probabilities(NAME, p, params.group)?;
    let lumping = Lumping::new(NAME, &probabilities, n as f64)?;

    let mut counts = vec![0u64; params.group + 1];
    let mut statistics = Vec::with_capacity(replications);
    let mut observed = Vec::new();
    for _ in 0..replications {
        counts.iter_mut().for_each(|c| *c = 0);
        for _ in 0..n {
            let mut weight = 0;
            for _ in 0..params.group {
                let u = draw(r#gen, offset_bits)?;
                if params.alpha <= u && u < params.beta {
                    weight += 1;
                }
            }
            counts[weight] += 1;
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
