//! Hamming independence: Hamming weights of successive `L`-bit blocks
//! should be independent. Pairs of weights fill a two-way table tested by
//! chi-square.

use pitcrush_core::{BasicResult, StringResult, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{BitStream, Lumping, MIN_EXPECTED, check_bits, chi2_statistic, chi2_summary};
use crate::suite::weight::binomial_probabilities;

pub const NAME: &str = "HammingIndep";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HammingParams {
    /// `n` counts block pairs.
    pub sampling: Sampling,
    /// `s`: bits taken from each sample.
    pub bits: u32,
    /// `L`: bits per block.
    pub block: usize,
}

impl HammingParams {
    fn check(&self) -> Result<(), BatteryError> {
        self.sampling.check(NAME)?;
        check_bits(NAME, self.sampling.offset_bits, self.bits)?;
        if !(2..=1 << 16).contains(&self.block) {
            return Err(BatteryError::invalid(
                NAME,
                format!("L = {} must be in 2..=65536", self.block),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for HammingParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, s = {}, L = {}", self.sampling, self.bits, self.block)
    }
}

fn block_weight<G: UniformGenerator + ?Sized>(
    stream: &mut BitStream<'_, G>,
    block: usize,
) -> Result<usize, BatteryError> {
    let mut weight = 0;
    let mut left = block;
    while left > 0 {
        let take = left.min(64);
        weight += stream.next_bits(take as u32)?.count_ones() as usize;
        left -= take;
    }
    Ok(weight)
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &HammingParams,
) -> Result<TestResult, BatteryError> {
    params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;

    // Lump the marginal so every cell of the product table expects enough.
    let n_marginal = (MIN_EXPECTED * n as f64).sqrt();
    let marginal = binomial_probabilities(NAME, 0.5, params.block)?;
    let lumping = Lumping::new(NAME, &marginal, n_marginal)?;
    let c = lumping.len();
    let class_p: Vec<f64> = lumping.expected().iter().map(|e| e / n_marginal).collect();
    let expected: Vec<f64> = class_p
        .iter()
        .flat_map(|&a| class_p.iter().map(move |&b| a * b * n as f64))
        .collect();
    let df = c * c - 1;
    log::debug!("{NAME}: {c} weight classes, {df} degrees of freedom");

    let mut stream = BitStream::new(r#gen, offset_bits, params.bits);
    let mut table = vec![0u64; c * c];
    let mut statistics = Vec::with_capacity(replications);
    for _ in 0..replications {
        table.iter_mut().for_each(|t| *t = 0);
        for _ in 0..n {
            let first = lumping.class_of(block_weight(&mut stream, params.block)?);
            let second = lumping.class_of(block_weight(&mut stream, params.block)?);
            table[first * c + second] += 1;
        }
        statistics.push(chi2_statistic(&table, &expected));
    }

    Ok(TestResult::String(StringResult {
        basic: BasicResult {
            replications,
            gof: chi2_summary(NAME, df, &statistics)?,
        },
        classes: lumping.classes().to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::testing::{Constant, with_uniform};
    use pitcrush_core::{GofTest, extract_p_values};

    fn params(n: usize, block: usize) -> HammingParams {
        HammingParams {
            sampling: Sampling::new(1, n, 0),
            bits: 30,
            block,
        }
    }

    #[test]
    fn good_generator_passes() {
        let result = with_uniform(59, |g| run(g, &params(20_000, 64))).unwrap();
        let TestResult::String(res) = &result else {
            panic!("expected string result");
        };
        assert!(res.classes.len() >= 2);
        assert_eq!(res.classes.first().map(|c| c.0), Some(0));
        assert_eq!(res.classes.last().map(|c| c.1), Some(64));
        let p = extract_p_values(&result).unwrap().values()[0];
        assert!(p > 0.0001 && p < 0.9999, "p = {p}");
    }

    #[test]
    fn constant_generator_fails() {
        let result = run(&mut Constant(0.5), &params(2_000, 30)).unwrap();
        let TestResult::String(res) = result else {
            panic!("expected string result");
        };
        assert!(res.basic.gof[GofTest::Mean] < 1e-10);
    }

    #[test]
    fn rejects_short_block() {
        assert!(run(&mut Constant(0.5), &params(100, 1)).is_err());
    }
}
