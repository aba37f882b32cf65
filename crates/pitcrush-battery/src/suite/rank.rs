//! Binary matrix rank: `L × k` matrices over GF(2) built from `s` bits per
//! sample, ranks compared with their exact distribution.

use pitcrush_core::{Chi2Result, TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{BitStream, Lumping, check_bits, chi2_summary};

pub const NAME: &str = "MatrixRank";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankParams {
    /// `n` counts matrices.
    pub sampling: Sampling,
    /// `s`: bits taken from each sample.
    pub bits: u32,
    /// `L`: rows.
    pub rows: usize,
    /// `k`: columns, at most 64.
    pub cols: u32,
}

impl RankParams {
    fn check(&self) -> Result<(), BatteryError> {
        self.sampling.check(NAME)?;
        check_bits(NAME, self.sampling.offset_bits, self.bits)?;
        if self.rows == 0 || self.rows > 1024 || self.cols == 0 || self.cols > 64 {
            return Err(BatteryError::invalid(
                NAME,
                format!(
                    "{} x {} matrices unsupported; need L <= 1024, k <= 64",
                    self.rows, self.cols
                ),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for RankParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, s = {}, L = {}, k = {}",
            self.sampling, self.bits, self.rows, self.cols
        )
    }
}

/// Rank of a matrix over GF(2); row bits are the low `cols` bits.
fn gf2_rank(rows: &mut [u64], cols: u32) -> usize {
    let mut rank = 0;
    for col in (0..cols).rev() {
        let bit = 1u64 << col;
        let Some(pivot) = (rank..rows.len()).find(|&r| rows[r] & bit != 0) else {
            continue;
        };
        rows.swap(rank, pivot);
        let pivot_row = rows[rank];
        for row in rows.iter_mut().skip(rank + 1) {
            if *row & bit != 0 {
                *row ^= pivot_row;
            }
        }
        rank += 1;
        if rank == rows.len() {
            break;
        }
    }
    rank
}

/// `P(rank = x)` for `x` in `0..=min(L, k)` of a random `L × k` matrix.
pub(crate) fn rank_probabilities(rows: usize, cols: usize) -> Vec<f64> {
    let l = rows as f64;
    let k = cols as f64;
    let log2_1m = |e: f64| (-e.exp2()).ln_1p() / std::f64::consts::LN_2;
    (0..=rows.min(cols))
        .map(|x| {
            let xf = x as f64;
            let mut log2_p = xf * (l + k - xf) - l * k;
            for i in 0..x {
                let i = i as f64;
                log2_p += log2_1m(i - l) + log2_1m(i - k) - log2_1m(i - xf);
            }
            log2_p.exp2()
        })
        .collect()
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &RankParams,
) -> Result<TestResult, BatteryError> {
    params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;

    let probabilities = rank_probabilities(params.rows, params.cols as usize);
    let lumping = Lumping::new(NAME, &probabilities, n as f64)?;

    let mut stream = BitStream::new(r#gen, offset_bits, params.bits);
    let mut matrix = vec![0u64; params.rows];
    let mut counts = vec![0u64; probabilities.len()];
    let mut statistics = Vec::with_capacity(replications);
    let mut observed = Vec::new();
    for _ in 0..replications {
        counts.iter_mut().for_each(|c| *c = 0);
        for _ in 0..n {
            for row in matrix.iter_mut() {
                *row = stream.next_bits(params.cols)?;
            }
            counts[gf2_rank(&mut matrix, params.cols)] += 1;
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
    use crate::suite::testing::{Constant, with_uniform};
    use pitcrush_core::GofTest;

    #[test]
    fn gf2_rank_known_matrices() {
        let mut identity = vec![0b100, 0b010, 0b001];
        assert_eq!(gf2_rank(&mut identity, 3), 3);
        let mut dependent = vec![0b110, 0b011, 0b101];
        assert_eq!(gf2_rank(&mut dependent, 3), 2);
        let mut zero = vec![0, 0];
        assert_eq!(gf2_rank(&mut zero, 8), 0);
    }

    #[test]
    fn rank_probabilities_square_32() {
        let probs = rank_probabilities(32, 32);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((probs[32] - 0.2888).abs() < 1e-4);
        assert!((probs[31] - 0.5776).abs() < 1e-4);
    }

    #[test]
    fn rank_probabilities_one_by_one() {
        let probs = rank_probabilities(1, 1);
        assert_eq!(probs.len(), 2);
        assert!(probs.iter().all(|&p| (p - 0.5).abs() < 1e-15));
    }

    #[test]
    fn good_generator_passes() {
        let params = RankParams {
            sampling: Sampling::new(1, 2_000, 0),
            bits: 30,
            rows: 32,
            cols: 32,
        };
        let result = with_uniform(53, |g| run(g, &params)).unwrap();
        let TestResult::Chi2(res) = result else {
            panic!("expected chi2");
        };
        let p = res.gof[GofTest::Mean];
        assert!(p > 0.0001 && p < 0.9999, "p = {p}");
    }

    #[test]
    fn constant_generator_fails() {
        let params = RankParams {
            sampling: Sampling::new(1, 1_000, 0),
            bits: 16,
            rows: 16,
            cols: 16,
        };
        // Identical rows: rank one.
        let result = run(&mut Constant(0.7), &params).unwrap();
        let TestResult::Chi2(res) = result else {
            panic!("expected chi2");
        };
        assert!(res.gof[GofTest::Mean] < 1e-10);
    }
}
