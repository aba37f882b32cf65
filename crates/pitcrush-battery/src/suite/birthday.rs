//! Birthday spacings: points in a `t`-dimensional grid of `2^(t·bits)`
//! cells; the number of repeated spacings between sorted points is
//! asymptotically Poisson with mean `n³ / (4k)`.

use pitcrush_core::{TestResult, UniformGenerator};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{bits_of, draw, poisson_result};

pub const NAME: &str = "BirthdaySpacings";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BirthdayParams {
    pub sampling: Sampling,
    /// `t`: coordinates per point.
    pub dims: u32,
    /// Bits per coordinate.
    pub bits: u32,
}

impl BirthdayParams {
    /// Choose `bits` so the expected collision count is near `lambda`.
    pub fn for_lambda(sampling: Sampling, dims: u32, lambda: f64) -> Self {
        let n = sampling.n as f64;
        let log2_cells = (n.powi(3) / (4.0 * lambda)).log2();
        let max_bits = (62 / dims.max(1)).min(32);
        let bits = ((log2_cells / dims.max(1) as f64).round() as u32).clamp(1, max_bits);
        Self {
            sampling,
            dims,
            bits,
        }
    }

    /// Expected repeated spacings per replication.
    pub fn lambda(&self) -> f64 {
        let n = self.sampling.n as f64;
        let cells = 2f64.powi((self.dims * self.bits) as i32);
        n.powi(3) / (4.0 * cells)
    }

    fn check(&self) -> Result<(), BatteryError> {
        self.sampling.check(NAME)?;
        if self.dims == 0 || self.bits == 0 {
            return Err(BatteryError::invalid(NAME, "t and bits must be positive"));
        }
        if self.dims * self.bits > 62 {
            return Err(BatteryError::invalid(
                NAME,
                format!("t · bits = {} exceeds 62", self.dims * self.bits),
            ));
        }
        if self.bits > 32 || self.sampling.offset_bits + self.bits > 53 {
            return Err(BatteryError::invalid(
                NAME,
                format!(
                    "r + bits = {} exceeds the 53 bits of a double",
                    self.sampling.offset_bits + self.bits
                ),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for BirthdayParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, t = {}, bits = {}", self.sampling, self.dims, self.bits)
    }
}

/// Repeated values among the sorted spacings of sorted cells.
fn spacing_collisions(cells: &mut [u64]) -> u64 {
    cells.sort_unstable();
    let mut spacings: Vec<u64> = cells.windows(2).map(|w| w[1] - w[0]).collect();
    spacings.sort_unstable();
    spacings.windows(2).filter(|w| w[0] == w[1]).count() as u64
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &BirthdayParams,
) -> Result<TestResult, BatteryError> {
    params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;

    let mut cells = Vec::with_capacity(n);
    let mut total = 0u64;
    for rep in 0..replications {
        cells.clear();
        for _ in 0..n {
            let mut cell = 0u64;
            for _ in 0..params.dims {
                cell = (cell << params.bits) | bits_of(draw(r#gen, offset_bits)?, params.bits);
            }
            cells.push(cell);
        }
        let collisions = spacing_collisions(&mut cells);
        log::debug!("{NAME} replication {rep}: {collisions} collisions");
        total += collisions;
    }

    Ok(TestResult::Poisson(poisson_result(
        NAME,
        params.lambda(),
        replications,
        total,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::testing::{Constant, with_uniform};
    use pitcrush_core::extract_p_values;

    #[test]
    fn spacing_collisions_counts_repeats() {
        // Spacings 2, 2, 3, 2 -> sorted 2, 2, 2, 3 -> two repeats.
        let mut cells = vec![9, 0, 2, 4, 7];
        assert_eq!(spacing_collisions(&mut cells), 2);
    }

    #[test]
    fn for_lambda_targets_expected_count() {
        let params = BirthdayParams::for_lambda(Sampling::new(1, 5_000_000, 0), 2, 27.0);
        assert_eq!(params.bits, 30);
        assert!((params.lambda() - 27.1).abs() < 0.1);
    }

    #[test]
    fn good_generator_passes() {
        let params = BirthdayParams::for_lambda(Sampling::new(1, 20_000, 0), 2, 16.0);
        let result = with_uniform(17, |g| run(g, &params)).unwrap();
        let TestResult::Poisson(res) = &result else {
            panic!("expected a Poisson result");
        };
        assert_eq!(res.mu, params.lambda());
        let p = extract_p_values(&result).unwrap().values()[0];
        assert!(p > 0.001 && p < 0.999, "p = {p}");
    }

    #[test]
    fn constant_generator_fails() {
        let params = BirthdayParams::for_lambda(Sampling::new(1, 1_000, 0), 1, 4.0);
        let result = run(&mut Constant(0.25), &params).unwrap();
        let p = extract_p_values(&result).unwrap().values()[0];
        assert!(p < 1e-10, "p = {p}");
    }

    #[test]
    fn rejects_oversized_grid() {
        let params = BirthdayParams {
            sampling: Sampling::new(1, 100, 0),
            dims: 3,
            bits: 30,
        };
        assert!(matches!(
            run(&mut Constant(0.5), &params),
            Err(BatteryError::InvalidParameters { .. })
        ));
    }
}
