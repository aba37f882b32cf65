//! The individual tests of the battery.
//!
//! Every test takes a [`UniformGenerator`](pitcrush_core::UniformGenerator)
//! and a parameter struct and returns one
//! [`TestResult`](pitcrush_core::TestResult). All share [`Sampling`]: `N`
//! replications of `n` observations, reading samples with their `r` leading
//! bits dropped.

pub mod birthday;
pub mod collision;
pub mod coupon;
pub mod gap;
pub mod hamming;
pub mod max_of_t;
pub mod poker;
pub mod rank;
pub mod walk;
pub mod weight;

use serde::{Deserialize, Serialize};

use crate::error::BatteryError;

pub use birthday::BirthdayParams;
pub use collision::CollisionParams;
pub use coupon::CouponParams;
pub use gap::GapParams;
pub use hamming::HammingParams;
pub use max_of_t::MaxOfTParams;
pub use poker::PokerParams;
pub use rank::RankParams;
pub use walk::WalkParams;
pub use weight::WeightParams;

/// Replication count, sample count and dropped leading bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampling {
    /// `N`: independent replications of the test.
    pub replications: usize,
    /// `n`: observations per replication.
    pub n: usize,
    /// `r`: leading bits dropped from each sample.
    pub offset_bits: u32,
}

impl Sampling {
    pub const fn new(replications: usize, n: usize, offset_bits: u32) -> Self {
        Self {
            replications,
            n,
            offset_bits,
        }
    }

    pub(crate) fn check(&self, test: &'static str) -> Result<(), BatteryError> {
        if self.replications == 0 {
            return Err(BatteryError::invalid(test, "N must be at least 1"));
        }
        if self.n < 2 {
            return Err(BatteryError::invalid(test, "n must be at least 2"));
        }
        if self.offset_bits > 52 {
            return Err(BatteryError::invalid(
                test,
                format!("r = {} leaves no bits of a double", self.offset_bits),
            ));
        }
        Ok(())
    }

    /// Same sampling with `n` multiplied by `factor`, never below `floor`.
    pub(crate) fn scaled(self, factor: f64, floor: usize) -> Self {
        let n = ((self.n as f64 * factor).round() as usize).max(floor);
        Self { n, ..self }
    }
}

impl std::fmt::Display for Sampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N = {}, n = {}, r = {}",
            self.replications, self.n, self.offset_bits
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_check() {
        assert!(Sampling::new(1, 100, 0).check("t").is_ok());
        assert!(Sampling::new(0, 100, 0).check("t").is_err());
        assert!(Sampling::new(1, 1, 0).check("t").is_err());
        assert!(Sampling::new(1, 100, 53).check("t").is_err());
    }

    #[test]
    fn sampling_scaled_respects_floor() {
        let s = Sampling::new(2, 1000, 5).scaled(0.01, 50);
        assert_eq!(s, Sampling::new(2, 50, 5));
        assert_eq!(Sampling::new(1, 1000, 0).scaled(2.0, 1).n, 2000);
    }

    #[test]
    fn sampling_display() {
        assert_eq!(Sampling::new(1, 10, 3).to_string(), "N = 1, n = 10, r = 3");
    }
}
