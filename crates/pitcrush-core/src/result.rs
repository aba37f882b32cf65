//! Result records produced by a test battery.
//!
//! Every test produces one [`TestResult`]. The shapes differ by test family,
//! but each scalar sub-test carries its canonical p-value in the
//! [`GofTest::Mean`] slot of a [`GofSummary`], or, for Poisson-count tests,
//! in [`PoissonResult::p_value`].

use serde::Serialize;

/// Goodness-of-fit positions recorded for each sub-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GofTest {
    /// One-sided Kolmogorov-Smirnov D+ over replication p-values.
    KsPlus,
    /// One-sided Kolmogorov-Smirnov D- over replication p-values.
    KsMinus,
    /// Anderson-Darling A² over replication p-values.
    AndersonDarling,
    /// The sum of the replication statistics against its exact law.
    Mean,
}

impl GofTest {
    pub const COUNT: usize = 4;
    pub const ALL: [GofTest; Self::COUNT] = [
        Self::KsPlus,
        Self::KsMinus,
        Self::AndersonDarling,
        Self::Mean,
    ];

    fn index(self) -> usize {
        match self {
            Self::KsPlus => 0,
            Self::KsMinus => 1,
            Self::AndersonDarling => 2,
            Self::Mean => 3,
        }
    }
}

/// Statistic and p-value per [`GofTest`] position. Undefined slots are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GofSummary {
    statistics: [f64; GofTest::COUNT],
    p_values: [f64; GofTest::COUNT],
}

impl GofSummary {
    pub fn undefined() -> Self {
        Self {
            statistics: [f64::NAN; GofTest::COUNT],
            p_values: [f64::NAN; GofTest::COUNT],
        }
    }

    /// A summary with only the mean position filled, as for one replication.
    pub fn single(statistic: f64, p_value: f64) -> Self {
        let mut summary = Self::undefined();
        summary.set(GofTest::Mean, statistic, p_value);
        summary
    }

    pub fn set(&mut self, test: GofTest, statistic: f64, p_value: f64) {
        self.statistics[test.index()] = statistic;
        self.p_values[test.index()] = p_value;
    }

    pub fn statistic(&self, test: GofTest) -> f64 {
        self.statistics[test.index()]
    }

    pub fn p_value(&self, test: GofTest) -> f64 {
        self.p_values[test.index()]
    }
}

impl std::ops::Index<GofTest> for GofSummary {
    type Output = f64;

    /// Indexing yields the p-value at that position.
    fn index(&self, test: GofTest) -> &f64 {
        &self.p_values[test.index()]
    }
}

/// A continuous-statistic sub-test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicResult {
    pub replications: usize,
    pub gof: GofSummary,
}

/// A chi-square sub-test over lumped cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chi2Result {
    pub replications: usize,
    pub degrees_of_freedom: usize,
    /// Observed counts per lumped cell, last replication.
    pub observed: Vec<u64>,
    /// Expected counts per lumped cell.
    pub expected: Vec<f64>,
    pub gof: GofSummary,
}

/// A Poisson-count sub-test, summed over replications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoissonResult {
    /// Expected count per replication.
    pub lambda: f64,
    /// Expected total count.
    pub mu: f64,
    /// Observed total count.
    pub observed: f64,
    pub p_left: f64,
    pub p_right: f64,
    /// Two-sided p-value derived from `p_left` and `p_right`.
    pub p_value: f64,
}

/// Max-of-t style result: a continuous summary plus a chi-square histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnuthBasicResult {
    pub basic: BasicResult,
    pub chi2: Chi2Result,
}

/// Collision style result: a normal approximation plus a Poisson count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnuthPoissonResult {
    pub basic: BasicResult,
    pub poisson: PoissonResult,
}

/// Bit-string test result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringResult {
    pub basic: BasicResult,
    /// Inclusive Hamming-weight ranges of the lumped classes.
    pub classes: Vec<(usize, usize)>,
}

/// Random-walk result: five statistics per walk length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkResult {
    pub lengths: Vec<usize>,
    /// Number of +1 steps.
    pub h: Vec<Chi2Result>,
    /// Maximum position.
    pub m: Vec<Chi2Result>,
    /// Steps spent above the axis.
    pub j: Vec<Chi2Result>,
    /// Returns to the origin.
    pub r: Vec<Chi2Result>,
    /// Sign changes.
    pub c: Vec<Chi2Result>,
}

/// One test's result, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum TestResult {
    Poisson(PoissonResult),
    Chi2(Chi2Result),
    KnuthBasic(KnuthBasicResult),
    KnuthPoisson(KnuthPoissonResult),
    String(StringResult),
    Walk(WalkResult),
}

impl TestResult {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Poisson(_) => "poisson",
            Self::Chi2(_) => "chi2",
            Self::KnuthBasic(_) => "knuth_basic",
            Self::KnuthPoisson(_) => "knuth_poisson",
            Self::String(_) => "string",
            Self::Walk(_) => "walk",
        }
    }
}
