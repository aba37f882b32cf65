//! Shared statistics: sampling helpers, chi-square lumping and the
//! goodness-of-fit summaries every test reports.

use pitcrush_core::{GofSummary, GofTest, PoissonResult, UniformGenerator};
use statrs::distribution::{ChiSquared, ContinuousCDF, DiscreteCDF, Normal, Poisson};

use crate::error::BatteryError;

/// Chi-square cells are lumped until each expects at least this many hits.
pub const MIN_EXPECTED: f64 = 10.0;

/// p-values outside `[SUSPECT_P, 1 - SUSPECT_P]` are flagged in reports.
pub const SUSPECT_P: f64 = 0.001;

// ═══════════════════════════════════════════════════════════════════════════════
// Sampling
// ═══════════════════════════════════════════════════════════════════════════════

/// Drop the `r` most significant bits of `u`: `frac(u · 2^r)`.
pub(crate) fn shift(u: f64, r: u32) -> f64 {
    if r == 0 {
        u
    } else {
        (u * (1u64 << r) as f64).fract()
    }
}

/// Cell in `0..d` for a sample on [0, 1]. A sample of exactly 1.0 lands in
/// the last cell.
pub(crate) fn cell(u: f64, d: usize) -> usize {
    ((u * d as f64) as usize).min(d - 1)
}

/// The `s` most significant bits of `u` as an integer.
pub(crate) fn bits_of(u: f64, s: u32) -> u64 {
    let scale = (1u64 << s) as f64;
    ((u * scale) as u64).min((1u64 << s) - 1)
}

/// One sample with the leading `r` bits dropped.
pub(crate) fn draw<G: UniformGenerator + ?Sized>(
    r#gen: &mut G,
    r: u32,
) -> Result<f64, BatteryError> {
    Ok(shift(r#gen.next_uniform()?, r))
}

/// Bit stream taking `s` bits from each sample after dropping `r`.
pub(crate) struct BitStream<'a, G: UniformGenerator + ?Sized> {
    r#gen: &'a mut G,
    r: u32,
    s: u32,
    buffer: u64,
    available: u32,
}

impl<'a, G: UniformGenerator + ?Sized> BitStream<'a, G> {
    pub(crate) fn new(r#gen: &'a mut G, r: u32, s: u32) -> Self {
        Self {
            r#gen,
            r,
            s,
            buffer: 0,
            available: 0,
        }
    }

    /// Next `k ≤ 64` bits, most significant first.
    pub(crate) fn next_bits(&mut self, k: u32) -> Result<u64, BatteryError> {
        let mut out = 0u64;
        let mut need = k;
        while need > 0 {
            if self.available == 0 {
                self.buffer = bits_of(draw(&mut *self.r#gen, self.r)?, self.s);
                self.available = self.s;
            }
            let take = need.min(self.available);
            let chunk = (self.buffer >> (self.available - take)) & mask(take);
            out = (out << take) | chunk;
            self.available -= take;
            need -= take;
        }
        Ok(out)
    }

    pub(crate) fn next_bit(&mut self) -> Result<bool, BatteryError> {
        Ok(self.next_bits(1)? == 1)
    }
}

fn mask(k: u32) -> u64 {
    if k >= 64 { u64::MAX } else { (1u64 << k) - 1 }
}

/// Validate the bit layout shared by bit-oriented tests.
pub(crate) fn check_bits(test: &'static str, r: u32, s: u32) -> Result<(), BatteryError> {
    if s == 0 || s > 32 {
        return Err(BatteryError::invalid(test, format!("s = {s} must be in 1..=32")));
    }
    if r + s > 53 {
        return Err(BatteryError::invalid(
            test,
            format!("r + s = {} exceeds the 53 bits of a double", r + s),
        ));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Chi-square lumping
// ═══════════════════════════════════════════════════════════════════════════════

/// Adjacent-cell lumping so every class expects at least [`MIN_EXPECTED`].
#[derive(Debug, Clone)]
pub(crate) struct Lumping {
    classes: Vec<(usize, usize)>,
    class_of: Vec<usize>,
    expected: Vec<f64>,
}

impl Lumping {
    /// `probabilities` must cover every cell and sum to one; `n` is the
    /// number of observations per replication.
    pub(crate) fn new(
        test: &'static str,
        probabilities: &[f64],
        n: f64,
    ) -> Result<Self, BatteryError> {
        let mut classes = Vec::new();
        let mut expected = Vec::new();
        let mut start = 0;
        let mut acc = 0.0;
        for (i, &p) in probabilities.iter().enumerate() {
            acc += p * n;
            if acc >= MIN_EXPECTED {
                classes.push((start, i));
                expected.push(acc);
                start = i + 1;
                acc = 0.0;
            }
        }
        let last = probabilities.len().saturating_sub(1);
        if start < probabilities.len() {
            match (classes.last_mut(), expected.last_mut()) {
                (Some(class), Some(e)) => {
                    class.1 = last;
                    *e += acc;
                }
                _ => {
                    classes.push((start, last));
                    expected.push(acc);
                }
            }
        }
        if classes.len() < 2 {
            return Err(BatteryError::invalid(
                test,
                format!(
                    "only {} chi-square class(es) expect {MIN_EXPECTED} or more hits; increase n",
                    classes.len()
                ),
            ));
        }

        let mut class_of = vec![0; probabilities.len()];
        for (c, &(a, b)) in classes.iter().enumerate() {
            class_of[a..=b].iter_mut().for_each(|slot| *slot = c);
        }
        Ok(Self {
            classes,
            class_of,
            expected,
        })
    }

    pub(crate) fn class_of(&self, cell: usize) -> usize {
        self.class_of[cell.min(self.class_of.len() - 1)]
    }

    pub(crate) fn len(&self) -> usize {
        self.classes.len()
    }

    pub(crate) fn degrees_of_freedom(&self) -> usize {
        self.classes.len() - 1
    }

    pub(crate) fn classes(&self) -> &[(usize, usize)] {
        &self.classes
    }

    pub(crate) fn expected(&self) -> &[f64] {
        &self.expected
    }

    /// Lump per-cell counts into classes.
    pub(crate) fn lump(&self, counts: &[u64]) -> Vec<u64> {
        let mut observed = vec![0u64; self.classes.len()];
        for (cell, &count) in counts.iter().enumerate() {
            observed[self.class_of(cell)] += count;
        }
        observed
    }

    /// Chi-square statistic of per-class counts.
    pub(crate) fn chi2(&self, observed: &[u64]) -> f64 {
        chi2_statistic(observed, &self.expected)
    }
}

pub(crate) fn chi2_statistic(observed: &[u64], expected: &[f64]) -> f64 {
    observed
        .iter()
        .zip(expected)
        .map(|(&o, &e)| {
            let diff = o as f64 - e;
            diff * diff / e
        })
        .sum()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Goodness-of-fit summaries
// ═══════════════════════════════════════════════════════════════════════════════

/// Convention for discrete statistics: small values flag "too large", values
/// near one flag "too small".
pub fn discrete_p_value(p_left: f64, p_right: f64) -> f64 {
    if p_right < p_left {
        p_right
    } else if p_left < 0.5 {
        1.0 - p_left
    } else {
        0.5
    }
}

/// KS/AD slots over per-replication p-values, when there are several.
fn replication_summary(p_values: &[f64]) -> GofSummary {
    let mut gof = GofSummary::undefined();
    if p_values.len() < 2 {
        return gof;
    }
    let mut sorted = p_values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let mut d_plus = 0.0f64;
    let mut d_minus = 0.0f64;
    for (i, &u) in sorted.iter().enumerate() {
        d_plus = d_plus.max((i + 1) as f64 / n - u);
        d_minus = d_minus.max(u - i as f64 / n);
    }
    let sqrt_n = n.sqrt();
    let scale = sqrt_n + 0.12 + 0.11 / sqrt_n;
    gof.set(GofTest::KsPlus, d_plus, (-2.0 * (scale * d_plus).powi(2)).exp());
    gof.set(GofTest::KsMinus, d_minus, (-2.0 * (scale * d_minus).powi(2)).exp());
    let a2 = anderson_darling(&sorted);
    gof.set(GofTest::AndersonDarling, a2, anderson_darling_p(a2));
    gof
}

/// Summary of `N` chi-square statistics with `df` degrees of freedom each.
/// The mean position tests their sum against chi-square with `N · df`.
pub(crate) fn chi2_summary(
    test: &'static str,
    df: usize,
    statistics: &[f64],
) -> Result<GofSummary, BatteryError> {
    let single = ChiSquared::new(df as f64).map_err(|e| BatteryError::distribution(test, e))?;
    let p_values: Vec<f64> = statistics.iter().map(|&x| single.sf(x)).collect();
    let sum: f64 = statistics.iter().sum();
    let total = ChiSquared::new((df * statistics.len()) as f64)
        .map_err(|e| BatteryError::distribution(test, e))?;
    let mut gof = replication_summary(&p_values);
    gof.set(GofTest::Mean, sum, total.sf(sum));
    Ok(gof)
}

/// Summary of `N` approximately standard normal statistics. The mean
/// position tests `Σz / √N` against N(0, 1), right tail.
pub(crate) fn normal_summary(
    test: &'static str,
    statistics: &[f64],
) -> Result<GofSummary, BatteryError> {
    let reference = Normal::standard();
    let upper = |z: f64| -> Result<f64, BatteryError> {
        if !z.is_finite() {
            return Err(BatteryError::distribution(test, format!("non-finite statistic {z}")));
        }
        Ok(reference.sf(z))
    };
    let p_values = statistics
        .iter()
        .map(|&z| upper(z))
        .collect::<Result<Vec<_>, _>>()?;
    let mean = statistics.iter().sum::<f64>() / (statistics.len() as f64).sqrt();
    let mut gof = replication_summary(&p_values);
    gof.set(GofTest::Mean, mean, upper(mean)?);
    Ok(gof)
}

/// Summary of `N` Anderson-Darling statistics. With one replication the
/// mean position is that A²; with several it carries the second-level A²
/// over the replication p-values.
pub(crate) fn anderson_darling_summary(statistics: &[f64]) -> GofSummary {
    let p_values: Vec<f64> = statistics.iter().map(|&a2| anderson_darling_p(a2)).collect();
    let mut gof = replication_summary(&p_values);
    match statistics {
        [single] => gof.set(GofTest::Mean, *single, p_values[0]),
        _ => gof.set(
            GofTest::Mean,
            gof.statistic(GofTest::AndersonDarling),
            gof.p_value(GofTest::AndersonDarling),
        ),
    }
    gof
}

/// Poisson count summed over replications.
pub(crate) fn poisson_result(
    test: &'static str,
    lambda: f64,
    replications: usize,
    observed: u64,
) -> Result<PoissonResult, BatteryError> {
    let mu = lambda * replications as f64;
    let law = Poisson::new(mu).map_err(|e| BatteryError::distribution(test, e))?;
    let p_left = law.cdf(observed);
    let p_right = if observed == 0 {
        1.0
    } else {
        law.sf(observed - 1)
    };
    Ok(PoissonResult {
        lambda,
        mu,
        observed: observed as f64,
        p_left,
        p_right,
        p_value: discrete_p_value(p_left, p_right),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Anderson-Darling
// ═══════════════════════════════════════════════════════════════════════════════

/// A² of sorted samples against U(0, 1).
pub(crate) fn anderson_darling(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let nf = n as f64;
    let mut s = 0.0;
    for i in 0..n {
        let idx = (i + 1) as f64;
        let u = sorted[i].clamp(1e-15, 1.0 - 1e-15);
        let u_rev = sorted[n - 1 - i].clamp(1e-15, 1.0 - 1e-15);
        s += (2.0 * idx - 1.0) * (u.ln() + (1.0 - u_rev).ln());
    }
    -nf - s / nf
}

/// Right-tail p-value of A² from the asymptotic law (Marsaglia & Marsaglia 2004).
pub(crate) fn anderson_darling_p(a2: f64) -> f64 {
    if !a2.is_finite() {
        return f64::NAN;
    }
    if a2 <= 0.0 {
        return 1.0;
    }
    let cdf = if a2 < 2.0 {
        (-1.233_714_1 / a2).exp() / a2.sqrt()
            * (2.000_12
                + (0.247_105
                    - (0.064_982_1 - (0.034_796_2 - (0.011_672 - 0.001_686_91 * a2) * a2) * a2)
                        * a2)
                    * a2)
    } else {
        (-(1.0776
            - (2.306_95 - (0.434_24 - (0.082_433 - (0.008_056 - 0.000_314_6 * a2) * a2) * a2) * a2)
                * a2)
            .exp())
        .exp()
    };
    (1.0 - cdf).clamp(0.0, 1.0)
}
