//! Random walk: each bit of the stream moves a walk up or down. For every
//! even length `l` in `[l0, l1]` five statistics are compared with their
//! exact distributions:
//!
//! - `H`: up steps
//! - `M`: maximum position
//! - `J`: twice the number of odd times spent above zero
//! - `R`: returns to zero
//! - `C`: sign changes through zero

use pitcrush_core::{Chi2Result, TestResult, UniformGenerator, WalkResult};
use serde::{Deserialize, Serialize};

use super::Sampling;
use crate::error::BatteryError;
use crate::stats::{BitStream, Lumping, check_bits, chi2_summary};

pub const NAME: &str = "RandomWalk1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkParams {
    /// `n` counts walks.
    pub sampling: Sampling,
    /// `s`: bits taken from each sample.
    pub bits: u32,
    /// Shortest reported length, even.
    pub min_length: usize,
    /// Longest reported length, even.
    pub max_length: usize,
}

impl WalkParams {
    fn check(&self) -> Result<(), BatteryError> {
        self.sampling.check(NAME)?;
        check_bits(NAME, self.sampling.offset_bits, self.bits)?;
        let (l0, l1) = (self.min_length, self.max_length);
        if l0 < 2 || l0 % 2 != 0 || l1 % 2 != 0 || l0 > l1 {
            return Err(BatteryError::invalid(
                NAME,
                format!("lengths [{l0}, {l1}] must be even with 2 <= l0 <= l1"),
            ));
        }
        if l1 > 4096 {
            return Err(BatteryError::invalid(NAME, "walks are limited to 4096 steps"));
        }
        Ok(())
    }

    /// Reported lengths: `l0, l0 + 2, ..., l1`.
    pub fn lengths(&self) -> Vec<usize> {
        (self.min_length..=self.max_length).step_by(2).collect()
    }
}

impl std::fmt::Display for WalkParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, s = {}, L0 = {}, L1 = {}",
            self.sampling, self.bits, self.min_length, self.max_length
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statistic {
    H,
    M,
    J,
    R,
    C,
}

impl Statistic {
    const ALL: [Statistic; 5] = [Self::H, Self::M, Self::J, Self::R, Self::C];

    /// Value after step number `step` (1-based) lands the walk on `pos`.
    /// `last_sign` is the sign of the last nonzero position before the step.
    fn update(self, value: usize, step: usize, up: bool, pos: i64, last_sign: i8) -> usize {
        match self {
            Self::H => value + usize::from(up),
            Self::M => value.max(pos.max(0) as usize),
            Self::J => value + if step % 2 == 1 && pos > 0 { 2 } else { 0 },
            Self::R => value + usize::from(pos == 0),
            Self::C => {
                let flipped = pos != 0 && last_sign != 0 && sign(pos) != last_sign;
                value + usize::from(flipped)
            }
        }
    }
}

fn sign(pos: i64) -> i8 {
    pos.signum() as i8
}

fn next_sign(pos: i64, last_sign: i8) -> i8 {
    if pos == 0 { last_sign } else { sign(pos) }
}

/// One simulated walk.
struct Tracker {
    pos: i64,
    last_sign: i8,
    step: usize,
    values: [usize; 5],
}

impl Tracker {
    fn new() -> Self {
        Self {
            pos: 0,
            last_sign: 0,
            step: 0,
            values: [0; 5],
        }
    }

    fn advance(&mut self, up: bool) {
        self.step += 1;
        self.pos += if up { 1 } else { -1 };
        for (value, stat) in self.values.iter_mut().zip(Statistic::ALL) {
            *value = stat.update(*value, self.step, up, self.pos, self.last_sign);
        }
        self.last_sign = next_sign(self.pos, self.last_sign);
    }
}

/// Exact distribution of `stat` after each length in `lengths`, by dynamic
/// programming over (position, last sign, value).
fn exact_distributions(stat: Statistic, lengths: &[usize]) -> Vec<Vec<f64>> {
    let l1 = lengths.last().copied().unwrap_or(0);
    let positions = 2 * l1 + 1;
    let values = l1 + 1;
    let signs = if stat == Statistic::C { 3 } else { 1 };
    let index = |pos: i64, sign: i8, value: usize| -> usize {
        let p = (pos + l1 as i64) as usize;
        let s = if signs == 1 { 0 } else { (sign + 1) as usize };
        (p * signs + s) * values + value
    };

    let mut current = vec![0.0f64; positions * signs * values];
    let mut next = vec![0.0f64; current.len()];
    current[index(0, 0, 0)] = 1.0;
    let mut out = Vec::with_capacity(lengths.len());
    let mut wanted = lengths.iter().peekable();

    for step in 1..=l1 {
        next.iter_mut().for_each(|x| *x = 0.0);
        let reach = (step - 1) as i64;
        for pos in -reach..=reach {
            for s in 0..signs {
                let last_sign = if signs == 1 { 0 } else { s as i8 - 1 };
                for value in 0..values {
                    let p = current[index(pos, last_sign, value)];
                    if p == 0.0 {
                        continue;
                    }
                    for up in [false, true] {
                        let new_pos = pos + if up { 1 } else { -1 };
                        let new_value = stat.update(value, step, up, new_pos, last_sign);
                        let new_sign = if signs == 1 { 0 } else { next_sign(new_pos, last_sign) };
                        next[index(new_pos, new_sign, new_value)] += 0.5 * p;
                    }
                }
            }
        }
        std::mem::swap(&mut current, &mut next);

        if wanted.peek() == Some(&&step) {
            wanted.next();
            let mut dist = vec![0.0; values];
            for (i, &p) in current.iter().enumerate() {
                dist[i % values] += p;
            }
            out.push(dist);
        }
    }
    out
}

pub fn run(
    r#gen: &mut dyn UniformGenerator,
    params: &WalkParams,
) -> Result<TestResult, BatteryError> {
    params.check()?;
    let Sampling {
        replications,
        n,
        offset_bits,
    } = params.sampling;
    let lengths = params.lengths();
    let l1 = params.max_length;

    // lumpings[stat][length]
    let mut lumpings = Vec::with_capacity(Statistic::ALL.len());
    for stat in Statistic::ALL {
        let per_length = exact_distributions(stat, &lengths)
            .iter()
            .map(|dist| Lumping::new(NAME, dist, n as f64))
            .collect::<Result<Vec<_>, _>>()?;
        lumpings.push(per_length);
    }

    let mut stream = BitStream::new(r#gen, offset_bits, params.bits);
    let series = Statistic::ALL.len() * lengths.len();
    let cells = series * (l1 + 1);
    let slot =
        |stat: usize, li: usize, value: usize| (stat * lengths.len() + li) * (l1 + 1) + value;
    let mut counts = vec![0u64; cells];
    let mut statistics = vec![Vec::with_capacity(replications); series];
    let mut observed = vec![Vec::new(); series];

    for _ in 0..replications {
        counts.iter_mut().for_each(|c| *c = 0);
        for _ in 0..n {
            let mut walk = Tracker::new();
            let mut li = 0;
            for step in 1..=l1 {
                walk.advance(stream.next_bit()?);
                if lengths.get(li) == Some(&step) {
                    for (stat, &value) in walk.values.iter().enumerate() {
                        counts[slot(stat, li, value)] += 1;
                    }
                    li += 1;
                }
            }
        }
        for (stat, per_length) in lumpings.iter().enumerate() {
            for (li, lumping) in per_length.iter().enumerate() {
                let start = slot(stat, li, 0);
                let lumped = lumping.lump(&counts[start..start + l1 + 1]);
                let k = stat * lengths.len() + li;
                statistics[k].push(lumping.chi2(&lumped));
                observed[k] = lumped;
            }
        }
    }

    let mut subs: [Vec<Chi2Result>; 5] = Default::default();
    for (stat, per_length) in lumpings.iter().enumerate() {
        for (li, lumping) in per_length.iter().enumerate() {
            let k = stat * lengths.len() + li;
            subs[stat].push(Chi2Result {
                replications,
                degrees_of_freedom: lumping.degrees_of_freedom(),
                observed: std::mem::take(&mut observed[k]),
                expected: lumping.expected().to_vec(),
                gof: chi2_summary(NAME, lumping.degrees_of_freedom(), &statistics[k])?,
            });
        }
    }
    let [h, m, j, r, c] = subs;
    Ok(TestResult::Walk(WalkResult {
        lengths,
        h,
        m,
        j,
        r,
        c,
    }))
}
