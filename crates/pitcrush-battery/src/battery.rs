//! Tiers, battery plans and the runners.
//!
//! A [`BatteryPlan`] is an ordered list of [`TestSpec`]s. [`run_battery`]
//! executes a plan against one generator and writes the text report as it
//! goes; [`run_single`] does the same for one test with explicit parameters.

use std::io::Write;
use std::str::FromStr;
use std::time::{Duration, Instant};

use pitcrush_core::{
    ExtractError, PValueSummary, TestResult, UniformGenerator, WALK_LABELS, extract_p_values,
};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::BatteryError;
use crate::report::{self, Detail};
use crate::stats::SUSPECT_P;
use crate::suite::{
    self, BirthdayParams, CollisionParams, CouponParams, GapParams, HammingParams, MaxOfTParams,
    PokerParams, RankParams, Sampling, WalkParams, WeightParams,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Tiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Battery size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// One replication of every test at its base size.
    #[default]
    #[serde(alias = "smallcrush")]
    Small,
    /// Five replications.
    #[serde(alias = "crush")]
    Medium,
    /// Ten replications with four times the samples.
    #[serde(alias = "bigcrush")]
    Big,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Self::Small, Self::Medium, Self::Big];

    pub fn name(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Big => "big",
        }
    }

    fn replications(self) -> usize {
        match self {
            Self::Small => 1,
            Self::Medium => 5,
            Self::Big => 10,
        }
    }

    /// Sample multiplier. Spacing-based tests keep their base size since
    /// their reference law depends on `n`.
    fn n_factor(self, key: &str) -> f64 {
        match (self, key) {
            (Self::Big, "birthday" | "collision") => 1.0,
            (Self::Big, _) => 4.0,
            _ => 1.0,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "smallcrush" => Ok(Self::Small),
            "medium" | "crush" => Ok(Self::Medium),
            "big" | "bigcrush" => Ok(Self::Big),
            _ => Err(ConfigError::UnknownTier(s.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test catalogue
// ═══════════════════════════════════════════════════════════════════════════════

/// One configured test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum TestSpec {
    Birthday(BirthdayParams),
    Collision(CollisionParams),
    Gap(GapParams),
    Poker(PokerParams),
    Coupon(CouponParams),
    MaxOfT(MaxOfTParams),
    Weight(WeightParams),
    Rank(RankParams),
    Hamming(HammingParams),
    Walk(WalkParams),
}

/// Parameter overrides accepted by [`TestSpec::with_overrides`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub n: Option<usize>,
    pub replications: Option<usize>,
    pub offset_bits: Option<u32>,
    /// `d`, for tests that divide samples into cells.
    pub cells: Option<u64>,
    /// `t`, for tests that group samples into points.
    pub dims: Option<u32>,
}

impl TestSpec {
    /// Short keys in battery order.
    pub const KEYS: [&'static str; 10] = [
        "birthday",
        "collision",
        "gap",
        "poker",
        "coupon",
        "maxoft",
        "weight",
        "rank",
        "hamming",
        "walk",
    ];

    /// Base configuration of a test, as run by the small tier.
    pub fn default_for(key: &str) -> Option<Self> {
        let spec = match key.trim().to_ascii_lowercase().as_str() {
            "birthday" | "birthdayspacings" => Self::Birthday(BirthdayParams {
                sampling: Sampling::new(1, 5_000_000, 0),
                dims: 2,
                bits: 30,
            }),
            "collision" => Self::Collision(CollisionParams {
                sampling: Sampling::new(1, 5_000_000, 0),
                cells: 65_536,
                dims: 2,
            }),
            "gap" => Self::Gap(GapParams {
                sampling: Sampling::new(1, 200_000, 22),
                alpha: 0.0,
                beta: 1.0 / 256.0,
            }),
            "poker" | "simplepoker" => Self::Poker(PokerParams {
                sampling: Sampling::new(1, 400_000, 24),
                cells: 64,
                hand: 64,
            }),
            "coupon" | "couponcollector" => Self::Coupon(CouponParams {
                sampling: Sampling::new(1, 500_000, 0),
                cells: 16,
            }),
            "maxoft" | "max_of_t" => Self::MaxOfT(MaxOfTParams {
                sampling: Sampling::new(1, 2_000_000, 0),
                cells: 100_000,
                group: 6,
            }),
            "weight" | "weightdistrib" => Self::Weight(WeightParams {
                sampling: Sampling::new(1, 200_000, 27),
                group: 256,
                alpha: 0.0,
                beta: 0.125,
            }),
            "rank" | "matrixrank" => Self::Rank(RankParams {
                sampling: Sampling::new(1, 20_000, 20),
                bits: 10,
                rows: 60,
                cols: 60,
            }),
            "hamming" | "hammingindep" => Self::Hamming(HammingParams {
                sampling: Sampling::new(1, 500_000, 20),
                bits: 10,
                block: 300,
            }),
            "walk" | "randomwalk" | "randomwalk1" => Self::Walk(WalkParams {
                sampling: Sampling::new(1, 1_000_000, 0),
                bits: 30,
                min_length: 150,
                max_length: 150,
            }),
            _ => return None,
        };
        Some(spec)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Birthday(_) => "birthday",
            Self::Collision(_) => "collision",
            Self::Gap(_) => "gap",
            Self::Poker(_) => "poker",
            Self::Coupon(_) => "coupon",
            Self::MaxOfT(_) => "maxoft",
            Self::Weight(_) => "weight",
            Self::Rank(_) => "rank",
            Self::Hamming(_) => "hamming",
            Self::Walk(_) => "walk",
        }
    }

    /// Report name of the test.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Birthday(_) => suite::birthday::NAME,
            Self::Collision(_) => suite::collision::NAME,
            Self::Gap(_) => suite::gap::NAME,
            Self::Poker(_) => suite::poker::NAME,
            Self::Coupon(_) => suite::coupon::NAME,
            Self::MaxOfT(_) => suite::max_of_t::NAME,
            Self::Weight(_) => suite::weight::NAME,
            Self::Rank(_) => suite::rank::NAME,
            Self::Hamming(_) => suite::hamming::NAME,
            Self::Walk(_) => suite::walk::NAME,
        }
    }

    pub fn sampling(&self) -> Sampling {
        match self {
            Self::Birthday(p) => p.sampling,
            Self::Collision(p) => p.sampling,
            Self::Gap(p) => p.sampling,
            Self::Poker(p) => p.sampling,
            Self::Coupon(p) => p.sampling,
            Self::MaxOfT(p) => p.sampling,
            Self::Weight(p) => p.sampling,
            Self::Rank(p) => p.sampling,
            Self::Hamming(p) => p.sampling,
            Self::Walk(p) => p.sampling,
        }
    }

    fn sampling_mut(&mut self) -> &mut Sampling {
        match self {
            Self::Birthday(p) => &mut p.sampling,
            Self::Collision(p) => &mut p.sampling,
            Self::Gap(p) => &mut p.sampling,
            Self::Poker(p) => &mut p.sampling,
            Self::Coupon(p) => &mut p.sampling,
            Self::MaxOfT(p) => &mut p.sampling,
            Self::Weight(p) => &mut p.sampling,
            Self::Rank(p) => &mut p.sampling,
            Self::Hamming(p) => &mut p.sampling,
            Self::Walk(p) => &mut p.sampling,
        }
    }

    /// Apply explicit parameters. Naming a parameter the test does not have
    /// is an error.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self, BatteryError> {
        let test = self.name();
        let sampling = self.sampling_mut();
        if let Some(n) = overrides.n {
            sampling.n = n;
        }
        if let Some(replications) = overrides.replications {
            sampling.replications = replications;
        }
        if let Some(r) = overrides.offset_bits {
            sampling.offset_bits = r;
        }

        if let Some(d) = overrides.cells {
            let as_usize = |d: u64| {
                usize::try_from(d)
                    .map_err(|_| BatteryError::invalid(test, format!("d = {d} too large")))
            };
            match &mut self {
                Self::Collision(p) => p.cells = d,
                Self::Poker(p) => p.cells = as_usize(d)?,
                Self::Coupon(p) => p.cells = as_usize(d)?,
                Self::MaxOfT(p) => p.cells = as_usize(d)?,
                _ => return Err(BatteryError::invalid(test, "this test has no cell count d")),
            }
        }
        if let Some(t) = overrides.dims {
            match &mut self {
                Self::Birthday(p) => p.dims = t,
                Self::Collision(p) => p.dims = t,
                _ => return Err(BatteryError::invalid(test, "this test has no dimension t")),
            }
        }
        Ok(self)
    }

    /// Same test with `n` multiplied by `factor`. Size-coupled parameters
    /// are re-derived so the reference law stays usable.
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Self::Birthday(p) => Self::Birthday(BirthdayParams::for_lambda(
                p.sampling.scaled(factor, 1_000),
                p.dims,
                27.0,
            )),
            Self::Collision(p) if factor < 1.0 => Self::Collision(CollisionParams::for_expected(
                p.sampling.scaled(factor, 1_000),
                1,
                100.0,
            )),
            Self::Collision(p) => Self::Collision(CollisionParams {
                sampling: p.sampling.scaled(factor, 1_000),
                ..p
            }),
            Self::Gap(p) => Self::Gap(GapParams {
                sampling: p.sampling.scaled(factor, 2_000),
                ..p
            }),
            Self::Poker(p) => Self::Poker(PokerParams {
                sampling: p.sampling.scaled(factor, 2_000),
                ..p
            }),
            Self::Coupon(p) => Self::Coupon(CouponParams {
                sampling: p.sampling.scaled(factor, 1_000),
                ..p
            }),
            Self::MaxOfT(p) => {
                let sampling = p.sampling.scaled(factor, 1_000);
                let cells = p.cells.min(sampling.n / 20).max(2);
                Self::MaxOfT(MaxOfTParams {
                    sampling,
                    cells,
                    ..p
                })
            }
            Self::Weight(p) => Self::Weight(WeightParams {
                sampling: p.sampling.scaled(factor, 1_000),
                ..p
            }),
            Self::Rank(p) => Self::Rank(RankParams {
                sampling: p.sampling.scaled(factor, 500),
                ..p
            }),
            Self::Hamming(p) => Self::Hamming(HammingParams {
                sampling: p.sampling.scaled(factor, 1_000),
                ..p
            }),
            Self::Walk(p) => Self::Walk(WalkParams {
                sampling: p.sampling.scaled(factor, 1_000),
                ..p
            }),
        }
    }

    fn with_replications(mut self, replications: usize) -> Self {
        self.sampling_mut().replications = replications;
        self
    }

    /// Execute the test against `gen`.
    pub fn run(&self, r#gen: &mut dyn UniformGenerator) -> Result<TestResult, BatteryError> {
        match self {
            Self::Birthday(p) => suite::birthday::run(r#gen, p),
            Self::Collision(p) => suite::collision::run(r#gen, p),
            Self::Gap(p) => suite::gap::run(r#gen, p),
            Self::Poker(p) => suite::poker::run(r#gen, p),
            Self::Coupon(p) => suite::coupon::run(r#gen, p),
            Self::MaxOfT(p) => suite::max_of_t::run(r#gen, p),
            Self::Weight(p) => suite::weight::run(r#gen, p),
            Self::Rank(p) => suite::rank::run(r#gen, p),
            Self::Hamming(p) => suite::hamming::run(r#gen, p),
            Self::Walk(p) => suite::walk::run(r#gen, p),
        }
    }
}

impl std::fmt::Display for TestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Birthday(p) => p.fmt(f),
            Self::Collision(p) => p.fmt(f),
            Self::Gap(p) => p.fmt(f),
            Self::Poker(p) => p.fmt(f),
            Self::Coupon(p) => p.fmt(f),
            Self::MaxOfT(p) => p.fmt(f),
            Self::Weight(p) => p.fmt(f),
            Self::Rank(p) => p.fmt(f),
            Self::Hamming(p) => p.fmt(f),
            Self::Walk(p) => p.fmt(f),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Plans and outcomes
// ═══════════════════════════════════════════════════════════════════════════════

/// An ordered list of tests with a label for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryPlan {
    pub label: String,
    pub tests: Vec<TestSpec>,
}

impl BatteryPlan {
    pub fn for_tier(tier: Tier) -> Self {
        let tests = TestSpec::KEYS
            .iter()
            .filter_map(|key| TestSpec::default_for(key))
            .map(|spec| {
                let factor = tier.n_factor(spec.key());
                let spec = if factor == 1.0 { spec } else { spec.scaled(factor) };
                spec.with_replications(tier.replications())
            })
            .collect();
        Self {
            label: tier.name().to_string(),
            tests,
        }
    }

    /// Plan with every sample count multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        if factor == 1.0 {
            return self.clone();
        }
        Self {
            label: format!("{} (x{factor})", self.label),
            tests: self.tests.iter().map(|spec| spec.scaled(factor)).collect(),
        }
    }

    /// Plan of one test.
    pub fn single(spec: TestSpec) -> Self {
        Self {
            label: spec.name().to_string(),
            tests: vec![spec],
        }
    }
}

/// Result of one test within a battery run.
#[derive(Debug, Clone)]
pub struct NamedResult {
    pub name: &'static str,
    pub spec: TestSpec,
    pub result: TestResult,
    pub elapsed: Duration,
}

impl NamedResult {
    pub fn p_values(&self) -> Result<PValueSummary, ExtractError> {
        extract_p_values(&self.result)
    }
}

/// A p-value outside `[SUSPECT_P, 1 - SUSPECT_P]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suspect {
    pub index: usize,
    pub test: &'static str,
    /// Walk sub-statistic, when the test reports several.
    pub label: Option<&'static str>,
    pub p_value: f64,
}

pub fn is_suspect(p: f64) -> bool {
    !(SUSPECT_P..=1.0 - SUSPECT_P).contains(&p)
}

/// Everything a battery run produced.
#[derive(Debug, Clone)]
pub struct BatteryOutcome {
    pub battery: String,
    pub generator: String,
    pub results: Vec<NamedResult>,
    pub elapsed: Duration,
}

impl BatteryOutcome {
    /// Summary p-values in battery order.
    pub fn p_values(&self) -> Result<Vec<(&'static str, PValueSummary)>, ExtractError> {
        self.results
            .iter()
            .map(|r| Ok((r.name, r.p_values()?)))
            .collect()
    }

    pub fn statistic_count(&self) -> Result<usize, ExtractError> {
        Ok(self.p_values()?.iter().map(|(_, p)| p.values().len()).sum())
    }

    pub fn suspects(&self) -> Result<Vec<Suspect>, ExtractError> {
        let mut out = Vec::new();
        for (index, (test, summary)) in self.p_values()?.into_iter().enumerate() {
            let labelled = matches!(summary, PValueSummary::Walk(_));
            for (i, &p_value) in summary.values().iter().enumerate() {
                if is_suspect(p_value) {
                    out.push(Suspect {
                        index: index + 1,
                        test,
                        label: labelled.then_some(WALK_LABELS[i]),
                        p_value,
                    });
                }
            }
        }
        Ok(out)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runners
// ═══════════════════════════════════════════════════════════════════════════════

/// Run every test of `plan` against `gen`, writing the text report to `out`.
pub fn run_battery<W: Write + ?Sized>(
    r#gen: &mut dyn UniformGenerator,
    plan: &BatteryPlan,
    out: &mut W,
) -> Result<BatteryOutcome, BatteryError> {
    run_battery_with(r#gen, plan, Detail::Basic, out)
}

/// [`run_battery`] with an explicit report detail.
pub fn run_battery_with<W: Write + ?Sized>(
    r#gen: &mut dyn UniformGenerator,
    plan: &BatteryPlan,
    detail: Detail,
    out: &mut W,
) -> Result<BatteryOutcome, BatteryError> {
    let generator = r#gen.name().to_string();
    log::info!(
        "running battery {} ({} tests, {detail} report) on {generator}",
        plan.label,
        plan.tests.len()
    );
    report::write_header(out, &plan.label, &generator)?;

    let start = Instant::now();
    let mut results = Vec::with_capacity(plan.tests.len());
    for spec in &plan.tests {
        let t0 = Instant::now();
        let result = spec.run(r#gen)?;
        let named = NamedResult {
            name: spec.name(),
            spec: *spec,
            result,
            elapsed: t0.elapsed(),
        };
        report::write_result(out, &named, detail)?;
        log::debug!("{} finished in {:.2?}", named.name, named.elapsed);
        results.push(named);
    }

    let outcome = BatteryOutcome {
        battery: plan.label.clone(),
        generator,
        results,
        elapsed: start.elapsed(),
    };
    for suspect in outcome.suspects()? {
        log::warn!(
            "{} on {}: suspect p-value {}{}",
            outcome.battery,
            outcome.generator,
            report::format_p_value(suspect.p_value),
            suspect.label.map(|l| format!(" ({l})")).unwrap_or_default()
        );
    }
    report::write_summary(out, &outcome)?;
    Ok(outcome)
}

/// Run one test in isolation, reported at [`Detail::Verbose`].
pub fn run_single<W: Write + ?Sized>(
    r#gen: &mut dyn UniformGenerator,
    spec: &TestSpec,
    out: &mut W,
) -> Result<BatteryOutcome, BatteryError> {
    run_battery_with(r#gen, &BatteryPlan::single(*spec), Detail::Verbose, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parsing_and_aliases() {
        assert_eq!("small".parse::<Tier>().unwrap(), Tier::Small);
        assert_eq!("BigCrush".parse::<Tier>().unwrap(), Tier::Big);
        assert_eq!("crush".parse::<Tier>().unwrap(), Tier::Medium);
        assert!(matches!(
            "huge".parse::<Tier>(),
            Err(ConfigError::UnknownTier(_))
        ));
        let tier: Tier = serde_json::from_str("\"smallcrush\"").unwrap();
        assert_eq!(tier, Tier::Small);
        assert_eq!(serde_json::to_string(&Tier::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn every_key_has_a_default() {
        for key in TestSpec::KEYS {
            let spec = TestSpec::default_for(key).unwrap();
            assert_eq!(spec.key(), key);
            assert_eq!(spec.sampling().replications, 1);
        }
        assert!(TestSpec::default_for("nope").is_none());
    }

    #[test]
    fn small_tier_matches_catalogue() {
        let plan = BatteryPlan::for_tier(Tier::Small);
        assert_eq!(plan.tests.len(), 10);
        assert_eq!(plan.tests[0], TestSpec::default_for("birthday").unwrap());
        let TestSpec::Walk(walk) = plan.tests[9] else {
            panic!("walk last");
        };
        assert_eq!((walk.min_length, walk.max_length), (150, 150));
    }

    #[test]
    fn big_tier_scales_samples_and_replications() {
        let plan = BatteryPlan::for_tier(Tier::Big);
        let small = BatteryPlan::for_tier(Tier::Small);
        for (big, base) in plan.tests.iter().zip(&small.tests) {
            assert_eq!(big.sampling().replications, 10);
            let expected = if matches!(base.key(), "birthday" | "collision") { 1 } else { 4 };
            assert_eq!(big.sampling().n, base.sampling().n * expected, "{}", base.key());
        }
    }

    #[test]
    fn overrides_apply_and_reject() {
        let collision = TestSpec::default_for("collision")
            .unwrap()
            .with_overrides(&Overrides {
                n: Some(10_000_000),
                replications: Some(2),
                cells: Some(1 << 30),
                dims: Some(1),
                ..Overrides::default()
            })
            .unwrap();
        let TestSpec::Collision(p) = collision else {
            panic!("collision");
        };
        assert_eq!(p.sampling, Sampling::new(2, 10_000_000, 0));
        assert_eq!((p.cells, p.dims), (1 << 30, 1));

        let gap = TestSpec::default_for("gap").unwrap();
        assert!(matches!(
            gap.with_overrides(&Overrides {
                dims: Some(3),
                ..Overrides::default()
            }),
            Err(BatteryError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn scaled_plan_keeps_order() {
        let plan = BatteryPlan::for_tier(Tier::Small).scaled(0.01);
        let keys: Vec<_> = plan.tests.iter().map(TestSpec::key).collect();
        assert_eq!(keys, TestSpec::KEYS);
        let TestSpec::MaxOfT(m) = plan.tests[5] else {
            panic!("maxoft");
        };
        assert_eq!(m.sampling.n, 20_000);
        assert_eq!(m.cells, 1_000);
    }

    #[test]
    fn suspect_bounds() {
        assert!(is_suspect(0.0005));
        assert!(is_suspect(0.9995));
        assert!(is_suspect(f64::NAN));
        assert!(!is_suspect(0.5));
        assert!(!is_suspect(SUSPECT_P));
    }

    #[test]
    fn spec_serializes_with_tag() {
        let spec = TestSpec::default_for("coupon").unwrap();
        let json = serde_json::to_value(spec).unwrap();
        assert_eq!(json["test"], "coupon");
        assert_eq!(json["cells"], 16);
        let back: TestSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn runners_honour_report_detail() {
        use crate::suite::testing::with_uniform;

        let spec = TestSpec::default_for("coupon").unwrap().scaled(0.01);
        fn render(f: impl FnOnce(&mut dyn UniformGenerator, &mut Vec<u8>)) -> String {
            with_uniform(3, |r#gen| {
                let mut text = Vec::new();
                f(r#gen, &mut text);
                String::from_utf8(text).unwrap()
            })
        }

        let summary = render(|r#gen, text| {
            run_battery_with(r#gen, &BatteryPlan::single(spec), Detail::Summary, text).unwrap();
        });
        assert!(!summary.contains("CouponCollector test:"));
        assert!(summary.contains("Summary results of CouponCollector"));

        let basic = render(|r#gen, text| {
            run_battery(r#gen, &BatteryPlan::single(spec), text).unwrap();
        });
        assert!(basic.contains("CouponCollector test:"));
        assert!(!basic.contains("observed"));

        let single = render(|r#gen, text| {
            run_single(r#gen, &spec, text).unwrap();
        });
        assert!(single.contains("CouponCollector test:"));
        assert!(single.contains("observed"));
    }
}
