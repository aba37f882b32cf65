//! Per-distribution battery campaigns.
//!
//! Each distribution goes through the same stages:
//!
//! ```text
//! Idle → SourceInitialized → GeneratorBound → BatteryRunning → ResultsExtracted → TornDown
//! ```
//!
//! One [`SamplerState`] lives for the whole campaign and is lent to one
//! source at a time. After its battery, a distribution may get follow-up
//! tests on the same bound generator, so they see the continuation of the
//! stream the battery consumed.

use std::io::Write;
use std::time::Instant;

use pitcrush_core::{
    NamedGenerator, PValueSummary, SamplerState, SourceKind, UniformGenerator, make_source,
};
use serde::Serialize;
use thiserror::Error;

use crate::battery::{BatteryOutcome, BatteryPlan, TestSpec, run_battery_with, run_single};
use crate::config::RunConfig;
use crate::error::BatteryError;
use crate::report::Detail;
use crate::suite::{CollisionParams, Sampling};

/// Lifecycle stage of one distribution's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Idle,
    SourceInitialized,
    GeneratorBound,
    BatteryRunning,
    ResultsExtracted,
    TornDown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SourceInitialized => "initializing the source",
            Self::GeneratorBound => "binding the generator",
            Self::BatteryRunning => "running the battery",
            Self::ResultsExtracted => "extracting results",
            Self::TornDown => "tearing down",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{distribution} run failed while {stage}: {source}")]
pub struct CampaignError {
    pub distribution: SourceKind,
    pub stage: Stage,
    #[source]
    pub source: BatteryError,
}

/// A test run on one distribution's generator right after its battery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowUp {
    pub distribution: SourceKind,
    pub spec: TestSpec,
}

impl FollowUp {
    /// Collision test on the normal stream: `N = 2` replications of
    /// `n = 10⁷` one-dimensional points over `d = 2³⁰` cells, with `n`
    /// scaled by `scale`.
    pub fn normal_collision(scale: f64) -> Self {
        let sampling = Sampling::new(2, 10_000_000, 0);
        let sampling = if scale == 1.0 {
            sampling
        } else {
            sampling.scaled(scale, 1_000)
        };
        Self {
            distribution: SourceKind::Normal,
            spec: TestSpec::Collision(CollisionParams {
                sampling,
                cells: 1 << 30,
                dims: 1,
            }),
        }
    }

    /// The follow-ups a full campaign runs by default.
    pub fn defaults(scale: f64) -> Vec<Self> {
        vec![Self::normal_collision(scale)]
    }
}

/// What each distribution is put through.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignWork {
    /// A battery, then every follow-up registered for the distribution.
    Battery {
        plan: BatteryPlan,
        follow_ups: Vec<FollowUp>,
    },
    Single(TestSpec),
}

impl CampaignWork {
    /// A battery with no follow-ups.
    pub fn battery(plan: BatteryPlan) -> Self {
        Self::Battery {
            plan,
            follow_ups: Vec::new(),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Battery { plan, .. } => plan.label.clone(),
            Self::Single(spec) => spec.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub seed: u64,
    pub distributions: Vec<SourceKind>,
    pub work: CampaignWork,
    pub reset_between_runs: bool,
    /// Detail of battery test blocks. Single tests and follow-ups are
    /// always reported verbosely.
    pub detail: Detail,
}

impl Campaign {
    /// Full battery campaign from a configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        let plan = BatteryPlan::for_tier(config.tier).scaled(config.sample_scale);
        let follow_ups = if config.follow_ups {
            FollowUp::defaults(config.sample_scale)
        } else {
            Vec::new()
        };
        Self {
            seed: config.seed,
            distributions: config.distributions.clone(),
            work: CampaignWork::Battery { plan, follow_ups },
            reset_between_runs: config.reset_between_runs,
            detail: config.detail,
        }
    }

    /// Run every distribution in order, writing text reports to `out`.
    /// Stops at the first failure.
    pub fn run<W: Write + ?Sized>(&self, out: &mut W) -> Result<CampaignReport, CampaignError> {
        let started = Instant::now();
        let mut state = SamplerState::from_seed(self.seed);
        let mut runs = Vec::with_capacity(self.distributions.len());
        for (i, &kind) in self.distributions.iter().enumerate() {
            if self.reset_between_runs && i > 0 {
                state.reset();
            }
            let outcome = run_distribution(&mut state, kind, &self.work, self.detail, out)?;
            runs.push(outcome);
        }
        log::info!(
            "campaign over {} distribution(s) finished in {:.2?}",
            runs.len(),
            started.elapsed()
        );
        Ok(CampaignReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            version: crate::VERSION,
            seed: self.seed,
            battery: self.work.label(),
            reset_between_runs: self.reset_between_runs,
            runs,
        })
    }
}

fn enter(kind: SourceKind, stage: Stage) -> Stage {
    log::debug!("{kind}: {stage:?}");
    stage
}

/// Run `work` on an already bound generator.
fn run_work<W: Write + ?Sized>(
    r#gen: &mut dyn UniformGenerator,
    kind: SourceKind,
    work: &CampaignWork,
    detail: Detail,
    out: &mut W,
) -> Result<BatteryOutcome, BatteryError> {
    match work {
        CampaignWork::Battery { plan, follow_ups } => {
            let mut outcome = run_battery_with(r#gen, plan, detail, out)?;
            for follow_up in follow_ups.iter().filter(|f| f.distribution == kind) {
                log::info!("{kind}: follow-up {} ({})", follow_up.spec.name(), follow_up.spec);
                let extra = run_single(r#gen, &follow_up.spec, out)?;
                outcome.elapsed += extra.elapsed;
                outcome.results.extend(extra.results);
            }
            Ok(outcome)
        }
        CampaignWork::Single(spec) => run_single(r#gen, spec, out),
    }
}

/// Take one distribution through every stage.
pub fn run_distribution<W: Write + ?Sized>(
    state: &mut SamplerState,
    kind: SourceKind,
    work: &CampaignWork,
    detail: Detail,
    out: &mut W,
) -> Result<DistributionReport, CampaignError> {
    enter(kind, Stage::Idle);
    let fail = move |stage: Stage| {
        move |source: BatteryError| CampaignError {
            distribution: kind,
            stage,
            source,
        }
    };

    let source = make_source(kind, state);
    enter(kind, Stage::SourceInitialized);

    let mut generator = NamedGenerator::bind(source);
    enter(kind, Stage::GeneratorBound);
    log::info!("{kind}: generator bound with {} transform", generator.transform());

    let running = enter(kind, Stage::BatteryRunning);
    let outcome =
        run_work(&mut generator, kind, work, detail, out).map_err(fail(running))?;

    let extracted = enter(kind, Stage::ResultsExtracted);
    let tests = outcome
        .results
        .iter()
        .map(|r| {
            Ok(TestReport {
                name: r.name,
                parameters: r.spec.to_string(),
                p_values: r.p_values()?,
            })
        })
        .collect::<Result<Vec<_>, BatteryError>>()
        .map_err(fail(extracted))?;
    let suspects = outcome
        .suspects()
        .map_err(|e| fail(extracted)(e.into()))?
        .len();

    let draws = generator.draws();
    drop(generator.release());
    enter(kind, Stage::TornDown);

    Ok(DistributionReport {
        distribution: kind,
        generator: outcome.generator,
        draws,
        elapsed_secs: outcome.elapsed.as_secs_f64(),
        suspects,
        tests,
    })
}

/// Machine-readable record of a campaign.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub run_id: String,
    pub version: &'static str,
    pub seed: u64,
    pub battery: String,
    pub reset_between_runs: bool,
    pub runs: Vec<DistributionReport>,
}

impl CampaignReport {
    pub fn total_suspects(&self) -> usize {
        self.runs.iter().map(|r| r.suspects).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub distribution: SourceKind,
    pub generator: String,
    pub draws: u64,
    pub elapsed_secs: f64,
    /// p-values outside `[0.001, 0.999]`.
    pub suspects: usize,
    pub tests: Vec<TestReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub name: &'static str,
    pub parameters: String,
    pub p_values: PValueSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::Overrides;

    fn collision_work(n: usize) -> CampaignWork {
        let spec = TestSpec::default_for("collision")
            .unwrap()
            .with_overrides(&Overrides {
                n: Some(n),
                cells: Some(1 << 24),
                dims: Some(1),
                ..Overrides::default()
            })
            .unwrap();
        CampaignWork::Single(spec)
    }

    #[test]
    fn single_test_campaign_reports_each_distribution() {
        let campaign = Campaign {
            seed: 117,
            distributions: SourceKind::DEFAULT.to_vec(),
            work: collision_work(20_000),
            reset_between_runs: false,
            detail: Detail::Basic,
        };
        let mut text = Vec::new();
        let report = campaign.run(&mut text).unwrap();
        assert_eq!(report.runs.len(), 3);
        assert_eq!(report.battery, "Collision");
        for run in &report.runs {
            assert_eq!(run.draws, 20_000);
            assert_eq!(run.tests.len(), 1);
            assert_eq!(run.tests[0].name, "Collision");
        }
        let text = String::from_utf8(text).unwrap();
        assert_eq!(text.matches("Collision test:").count(), 3);
    }

    #[test]
    fn reset_makes_runs_identical() {
        let campaign = Campaign {
            seed: 5,
            distributions: vec![SourceKind::Uniform, SourceKind::Uniform],
            work: collision_work(5_000),
            reset_between_runs: true,
            detail: Detail::Basic,
        };
        let report = campaign.run(&mut std::io::sink()).unwrap();
        assert_eq!(report.runs[0].tests[0].p_values, report.runs[1].tests[0].p_values);
    }

    #[test]
    fn failures_carry_distribution_and_stage() {
        let spec = TestSpec::default_for("gap")
            .unwrap()
            .with_overrides(&Overrides {
                replications: Some(0),
                ..Overrides::default()
            })
            .unwrap();
        let campaign = Campaign {
            seed: 1,
            distributions: vec![SourceKind::Normal],
            work: CampaignWork::Single(spec),
            reset_between_runs: false,
            detail: Detail::Basic,
        };
        let err = campaign.run(&mut std::io::sink()).unwrap_err();
        assert_eq!(err.distribution, SourceKind::Normal);
        assert_eq!(err.stage, Stage::BatteryRunning);
        assert!(matches!(err.source, BatteryError::InvalidParameters { .. }));
        assert!(err.to_string().starts_with("normal run failed while running the battery"));
    }

    fn gap_plan() -> BatteryPlan {
        BatteryPlan::single(TestSpec::default_for("gap").unwrap().scaled(0.01))
    }

    fn battery_campaign(distributions: Vec<SourceKind>, follow_ups: Vec<FollowUp>) -> Campaign {
        Campaign {
            seed: 117,
            distributions,
            work: CampaignWork::Battery {
                plan: gap_plan(),
                follow_ups,
            },
            reset_between_runs: false,
            detail: Detail::Summary,
        }
    }

    #[test]
    fn follow_up_continues_the_battery_stream() {
        let follow_up = FollowUp::normal_collision(0.002);
        assert_eq!(
            follow_up.spec.to_string(),
            "N = 2, n = 20000, r = 0, d = 1073741824, t = 1"
        );

        let alone = battery_campaign(vec![SourceKind::Normal], Vec::new())
            .run(&mut std::io::sink())
            .unwrap();
        let mut text = Vec::new();
        let with = battery_campaign(vec![SourceKind::Normal], vec![follow_up])
            .run(&mut text)
            .unwrap();

        let (alone, with) = (&alone.runs[0], &with.runs[0]);
        assert_eq!(with.draws, alone.draws + 2 * 20_000);
        assert_eq!(with.tests.len(), 2);
        assert_eq!(with.tests[0].p_values, alone.tests[0].p_values);
        assert_eq!(with.tests[1].name, "Collision");
        assert_eq!(
            with.tests[1].parameters,
            "N = 2, n = 20000, r = 0, d = 1073741824, t = 1"
        );

        // Battery blocks are summary only; the follow-up is verbose.
        let text = String::from_utf8(text).unwrap();
        assert!(!text.contains("Gap test:"));
        assert!(text.contains("Collision test:"));
        assert!(text.contains("P(X >= observed)"));
    }

    #[test]
    fn follow_ups_only_run_on_their_distribution() {
        let report = battery_campaign(
            vec![SourceKind::Uniform, SourceKind::Normal, SourceKind::Exponential],
            vec![FollowUp::normal_collision(0.001)],
        )
        .run(&mut std::io::sink())
        .unwrap();
        let counts: Vec<_> = report.runs.iter().map(|r| r.tests.len()).collect();
        assert_eq!(counts, [1, 2, 1]);
    }

    #[test]
    fn config_enables_default_follow_ups() {
        let config = RunConfig {
            sample_scale: 0.01,
            ..RunConfig::default()
        };
        let CampaignWork::Battery { follow_ups, .. } = Campaign::from_config(&config).work else {
            panic!("battery");
        };
        assert_eq!(follow_ups, FollowUp::defaults(0.01));
        assert_eq!(follow_ups[0].distribution, SourceKind::Normal);

        let FollowUp { spec, .. } = FollowUp::normal_collision(1.0);
        assert_eq!(
            spec.to_string(),
            "N = 2, n = 10000000, r = 0, d = 1073741824, t = 1"
        );

        let quiet = RunConfig {
            follow_ups: false,
            ..config
        };
        let CampaignWork::Battery { follow_ups, .. } = Campaign::from_config(&quiet).work else {
            panic!("battery");
        };
        assert!(follow_ups.is_empty());
    }

    #[test]
    fn report_serializes() {
        let campaign = Campaign {
            seed: 117,
            distributions: vec![SourceKind::Exponential],
            work: collision_work(5_000),
            reset_between_runs: false,
            detail: Detail::Basic,
        };
        let report = campaign.run(&mut std::io::sink()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["seed"], 117);
        assert_eq!(json["runs"][0]["distribution"], "exponential");
        assert!(json["runs"][0]["tests"][0]["p_values"].is_number());
        assert_eq!(json["run_id"].as_str().map(str::len), Some(36));
    }
}
