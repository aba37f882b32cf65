//! End-to-end battery runs at reduced size.

use pitcrush_battery::report::write_json;
use pitcrush_battery::{
    BatteryPlan, Campaign, RunConfig, TestSpec, Tier, is_suspect, run_battery, run_single,
};
use pitcrush_core::{
    NamedGenerator, NormalSource, SamplerState, SourceKind, TransformError, UniformGenerator,
};

const QUICK: f64 = 0.002;

struct Constant;

impl UniformGenerator for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn next_uniform(&mut self) -> Result<f64, TransformError> {
        Ok(0.5)
    }
}

#[test]
fn normal_pit_stream_runs_all_ten_tests() {
    let mut state = SamplerState::from_seed(117);
    let mut generator = NamedGenerator::bind(NormalSource::new(&mut state));
    let plan = BatteryPlan::for_tier(Tier::Small).scaled(QUICK);

    let mut text = Vec::new();
    let outcome = run_battery(&mut generator, &plan, &mut text).unwrap();

    assert_eq!(outcome.results.len(), 10);
    assert_eq!(outcome.generator, "normal");
    let p_values = outcome.p_values().unwrap();
    let names: Vec<_> = p_values.iter().map(|(name, _)| *name).collect();
    assert_eq!(names[0], "BirthdaySpacings");
    assert_eq!(names[9], "RandomWalk1");
    assert_eq!(p_values[9].1.values().len(), 5);
    for (name, summary) in &p_values {
        for p in summary.values() {
            assert!((0.0..=1.0).contains(p), "{name}: {p}");
        }
    }
    // 14 statistics; a good stream should flag at most a couple.
    assert_eq!(outcome.statistic_count().unwrap(), 14);
    assert!(outcome.suspects().unwrap().len() <= 2);

    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("Summary results of small"));
    assert!(text.contains("RandomWalk1 test:"));
}

#[test]
fn constant_generator_fails_most_tests() {
    let plan = BatteryPlan::for_tier(Tier::Small).scaled(QUICK);
    let outcome = run_battery(&mut Constant, &plan, &mut std::io::sink()).unwrap();
    let suspects = outcome.suspects().unwrap();
    assert!(suspects.len() >= 10, "only {} suspects", suspects.len());
    assert!(suspects.iter().any(|s| s.test == "BirthdaySpacings"));
    assert!(suspects.iter().all(|s| is_suspect(s.p_value)));
}

#[test]
fn single_test_with_explicit_parameters() {
    let mut state = SamplerState::from_seed(117);
    let mut generator = NamedGenerator::bind(NormalSource::new(&mut state));
    let spec = TestSpec::default_for("coupon").unwrap().scaled(0.01);
    let outcome = run_single(&mut generator, &spec, &mut std::io::sink()).unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.battery, "CouponCollector");
}

#[test]
fn campaign_report_round_trips_through_json() {
    let config = RunConfig {
        distributions: vec![SourceKind::Exponential, SourceKind::NaiveExponential],
        sample_scale: QUICK,
        reset_between_runs: true,
        ..RunConfig::default()
    };
    let campaign = Campaign::from_config(&config);
    let report = campaign.run(&mut std::io::sink()).unwrap();
    assert_eq!(report.runs.len(), 2);
    assert_eq!(report.runs[1].generator, "naive-exponential");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("campaign.json");
    write_json(&path, &report).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["seed"], 117);
    assert_eq!(json["reset_between_runs"], true);
    let runs = json["runs"].as_array().unwrap();
    assert_eq!(runs[0]["distribution"], "exponential");
    assert_eq!(runs[1]["distribution"], "naive-exponential");
    let tests = runs[0]["tests"].as_array().unwrap();
    assert_eq!(tests.len(), 10);
    assert_eq!(tests[9]["p_values"].as_array().map(Vec::len), Some(5));
}

#[test]
#[ignore = "full-size small tier takes minutes"]
fn full_small_tier_on_normal_stream() {
    let mut state = SamplerState::from_seed(117);
    let mut generator = NamedGenerator::bind(NormalSource::new(&mut state));
    let outcome = run_battery(
        &mut generator,
        &BatteryPlan::for_tier(Tier::Small),
        &mut std::io::stdout(),
    )
    .unwrap();
    assert!(outcome.suspects().unwrap().len() <= 2);
}
