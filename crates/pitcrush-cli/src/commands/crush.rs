use std::path::Path;

use clap::Args;
use pitcrush_battery::{Campaign, ConfigError, Detail, RunConfig, Tier, parse_distributions};

use super::CliError;

#[derive(Debug, Args)]
pub struct CrushArgs {
    /// Engine seed (default 117)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Battery tier: small, medium or big (aliases smallcrush, crush, bigcrush)
    #[arg(long)]
    pub battery: Option<String>,

    /// Comma-separated distributions: uniform, normal, exponential, naive-exponential
    #[arg(long)]
    pub distributions: Option<String>,

    /// Multiply every test's sample count by this factor
    #[arg(long)]
    pub scale: Option<f64>,

    /// Re-seed the engine before each distribution
    #[arg(long)]
    pub reset: bool,

    /// Skip the follow-up tests run after a distribution's battery
    #[arg(long)]
    pub no_follow_ups: bool,

    /// Report detail for battery tests: summary, basic or verbose
    #[arg(long)]
    pub detail: Option<String>,

    /// JSON run configuration; flags override its values
    #[arg(long)]
    pub config: Option<String>,

    /// Write the campaign report as JSON
    #[arg(long)]
    pub output: Option<String>,
}

/// Merge the optional config file with command-line flags.
pub fn build_config(args: &CrushArgs) -> Result<RunConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(Path::new(path))?,
        None => RunConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(battery) = &args.battery {
        config.tier = battery.parse::<Tier>()?;
    }
    if let Some(list) = &args.distributions {
        config.distributions = parse_distributions(list)?;
    }
    if let Some(scale) = args.scale {
        config.sample_scale = scale;
    }
    if args.reset {
        config.reset_between_runs = true;
    }
    if args.no_follow_ups {
        config.follow_ups = false;
    }
    if let Some(detail) = &args.detail {
        config.detail = detail.parse::<Detail>().map_err(ConfigError::Invalid)?;
    }
    config.validate()?;
    Ok(config)
}

pub fn run(args: &CrushArgs) -> Result<(), CliError> {
    let config = build_config(args)?;
    log::info!(
        "crush: tier {}, seed {}, distributions {:?}",
        config.tier,
        config.seed,
        config.distributions
    );
    let campaign = Campaign::from_config(&config);
    let report = campaign.run(&mut std::io::stdout().lock())?;
    super::finish(&report, args.output.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitcrush_core::SourceKind;

    fn args() -> CrushArgs {
        CrushArgs {
            seed: None,
            battery: None,
            distributions: None,
            scale: None,
            reset: false,
            no_follow_ups: false,
            detail: None,
            config: None,
            output: None,
        }
    }

    #[test]
    fn defaults_without_flags() {
        assert_eq!(build_config(&args()).unwrap(), RunConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"seed": 3, "tier": "medium", "distributions": ["uniform"]}"#)
            .unwrap();
        let config = build_config(&CrushArgs {
            config: Some(path.display().to_string()),
            seed: Some(11),
            distributions: Some("normal,naive".into()),
            ..args()
        })
        .unwrap();
        assert_eq!(config.seed, 11);
        assert_eq!(config.tier, Tier::Medium);
        assert_eq!(
            config.distributions,
            vec![SourceKind::Normal, SourceKind::NaiveExponential]
        );
        assert!(config.follow_ups);
    }

    #[test]
    fn follow_up_and_detail_flags() {
        let config = build_config(&CrushArgs {
            no_follow_ups: true,
            detail: Some("summary".into()),
            ..args()
        })
        .unwrap();
        assert!(!config.follow_ups);
        assert_eq!(config.detail, Detail::Summary);
        assert!(matches!(
            build_config(&CrushArgs {
                detail: Some("loud".into()),
                ..args()
            }),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn bad_flags_are_config_errors() {
        assert!(matches!(
            build_config(&CrushArgs {
                battery: Some("enormous".into()),
                ..args()
            }),
            Err(ConfigError::UnknownTier(_))
        ));
        assert!(matches!(
            build_config(&CrushArgs {
                scale: Some(-1.0),
                ..args()
            }),
            Err(ConfigError::Invalid(_))
        ));
    }
}
