use clap::Args;
use pitcrush_battery::{Campaign, CampaignWork, Detail, Overrides, TestSpec, parse_distributions};
use pitcrush_core::{DEFAULT_SEED, SourceKind};

use super::CliError;

#[derive(Debug, Args)]
pub struct SingleArgs {
    /// Test key, see `pitcrush list`
    pub test: String,

    /// Comma-separated distributions (default: uniform, normal, exponential)
    #[arg(long)]
    pub distributions: Option<String>,

    /// Engine seed (default 117)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Samples per replication
    #[arg(short = 'n', long = "samples")]
    pub n: Option<usize>,

    /// Replications
    #[arg(long)]
    pub replications: Option<usize>,

    /// Leading bits dropped from each sample
    #[arg(long)]
    pub offset_bits: Option<u32>,

    /// Cell count d
    #[arg(long)]
    pub cells: Option<u64>,

    /// Dimension t
    #[arg(long)]
    pub dims: Option<u32>,

    /// Write the campaign report as JSON
    #[arg(long)]
    pub output: Option<String>,
}

pub fn build_spec(args: &SingleArgs) -> Result<TestSpec, CliError> {
    let spec = TestSpec::default_for(&args.test)
        .ok_or_else(|| CliError::UnknownTest(args.test.clone()))?;
    let overrides = Overrides {
        n: args.n,
        replications: args.replications,
        offset_bits: args.offset_bits,
        cells: args.cells,
        dims: args.dims,
    };
    Ok(spec.with_overrides(&overrides)?)
}

pub fn run(args: &SingleArgs) -> Result<(), CliError> {
    let spec = build_spec(args)?;
    let distributions = match &args.distributions {
        Some(list) => parse_distributions(list)?,
        None => SourceKind::DEFAULT.to_vec(),
    };
    log::info!("single: {} ({spec}) on {distributions:?}", spec.name());
    let campaign = Campaign {
        seed: args.seed.unwrap_or(DEFAULT_SEED),
        distributions,
        work: CampaignWork::Single(spec),
        reset_between_runs: false,
        detail: Detail::Verbose,
    };
    let report = campaign.run(&mut std::io::stdout().lock())?;
    super::finish(&report, args.output.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitcrush_battery::BatteryError;

    fn args(test: &str) -> SingleArgs {
        SingleArgs {
            test: test.into(),
            distributions: None,
            seed: None,
            n: None,
            replications: None,
            offset_bits: None,
            cells: None,
            dims: None,
            output: None,
        }
    }

    #[test]
    fn explicit_collision_spec() {
        let spec = build_spec(&SingleArgs {
            n: Some(10_000_000),
            replications: Some(2),
            cells: Some(1 << 30),
            dims: Some(1),
            ..args("collision")
        })
        .unwrap();
        assert_eq!(
            spec.to_string(),
            "N = 2, n = 10000000, r = 0, d = 1073741824, t = 1"
        );
    }

    #[test]
    fn unknown_test_is_rejected() {
        assert!(matches!(
            build_spec(&args("spectral")),
            Err(CliError::UnknownTest(name)) if name == "spectral"
        ));
    }

    #[test]
    fn inapplicable_parameter_is_a_battery_error() {
        let err = build_spec(&SingleArgs {
            dims: Some(4),
            ..args("walk")
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Battery(BatteryError::InvalidParameters { .. })));
        assert_eq!(err.exit_code(), 2);
    }
}
