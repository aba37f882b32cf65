pub mod crush;
pub mod list;
pub mod single;

use std::path::Path;

use pitcrush_battery::report::write_json;
use pitcrush_battery::{BatteryError, CampaignError, CampaignReport, ConfigError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Campaign(#[from] CampaignError),

    #[error(transparent)]
    Battery(#[from] BatteryError),

    #[error("unknown test {0:?}; see `pitcrush list`")]
    UnknownTest(String),
}

impl CliError {
    /// 1 for configuration and I/O problems, 2 for battery failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::UnknownTest(_) => 1,
            Self::Battery(BatteryError::Io(_)) => 1,
            Self::Campaign(e) if matches!(e.source, BatteryError::Io(_)) => 1,
            Self::Battery(_) | Self::Campaign(_) => 2,
        }
    }
}

/// Print a per-distribution summary and write the JSON report if asked.
pub fn finish(report: &CampaignReport, output: Option<&str>) -> Result<(), CliError> {
    println!("{}", "=".repeat(60));
    println!("{:<22} {:>10} {:>12} {:>10}", "Distribution", "Tests", "Draws", "Suspects");
    println!("{}", "-".repeat(60));
    for run in &report.runs {
        println!(
            "{:<22} {:>10} {:>12} {:>10}",
            run.distribution.name(),
            run.tests.len(),
            run.draws,
            run.suspects
        );
    }
    println!("{}", "=".repeat(60));

    if let Some(path) = output {
        write_json(Path::new(path), report)?;
        println!("\nJSON report saved to: {path}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitcrush_battery::Stage;
    use pitcrush_core::SourceKind;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::UnknownTest("x".into()).exit_code(), 1);
        assert_eq!(CliError::Config(ConfigError::UnknownTier("x".into())).exit_code(), 1);
        let io = BatteryError::Io(std::io::Error::other("disk full"));
        assert_eq!(CliError::Battery(io).exit_code(), 1);
        let campaign = CampaignError {
            distribution: SourceKind::Normal,
            stage: Stage::BatteryRunning,
            source: BatteryError::InvalidParameters {
                test: "Gap",
                reason: "N must be at least 1".into(),
            },
        };
        assert_eq!(CliError::Campaign(campaign).exit_code(), 2);
    }
}
