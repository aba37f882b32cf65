//! Run configuration, loadable from a JSON file.

use std::path::{Path, PathBuf};

use pitcrush_core::{DEFAULT_SEED, SourceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::battery::Tier;
use crate::report::Detail;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown battery tier {0:?} (expected small, medium or big)")]
    UnknownTier(String),

    #[error("unknown distribution {0:?}")]
    UnknownDistribution(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of one campaign. Every field has a default, so a config file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub seed: u64,
    pub tier: Tier,
    pub distributions: Vec<SourceKind>,
    /// Re-seed the engine before each distribution.
    pub reset_between_runs: bool,
    /// Multiplier on every test's sample count.
    pub sample_scale: f64,
    /// Run the default follow-up tests after each battery.
    pub follow_ups: bool,
    /// Detail of battery test blocks in the text report.
    pub detail: Detail,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            tier: Tier::Small,
            distributions: SourceKind::DEFAULT.to_vec(),
            reset_between_runs: false,
            sample_scale: 1.0,
            follow_ups: true,
            detail: Detail::Basic,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let text = serde_json::to_string_pretty(self).map_err(|e| io(e.into()))?;
        std::fs::write(path, text + "\n").map_err(io)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.distributions.is_empty() {
            return Err(ConfigError::Invalid("no distributions selected".into()));
        }
        if !(self.sample_scale.is_finite() && self.sample_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample_scale must be positive, got {}",
                self.sample_scale
            )));
        }
        Ok(())
    }
}

/// Parse a comma-separated distribution list such as `normal,exp`.
pub fn parse_distributions(list: &str) -> Result<Vec<SourceKind>, ConfigError> {
    let kinds = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<SourceKind>()
                .map_err(|_| ConfigError::UnknownDistribution(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if kinds.is_empty() {
        return Err(ConfigError::Invalid("empty distribution list".into()));
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(config.seed, 117);
        assert_eq!(config.tier, Tier::Small);
        assert_eq!(
            config.distributions,
            vec![SourceKind::Uniform, SourceKind::Normal, SourceKind::Exponential]
        );
        assert!(!config.reset_between_runs);
        assert!(config.follow_ups);
        assert_eq!(config.detail, Detail::Basic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"seed": 7, "tier": "bigcrush", "detail": "summary"}"#).unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.detail, Detail::Summary);
        assert!(config.follow_ups);
        assert_eq!(config.tier, Tier::Big);
        assert_eq!(config.sample_scale, 1.0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let config = RunConfig {
            seed: 42,
            tier: Tier::Medium,
            distributions: vec![SourceKind::NaiveExponential],
            reset_between_runs: true,
            sample_scale: 0.5,
            follow_ups: false,
            detail: Detail::Verbose,
        };
        config.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(RunConfig::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"seeed": 1}"#).unwrap();
        assert!(matches!(RunConfig::load(&bad), Err(ConfigError::Parse { .. })));

        let zero = dir.path().join("zero.json");
        std::fs::write(&zero, r#"{"sample_scale": 0.0}"#).unwrap();
        assert!(matches!(RunConfig::load(&zero), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn distribution_lists() {
        assert_eq!(
            parse_distributions("normal, exp").unwrap(),
            vec![SourceKind::Normal, SourceKind::Exponential]
        );
        assert!(matches!(
            parse_distributions("normal,cauchy"),
            Err(ConfigError::UnknownDistribution(name)) if name == "cauchy"
        ));
        assert!(matches!(parse_distributions(" , "), Err(ConfigError::Invalid(_))));
    }
}
