//! # pitcrush-battery
//!
//! A Crush-style battery of ten classical randomness tests, run against any
//! [`UniformGenerator`](pitcrush_core::UniformGenerator), plus the campaign
//! runner that puts each distribution's PIT stream through it.
//!
//! ```no_run
//! use pitcrush_battery::{BatteryPlan, Tier, run_battery};
//! use pitcrush_core::{NamedGenerator, NormalSource, SamplerState};
//!
//! let mut state = SamplerState::from_seed(117);
//! let mut generator = NamedGenerator::bind(NormalSource::new(&mut state));
//! let plan = BatteryPlan::for_tier(Tier::Small);
//! let outcome = run_battery(&mut generator, &plan, &mut std::io::stdout()).unwrap();
//! println!("{} suspect p-values", outcome.suspects().unwrap().len());
//! ```

pub mod battery;
pub mod campaign;
pub mod config;
pub mod error;
pub mod report;
pub mod stats;
pub mod suite;

pub use battery::{
    BatteryOutcome, BatteryPlan, NamedResult, Overrides, Suspect, TestSpec, Tier, is_suspect,
    run_battery, run_battery_with, run_single,
};
pub use campaign::{
    Campaign, CampaignError, CampaignReport, CampaignWork, DistributionReport, FollowUp, Stage,
    TestReport, run_distribution,
};
pub use config::{ConfigError, RunConfig, parse_distributions};
pub use error::BatteryError;
pub use report::Detail;
pub use stats::{MIN_EXPECTED, SUSPECT_P, discrete_p_value};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
