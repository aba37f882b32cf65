//! CLI for pitcrush: battery-test normal and exponential generators through
//! their probability integral transform.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pitcrush")]
#[command(
    about = "pitcrush: run a randomness battery on PIT-transformed normal and exponential streams"
)]
#[command(version = pitcrush_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the battery on each selected distribution
    Crush(commands::crush::CrushArgs),

    /// Run one test with explicit parameters, e.g.
    /// `single collision --distributions normal -n 10000000 --cells 1073741824 --dims 1`
    Single(commands::single::SingleArgs),

    /// List the test catalogue and tier sizes
    List,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crush(args) => commands::crush::run(&args),
        Commands::Single(args) => commands::single::run(&args),
        Commands::List => {
            commands::list::run();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crush_flags() {
        let cli = Cli::try_parse_from([
            "pitcrush",
            "crush",
            "--battery",
            "bigcrush",
            "--distributions",
            "normal,exp",
            "--seed",
            "9",
            "--scale",
            "0.5",
            "--reset",
            "--no-follow-ups",
            "--detail",
            "verbose",
        ])
        .unwrap();
        let Commands::Crush(args) = cli.command else {
            panic!("expected crush");
        };
        assert_eq!(args.battery.as_deref(), Some("bigcrush"));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.scale, Some(0.5));
        assert!(args.reset);
        assert!(args.no_follow_ups);
        assert_eq!(args.detail.as_deref(), Some("verbose"));
    }

    #[test]
    fn parses_single_collision_run() {
        let cli = Cli::try_parse_from([
            "pitcrush",
            "single",
            "collision",
            "--distributions",
            "normal",
            "--replications",
            "2",
            "-n",
            "10000000",
            "--cells",
            "1073741824",
            "--dims",
            "1",
        ])
        .unwrap();
        let Commands::Single(args) = cli.command else {
            panic!("expected single");
        };
        assert_eq!(args.test, "collision");
        assert_eq!(args.n, Some(10_000_000));
        assert_eq!(args.cells, Some(1 << 30));
        assert_eq!(args.dims, Some(1));
    }

    #[test]
    fn list_takes_no_arguments() {
        assert!(Cli::try_parse_from(["pitcrush", "list"]).is_ok());
        assert!(Cli::try_parse_from(["pitcrush", "list", "--seed", "1"]).is_err());
    }
}
