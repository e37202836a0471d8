mod analyze;
mod catalog;
mod economics;
mod finance;
mod simulate;

use clap::{ArgAction, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

pub use self::{analyze::AnalyzeArgs, finance::FinanceArgs, simulate::SimulateArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    /// Increase the log verbosity: `-v` for debug, `-vv` for trace.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub const fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: size a battery against the load profile and grade the candidates.
    #[clap(name = "analyze")]
    Analyze(Box<AnalyzeArgs>),

    /// Dispatch a single battery against the load profile at a fixed demand cap.
    #[clap(name = "simulate")]
    Simulate(Box<SimulateArgs>),

    /// Grade an investment without a load profile.
    #[clap(name = "finance")]
    Finance(Box<FinanceArgs>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity() {
        let args = Args::parse_from(["peak-shaver", "-vv", "finance", "--cost", "1000"]);
        assert_eq!(args.log_level(), LevelFilter::TRACE);
    }

    #[test]
    fn test_default_verbosity() {
        let args = Args::parse_from(["peak-shaver", "finance", "--cost", "1000"]);
        assert_eq!(args.log_level(), LevelFilter::INFO);
    }
}
