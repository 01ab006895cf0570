// aperture_sim/src/cli.rs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Aperture: simulate a camera-carrying agent that keeps features in view with a
/// control-barrier-function safety filter.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run one scenario and report the barrier margins.
    Run(RunArgs),
    /// Run a scenario repeatedly from randomly perturbed initial positions.
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// The path to the scenario TOML file to run.
    #[arg(
        short,
        long,
        default_value = "assets/scenarios/00_static_feature.toml"
    )]
    pub scenario: PathBuf,

    /// Apply the nominal command directly (barrier values are still logged).
    #[arg(long, default_value_t = false)]
    pub no_filter: bool,

    /// Write the full run history to this JSON file.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Print the resolved scenario (defaults and overrides applied) as TOML and exit.
    #[arg(long, default_value_t = false)]
    pub dump_config: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    /// The path to the scenario TOML file to sweep.
    #[arg(
        short,
        long,
        default_value = "assets/scenarios/00_static_feature.toml"
    )]
    pub scenario: PathBuf,

    /// Number of runs.
    #[arg(long, default_value_t = 10)]
    pub runs: usize,

    /// PRNG seed. Falls back to `[simulation].seed`, then to OS entropy.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Standard deviation of the initial position offset per axis, in metres.
    #[arg(long, default_value_t = 0.5)]
    pub spread: f64,

    #[arg(long, default_value_t = false)]
    pub no_filter: bool,

    /// Write the per-run summaries to this JSON file.
    #[arg(long)]
    pub export: Option<PathBuf>,
}
