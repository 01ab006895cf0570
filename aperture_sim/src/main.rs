// aperture_sim/src/main.rs

//! Command-line entry point.
//!
//! `aperture-sim run --scenario assets/scenarios/00_static_feature.toml`
//! `aperture-sim sweep --scenario assets/scenarios/01_moving_feature.toml --runs 20 --seed 7`

use std::fs::File;
use std::io::BufWriter;

use anyhow::{bail, Context, Result};
use aperture_sim::cli::{Cli, Command, RunArgs, SweepArgs};
use aperture_sim::prelude::*;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // --- 1. Logging ---
    // A good filter for focusing on our crates' logs. `RUST_LOG` overrides it.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aperture_core=info,aperture_sim=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // --- 2. Dispatch ---
    match cli.command {
        Command::Run(args) => run(args),
        Command::Sweep(args) => sweep(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = load_scenario(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;

    if args.dump_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut sim = Simulation::from_config(&config)?;
    if args.no_filter {
        sim = sim.with_filter_enabled(false);
    }

    let history = sim.run();

    if let Some(path) = &args.export {
        history
            .export_json(path)
            .with_context(|| format!("exporting run history to {}", path.display()))?;
    }

    info!(
        "Steps: {} | min h: {:?} | min h (post-step): {:?} | first violation: {:?} | fallbacks: {}",
        history.len(),
        history.min_h(),
        history.min_h_next(),
        history.first_violation(),
        history.fallback_count()
    );

    if let Some(failure) = &history.failure {
        bail!("run failed: {}", failure.message);
    }
    Ok(())
}

fn sweep(args: SweepArgs) -> Result<()> {
    let config = load_scenario(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;

    let mut rng = SimulationRng::new(args.seed.or(config.simulation.seed));
    let settings = SweepSettings {
        runs: args.runs,
        spread: args.spread,
        filter_enabled: args.no_filter.then_some(false),
    };
    let results = run_sweep(&config, &settings, &mut rng)?;

    let failed = results
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();
    let violated = results
        .iter()
        .filter(|r| r.first_violation.is_some())
        .count();
    info!(
        "Sweep finished: {} runs, {} failed, {} with a barrier violation",
        results.len(),
        failed,
        violated
    );
    if failed > 0 {
        warn!("{} runs ended early; rerun them with `run` and RUST_LOG=debug", failed);
    }

    if let Some(path) = &args.export {
        let writer = BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        serde_json::to_writer_pretty(writer, &results)?;
        info!("Sweep summary written to {}", path.display());
    }
    Ok(())
}
