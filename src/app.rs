//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the run configuration (defaults < TOML file < flags)
//! - runs simulation, fitting, comparison or sweeps
//! - prints reports
//! - writes optional exports

use std::path::Path;

use clap::Parser;

use crate::cli::{Command, CompareArgs, FitArgs, PopulationArgs, SimulateArgs, SweepArgs, SynthArgs};
use crate::data::{daily, synthesize_observations};
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::io::export::{FitFile, write_json, write_sweep_csv, write_trajectory_csv};
use crate::models::{SimConfig, SirModel, Simulator};

pub mod pipeline;

/// Entry point for the `sirfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Fit(args) => handle_fit(args),
        Command::Compare(args) => handle_compare(args),
        Command::Sweep(args) => handle_sweep(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn sim_config(args: &PopulationArgs) -> Result<SimConfig, AppError> {
    Ok(SimConfig::new(
        args.population,
        args.initial_infected,
        args.duration,
        args.resolution,
    )?)
}

/// Defaults, overridden by `--config`, overridden by flags.
pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let base = match &args.config {
        Some(path) => crate::io::config::load_config(path)?,
        None => FitConfig::default(),
    };
    Ok(args.apply_to(base))
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = sim_config(&args.population)?;
    let traj = Simulator::new(SirModel::constant())
        .run(&[args.beta, args.gamma], &config)
        .map_err(|e| AppError::new(4, format!("Simulation failed: {e}")))?;

    println!("=== sirfit - SIR simulation ===");
    println!(
        "N={:.0} | I0={:.0} | beta={} | gamma={} | R0={:.2}",
        config.population,
        config.initial_infected,
        args.beta,
        args.gamma,
        args.beta / args.gamma
    );
    print!("{}", crate::report::format_peak(&traj.peak()));

    if let Some(path) = &args.export_trajectory {
        write_trajectory_csv(path, &traj)?;
    }
    Ok(())
}

fn write_fit_exports(
    config: &FitConfig,
    sim: &SimConfig,
    fit: &crate::domain::FitResult,
    traj: &crate::domain::Trajectory,
) -> Result<(), AppError> {
    if let Some(path) = &config.export_result {
        write_json(path, &FitFile::new(sim, fit, Some(traj)))?;
    }
    if let Some(path) = &config.export_trajectory {
        write_trajectory_csv(path, traj)?;
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    println!("=== sirfit - SIR fit ===");
    print!(
        "{}",
        crate::report::format_setup(&run.inputs.series, &run.inputs.sim)
    );
    println!();
    print!("{}", crate::report::format_fit_summary(&run.fit));
    println!();
    print!("{}", crate::report::format_peak(&run.trajectory.peak()));

    write_fit_exports(&config, &run.inputs.sim, &run.fit, &run.trajectory)
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.fit)?;
    let run = pipeline::run_compare(&config, &args.models)?;

    println!("=== sirfit - SIR model comparison ===");
    print!(
        "{}",
        crate::report::format_setup(&run.inputs.series, &run.inputs.sim)
    );
    println!();
    print!("{}", crate::report::format_comparison(&run.comparison));

    write_fit_exports(
        &config,
        &run.inputs.sim,
        &run.comparison.best.fit,
        &run.trajectory,
    )
}

fn handle_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = sim_config(&args.population)?;
    let points = crate::fit::beta_sweep(
        &config,
        args.gamma,
        args.beta_start,
        args.beta_stop,
        args.count,
    )?;

    println!("=== sirfit - beta sensitivity (gamma={}) ===", args.gamma);
    print!("{}", crate::report::format_sweep(&points));

    if let Some(path) = &args.export {
        write_sweep_csv(path, &points)?;
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = sim_config(&args.population)?;
    let traj = Simulator::new(SirModel::constant())
        .run(&[args.beta, args.gamma], &config)
        .map_err(|e| AppError::new(4, format!("Simulation failed: {e}")))?;
    let series = synthesize_observations(&traj, &daily(config.duration_days), args.noise, args.seed)?;

    crate::io::export::write_observations_csv(Path::new(&args.out), &series)?;
    println!(
        "Wrote {} observations to {}",
        series.len(),
        args.out.display()
    );
    Ok(())
}
