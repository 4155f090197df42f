//! Command-line parsing for the SIR fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! orchestration and the modeling/math code. Fit options are all optional so
//! that flags can override a `--config` TOML file, which in turn overrides the
//! built-in defaults.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{FitConfig, ModelKind, StrategyKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sirfit", version, about = "SIR epidemic simulator and parameter fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate one constant-β epidemic and print its peak.
    Simulate(SimulateArgs),
    /// Fit one model to an observation CSV.
    Fit(FitArgs),
    /// Fit several models to the same CSV and select one by BIC.
    Compare(CompareArgs),
    /// Sweep β and report peak size and timing.
    Sweep(SweepArgs),
    /// Write a synthetic `day,active` CSV from known parameters.
    Synth(SynthArgs),
}

/// Population and time grid shared by the simulation-only commands.
#[derive(Debug, Args, Clone)]
pub struct PopulationArgs {
    /// Total population N.
    #[arg(long, default_value_t = 1000.0)]
    pub population: f64,

    /// Initially infected I0.
    #[arg(long, default_value_t = 1.0)]
    pub initial_infected: f64,

    /// Simulated days.
    #[arg(long, default_value_t = 160)]
    pub duration: u32,

    /// Output samples per day.
    #[arg(long, default_value_t = 1)]
    pub resolution: u32,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub population: PopulationArgs,

    /// Transmission rate β.
    #[arg(long, default_value_t = 0.3)]
    pub beta: f64,

    /// Recovery rate γ.
    #[arg(long, default_value_t = 0.1)]
    pub gamma: f64,

    /// Write the trajectory (`t,S,I,R`) to CSV.
    #[arg(long)]
    pub export_trajectory: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub population: PopulationArgs,

    /// Recovery rate γ.
    #[arg(long, default_value_t = 0.1)]
    pub gamma: f64,

    /// First β of the sweep.
    #[arg(long, default_value_t = 0.1)]
    pub beta_start: f64,

    /// Last β of the sweep.
    #[arg(long, default_value_t = 0.5)]
    pub beta_stop: f64,

    /// Number of β values.
    #[arg(long, default_value_t = 10)]
    pub count: usize,

    /// Write sweep results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    #[command(flatten)]
    pub population: PopulationArgs,

    /// Transmission rate β.
    #[arg(long, default_value_t = 0.25)]
    pub beta: f64,

    /// Recovery rate γ.
    #[arg(long, default_value_t = 0.08)]
    pub gamma: f64,

    /// Relative Gaussian noise applied to each sample (0 disables noise).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Noise seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,
}

/// Options for fitting. Unset options keep the config file's or default value.
#[derive(Debug, Args, Clone, Default)]
pub struct FitArgs {
    /// Observation CSV (`day,active` or `date,active`).
    #[arg(long, value_name = "CSV")]
    pub csv: Option<PathBuf>,

    /// TOML run configuration.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Total population N [default: 60360000].
    #[arg(long)]
    pub population: Option<f64>,

    /// Initially infected I0 [default: first observed active count].
    #[arg(long)]
    pub initial_infected: Option<f64>,

    /// Simulated days; must cover the last observation [default: 120].
    #[arg(long)]
    pub duration: Option<u32>,

    /// Output samples per day [default: 10].
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Transmission model [default: constant].
    #[arg(long, value_enum)]
    pub model: Option<ModelKind>,

    /// Intervention day offset [default: 16].
    #[arg(long)]
    pub intervention_day: Option<f64>,

    /// Intervention date (YYYY-MM-DD); requires a dated CSV.
    #[arg(long)]
    pub intervention_date: Option<NaiveDate>,

    /// Parameter bound `min:max`, once per parameter in model order.
    #[arg(long = "bound", value_parser = parse_bound)]
    pub bounds: Vec<(f64, f64)>,

    /// Weight of observations before the intervention [default: 1].
    #[arg(long)]
    pub pre_intervention_weight: Option<f64>,

    /// Search strategy [default: multi-start].
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// Differential-evolution seed [default: 42].
    #[arg(long)]
    pub seed: Option<u64>,

    /// Differential-evolution generation cap [default: 200].
    #[arg(long)]
    pub max_generations: Option<usize>,

    /// Differential-evolution population per parameter [default: 15].
    #[arg(long)]
    pub population_multiplier: Option<usize>,

    /// Skip the local polish after differential evolution.
    #[arg(long)]
    pub no_polish: bool,

    /// Multi-start grid points per parameter [default: 3].
    #[arg(long)]
    pub grid_steps: Option<usize>,

    /// Nelder–Mead iteration cap per start [default: 1000].
    #[arg(long)]
    pub local_max_iters: Option<u64>,

    /// Write the fit result to JSON.
    #[arg(long)]
    pub export_result: Option<PathBuf>,

    /// Write the fitted trajectory (`t,S,I,R`) to CSV.
    #[arg(long)]
    pub export_trajectory: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub fit: FitArgs,

    /// Models to compare.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [ModelKind::Constant, ModelKind::Step, ModelKind::Sigmoid])]
    pub models: Vec<ModelKind>,
}

/// Parse `min:max`.
pub fn parse_bound(s: &str) -> Result<(f64, f64), String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| format!("expected min:max, got '{s}'"))?;
    let lo = lo
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid lower bound '{lo}': {e}"))?;
    let hi = hi
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid upper bound '{hi}': {e}"))?;
    Ok((lo, hi))
}

impl FitArgs {
    /// Apply the flags that were given on top of `base`.
    pub fn apply_to(&self, mut base: FitConfig) -> FitConfig {
        if let Some(v) = &self.csv {
            base.csv_path = v.clone();
        }
        if let Some(v) = self.population {
            base.population = v;
        }
        if let Some(v) = self.initial_infected {
            base.initial_infected = Some(v);
        }
        if let Some(v) = self.duration {
            base.duration_days = v;
        }
        if let Some(v) = self.resolution {
            base.resolution = v;
        }
        if let Some(v) = self.model {
            base.model = v;
        }
        if let Some(v) = self.intervention_day {
            base.intervention_day = v;
        }
        if let Some(v) = self.intervention_date {
            base.intervention_date = Some(v);
        }
        if !self.bounds.is_empty() {
            base.bounds = Some(self.bounds.clone());
        }
        if let Some(v) = self.pre_intervention_weight {
            base.pre_intervention_weight = v;
        }
        if let Some(v) = self.strategy {
            base.strategy = v;
        }
        if let Some(v) = self.seed {
            base.seed = v;
        }
        if let Some(v) = self.max_generations {
            base.max_generations = v;
        }
        if let Some(v) = self.population_multiplier {
            base.population_multiplier = v;
        }
        if self.no_polish {
            base.polish = false;
        }
        if let Some(v) = self.grid_steps {
            base.grid_steps = v;
        }
        if let Some(v) = self.local_max_iters {
            base.local_max_iters = v;
        }
        if let Some(v) = &self.export_result {
            base.export_result = Some(v.clone());
        }
        if let Some(v) = &self.export_trajectory {
            base.export_trajectory = Some(v.clone());
        }
        base
    }
}
