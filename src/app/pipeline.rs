//! Shared fit pipeline used by the `fit` and `compare` commands.
//!
//! CSV load -> simulation setup -> strategy -> fit (or comparison) -> fitted trajectory
//!
//! The command handlers can then focus on presentation and exports.

use std::path::Path;

use log::info;

use crate::domain::{
    Bounds, FitConfig, FitResult, ModelKind, ObservationSeries, StrategyKind, Trajectory,
    intervention_day_from_dates,
};
use crate::error::AppError;
use crate::fit::{
    ComparisonRequest, EvolutionOptions, LocalSearchOptions, ModelComparison, Strategy,
    compare_models, fit_model, fitted_trajectory,
};
use crate::io::ingest::load_observations;
use crate::models::{SimConfig, SirModel};

/// Everything a fit needs besides the model choice.
#[derive(Debug, Clone)]
pub struct FitInputs {
    pub series: ObservationSeries,
    pub sim: SimConfig,
    pub intervention_day: f64,
    pub strategy: Strategy,
}

/// Outputs of a single-model run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub inputs: FitInputs,
    pub fit: FitResult,
    pub trajectory: Trajectory,
}

/// Outputs of a comparison run.
#[derive(Debug, Clone)]
pub struct CompareRun {
    pub inputs: FitInputs,
    pub comparison: ModelComparison,
    pub trajectory: Trajectory,
}

/// Translate the run configuration into a search strategy.
pub fn strategy_from_config(config: &FitConfig) -> Strategy {
    let local = LocalSearchOptions {
        max_iters: config.local_max_iters,
        ..LocalSearchOptions::default()
    };
    match config.strategy {
        StrategyKind::MultiStart => Strategy::MultiStart {
            starts: None,
            grid_steps: config.grid_steps,
            local,
        },
        StrategyKind::Evolution => Strategy::Evolution(EvolutionOptions {
            population_multiplier: config.population_multiplier,
            max_generations: config.max_generations,
            seed: config.seed,
            polish: config.polish,
            local,
            ..EvolutionOptions::default()
        }),
    }
}

/// Load the CSV and resolve population, initial infected and intervention day.
pub fn prepare_inputs(config: &FitConfig) -> Result<FitInputs, AppError> {
    if config.csv_path.as_os_str().is_empty() {
        return Err(AppError::new(2, "No observation CSV given (use --csv or csv_path in the config)."));
    }
    let ingested = load_observations(Path::new(&config.csv_path))?;
    let series = ingested.series;

    let initial_infected = config
        .initial_infected
        .unwrap_or_else(|| series.first_active().max(1.0));
    let sim = SimConfig::new(
        config.population,
        initial_infected,
        config.duration_days,
        config.resolution,
    )?;

    let intervention_day = match (config.intervention_date, ingested.start_date) {
        (Some(date), Some(start)) => intervention_day_from_dates(start, date),
        (Some(_), None) => {
            return Err(AppError::new(
                2,
                "--intervention-date needs a CSV with a 'date' column.",
            ));
        }
        (None, _) => config.intervention_day,
    };

    info!(
        "loaded {} observations from {} (last day {})",
        series.len(),
        config.csv_path.display(),
        series.max_day()
    );

    Ok(FitInputs {
        series,
        sim,
        intervention_day,
        strategy: strategy_from_config(config),
    })
}

/// Fit the configured model.
pub fn run_fit(config: &FitConfig) -> Result<FitRun, AppError> {
    let inputs = prepare_inputs(config)?;
    let model = SirModel::new(config.model, inputs.intervention_day);

    let bounds = config
        .bounds
        .as_deref()
        .map(Bounds::new)
        .transpose()?;
    let weights = (config.model != ModelKind::Constant && config.pre_intervention_weight != 1.0)
        .then(|| {
            inputs
                .series
                .regime_weights(inputs.intervention_day, config.pre_intervention_weight)
        });

    let fit = fit_model(
        &inputs.series,
        inputs.sim,
        model,
        bounds,
        &inputs.strategy,
        weights,
    )?;
    let trajectory = fitted_trajectory(&fit, &inputs.sim)
        .map_err(|e| AppError::new(4, format!("Failed to simulate fitted parameters: {e}")))?;

    Ok(FitRun {
        inputs,
        fit,
        trajectory,
    })
}

/// Fit every model in `kinds` and select one.
pub fn run_compare(config: &FitConfig, kinds: &[ModelKind]) -> Result<CompareRun, AppError> {
    let inputs = prepare_inputs(config)?;
    let request = ComparisonRequest {
        kinds: kinds.to_vec(),
        intervention_day: inputs.intervention_day,
        strategy: inputs.strategy.clone(),
        pre_intervention_weight: config.pre_intervention_weight,
    };
    let comparison = compare_models(&inputs.series, inputs.sim, &request)?;
    let trajectory = fitted_trajectory(&comparison.best.fit, &inputs.sim)
        .map_err(|e| AppError::new(4, format!("Failed to simulate fitted parameters: {e}")))?;

    Ok(CompareRun {
        inputs,
        comparison,
        trajectory,
    })
}
