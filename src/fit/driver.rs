//! Strategy dispatch and fit composition.
//!
//! `optimize` runs one search strategy against any `Objective`. `fit_model`
//! wires a series, a simulation config and a model into an `SseObjective`,
//! optimizes it and packages the winner as a `FitResult`.

use log::{info, warn};

use crate::domain::{
    Bounds, DerivedQuantities, FitResult, ModelKind, ObservationSeries, Regime, RegimeRates,
    Trajectory,
};
use crate::error::{SimulationError, SirError};
use crate::fit::evolution::{EvolutionOptions, differential_evolution};
use crate::fit::local::{LocalSearchOptions, multi_start};
use crate::fit::objective::{INFEASIBLE_SCORE, Objective, SseObjective};
use crate::fit::start_grid::default_starts;
use crate::models::{SimConfig, Simulator, SirModel};

/// `|β - γ|` at or below this leaves the doubling time undefined.
pub const DOUBLING_TIME_TOLERANCE: f64 = 1e-3;

/// Floor on the evolution `atol`, as a fraction of the data scale.
pub const EVOLUTION_ATOL_FRACTION: f64 = 1e-6;

/// How to search the parameter box.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Bounded Nelder–Mead from each start; keeps the best.
    MultiStart {
        /// Explicit starts; when `None`, a `grid_steps`-per-axis interior grid.
        starts: Option<Vec<Vec<f64>>>,
        grid_steps: usize,
        local: LocalSearchOptions,
    },
    /// Differential evolution with optional polish.
    Evolution(EvolutionOptions),
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::MultiStart {
            starts: None,
            grid_steps: 3,
            local: LocalSearchOptions::default(),
        }
    }
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::MultiStart { .. } => "multi-start",
            Strategy::Evolution(_) => "differential-evolution",
        }
    }

    /// Express cost tolerances relative to `scale`: local-search tolerances
    /// are multiplied by it and the evolution `atol` is raised to at least
    /// `EVOLUTION_ATOL_FRACTION * scale`.
    pub fn with_cost_scale(&self, scale: f64) -> Strategy {
        let mut out = self.clone();
        match &mut out {
            Strategy::MultiStart { local, .. } => local.sd_tolerance *= scale,
            Strategy::Evolution(opts) => {
                opts.local.sd_tolerance *= scale;
                opts.atol = opts.atol.max(EVOLUTION_ATOL_FRACTION * scale);
            }
        }
        out
    }
}

/// Best parameters found by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub params: Vec<f64>,
    pub score: f64,
    /// Convergence status, not validity: the parameters are usable either way.
    pub success: bool,
    pub message: String,
}

/// Minimize `objective` within `bounds`.
pub fn optimize<O: Objective + ?Sized>(
    objective: &O,
    bounds: &Bounds,
    strategy: &Strategy,
) -> Result<SearchOutcome, SirError> {
    if objective.dim() != bounds.dim() {
        return Err(SirError::DimensionMismatch {
            expected: objective.dim(),
            found: bounds.dim(),
        });
    }

    let mut outcome = match strategy {
        Strategy::MultiStart {
            starts,
            grid_steps,
            local,
        } => {
            let starts = match starts {
                Some(s) => s.clone(),
                None => default_starts(bounds, *grid_steps)?,
            };
            let out = multi_start(objective, bounds, &starts, local)?;
            SearchOutcome {
                params: out.best.params,
                score: out.best.score,
                success: out.best.converged,
                message: format!(
                    "best of {} starts is #{} ({}); {}/{} starts converged",
                    out.starts, out.best_index, out.best.message, out.converged_starts, out.starts
                ),
            }
        }
        Strategy::Evolution(opts) => {
            let out = differential_evolution(objective, bounds, opts)?;
            SearchOutcome {
                params: out.params,
                score: out.score,
                success: out.converged,
                message: out.message,
            }
        }
    };

    if outcome.score >= INFEASIBLE_SCORE {
        outcome.success = false;
        outcome.message = format!("no feasible parameters found; {}", outcome.message);
    }
    if !outcome.success {
        warn!("{} search did not converge: {}", strategy.name(), outcome.message);
    }
    Ok(outcome)
}

/// Per-regime rates, intervention effectiveness and infectious period.
pub fn derive_quantities(kind: ModelKind, params: &[f64]) -> Result<DerivedQuantities, SirError> {
    if params.len() != kind.param_count() {
        return Err(SirError::DimensionMismatch {
            expected: kind.param_count(),
            found: params.len(),
        });
    }
    let gamma = params[kind.gamma_index()];
    let rates = |regime, beta: f64| RegimeRates {
        regime,
        beta,
        r0: (gamma != 0.0).then(|| beta / gamma),
        doubling_time: ((beta - gamma).abs() > DOUBLING_TIME_TOLERANCE)
            .then(|| std::f64::consts::LN_2 / (beta - gamma)),
    };

    let (regimes, effectiveness) = match kind {
        ModelKind::Constant => (vec![rates(Regime::Constant, params[0])], None),
        ModelKind::Step | ModelKind::StepFittedDay | ModelKind::Sigmoid => {
            let (pre, post) = (params[0], params[1]);
            (
                vec![
                    rates(Regime::PreIntervention, pre),
                    rates(Regime::PostIntervention, post),
                ],
                (pre != 0.0).then(|| 1.0 - post / pre),
            )
        }
    };

    Ok(DerivedQuantities {
        regimes,
        intervention_effectiveness: effectiveness,
        infectious_period: (gamma != 0.0).then(|| 1.0 / gamma),
    })
}

/// Fit `model` to `series`.
///
/// # Arguments
/// - `config`: population, initial infected, duration (must cover the data) and resolution
/// - `bounds`: search box; the model's defaults when `None`
/// - `strategy`: local-search tolerances are taken relative to the data scale `Σ wᵢ activeᵢ²`
/// - `weights`: per-observation weights (all ones when `None`)
pub fn fit_model(
    series: &ObservationSeries,
    config: SimConfig,
    model: SirModel,
    bounds: Option<Bounds>,
    strategy: &Strategy,
    weights: Option<Vec<f64>>,
) -> Result<FitResult, SirError> {
    let kind = model.kind();
    let bounds = match bounds {
        Some(b) => b,
        None => Bounds::new(&model.default_bounds(config.duration_days))?,
    };
    if bounds.dim() != kind.param_count() {
        return Err(SirError::DimensionMismatch {
            expected: kind.param_count(),
            found: bounds.dim(),
        });
    }

    let scale = {
        let active = series.active();
        match &weights {
            Some(w) => active.iter().zip(w).map(|(a, w)| w * a * a).sum::<f64>(),
            None => active.iter().map(|a| a * a).sum::<f64>(),
        }
    };
    let strategy = strategy.with_cost_scale(scale.max(1.0));

    let simulator = Simulator::new(model);
    let objective = SseObjective::new(
        series,
        config,
        bounds.clone(),
        kind.rate_indices(),
        move |p: &[f64], c: &SimConfig| simulator.run(p, c),
        weights,
    )?;

    info!(
        "fitting {} to {} observations with {}",
        kind.display_name(),
        series.len(),
        strategy.name()
    );
    let outcome = optimize(&objective, &bounds, &strategy)?;

    let n_obs = series.len();
    let intervention_day = match kind {
        ModelKind::StepFittedDay => Some(outcome.params[3]),
        _ => model.fixed_intervention_day(),
    };
    let result = FitResult {
        model: kind,
        display_name: kind.display_name().to_string(),
        param_names: kind.param_names().iter().map(|s| s.to_string()).collect(),
        derived: derive_quantities(kind, &outcome.params)?,
        params: outcome.params,
        intervention_day,
        sse: outcome.score,
        rmse: (outcome.score / n_obs as f64).sqrt(),
        n_obs,
        success: outcome.success,
        message: outcome.message,
        strategy: strategy.name().to_string(),
        evaluations: objective.evaluations(),
    };
    info!(
        "{}: sse={:.6e} rmse={:.3} after {} evaluations",
        result.display_name, result.sse, result.rmse, result.evaluations
    );
    Ok(result)
}

/// Re-simulate a fit's parameters over `config`.
pub fn fitted_trajectory(result: &FitResult, config: &SimConfig) -> Result<Trajectory, SimulationError> {
    let model = SirModel::new(result.model, result.intervention_day.unwrap_or(0.0));
    Simulator::new(model).run(&result.params, config)
}
