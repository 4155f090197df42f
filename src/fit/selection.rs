//! Model comparison (constant vs step vs sigmoid) using BIC with guardrails.
//!
//! Each requested model is fitted to the same series and scored with:
//! - BIC = n * ln(SSE/n) + k * ln(n)
//!
//! SSE here is always unweighted, so regime weighting can shape each fit
//! without shifting the comparison between models.
//!
//! Selection rules:
//! 1. Exclude underdetermined models: require `n >= k + 5`
//! 2. Choose the model with minimum BIC
//! 3. If a simpler model is within 2 BIC points of the best, pick the simpler model

use log::info;
use serde::Serialize;

use crate::domain::{Bounds, FitResult, ModelKind, ObservationSeries};
use crate::error::SirError;
use crate::fit::driver::{Strategy, fit_model, fitted_trajectory};
use crate::models::{SimConfig, SirModel};

/// Minimum number of extra observations beyond parameter count.
const MIN_N_BUFFER: usize = 5;

/// BIC difference within which the simpler model wins.
const SIMPLICITY_MARGIN: f64 = 2.0;

/// One fitted candidate with its information criterion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFit {
    pub fit: FitResult,
    /// Unweighted SSE of the fitted trajectory (equal to `fit.sse` for unweighted fits).
    pub sse: f64,
    pub bic: f64,
}

/// Output of fitting + selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub best: ScoredFit,
    /// Fits for all attempted models (after guardrails), in request order.
    pub fits: Vec<ScoredFit>,
    /// Any models that were skipped and why.
    pub skipped: Vec<(ModelKind, String)>,
}

/// What to fit in a comparison run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    pub kinds: Vec<ModelKind>,
    /// Fixed intervention day for the step and sigmoid models.
    pub intervention_day: f64,
    pub strategy: Strategy,
    /// Weight for observations before the intervention day (1.0 disables weighting).
    pub pre_intervention_weight: f64,
}

/// Fit every requested model and select the best by BIC.
pub fn compare_models(
    series: &ObservationSeries,
    config: SimConfig,
    request: &ComparisonRequest,
) -> Result<ModelComparison, SirError> {
    let n = series.len();
    let mut fits = Vec::new();
    let mut skipped = Vec::new();

    for &kind in &request.kinds {
        let k = kind.param_count();
        if n < k + MIN_N_BUFFER {
            skipped.push((
                kind,
                format!("underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
            ));
            continue;
        }

        let model = SirModel::new(kind, request.intervention_day);
        let bounds = Bounds::new(&model.default_bounds(config.duration_days))?;
        let weights = (kind != ModelKind::Constant && request.pre_intervention_weight != 1.0)
            .then(|| series.regime_weights(request.intervention_day, request.pre_intervention_weight));

        let fit = fit_model(series, config, model, Some(bounds), &request.strategy, weights)?;
        let scored = score_fit(series, &config, fit)?;
        info!("{}: bic={:.3}", scored.fit.display_name, scored.bic);
        fits.push(scored);
    }

    if fits.is_empty() {
        return Err(SirError::InsufficientData(format!(
            "no model can be fitted to {n} observations after guardrails"
        )));
    }

    let best = select_by_bic(&fits);
    Ok(ModelComparison {
        best,
        fits,
        skipped,
    })
}

/// Attach the BIC computed from the unweighted residuals of `fit`.
fn score_fit(
    series: &ObservationSeries,
    config: &SimConfig,
    fit: FitResult,
) -> Result<ScoredFit, SirError> {
    let traj = fitted_trajectory(&fit, config)?;
    let mut sse = 0.0;
    for p in series.points() {
        let resid = traj.infected_at(p.day as f64)? - p.active;
        sse += resid * resid;
    }
    let bic = bic(series.len(), sse, fit.params.len());
    Ok(ScoredFit { fit, sse, bic })
}

pub fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let sse_per = (sse / n_f).max(1e-12);
    n_f * sse_per.ln() + (k as f64) * n_f.ln()
}

fn select_by_bic(fits: &[ScoredFit]) -> ScoredFit {
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.bic < best.bic {
            best = f;
        }
    }
    let best_bic = best.bic;

    // Walk candidates from simplest to most complex and take the first one
    // close enough to the best.
    let mut by_complexity: Vec<&ScoredFit> = fits.iter().collect();
    by_complexity.sort_by_key(|f| f.fit.model.complexity_rank());
    by_complexity
        .into_iter()
        .find(|f| f.bic <= best_bic + SIMPLICITY_MARGIN)
        .unwrap_or(best)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DerivedQuantities, Observation};

    fn scored(kind: ModelKind, bic: f64) -> ScoredFit {
        ScoredFit {
            fit: FitResult {
                model: kind,
                display_name: kind.display_name().to_string(),
                param_names: Vec::new(),
                params: Vec::new(),
                intervention_day: None,
                derived: DerivedQuantities {
                    regimes: Vec::new(),
                    intervention_effectiveness: None,
                    infectious_period: None,
                },
                sse: 0.0,
                rmse: 0.0,
                n_obs: 50,
                success: true,
                message: String::new(),
                strategy: String::new(),
                evaluations: 0,
            },
            sse: 0.0,
            bic,
        }
    }

    #[test]
    fn bic_prefers_simpler_when_close() {
        let fits = vec![scored(ModelKind::Sigmoid, 10.0), scored(ModelKind::Constant, 11.5)];
        assert_eq!(select_by_bic(&fits).fit.model, ModelKind::Constant);
    }

    #[test]
    fn bic_keeps_complex_model_when_clearly_better() {
        let fits = vec![
            scored(ModelKind::Constant, 30.0),
            scored(ModelKind::Step, 20.0),
            scored(ModelKind::Sigmoid, 10.0),
        ];
        assert_eq!(select_by_bic(&fits).fit.model, ModelKind::Sigmoid);
    }

    #[test]
    fn bic_penalizes_parameters() {
        assert!(bic(100, 50.0, 5) > bic(100, 50.0, 2));
        assert!(bic(100, 10.0, 2) < bic(100, 50.0, 2));
    }

    #[test]
    fn underdetermined_models_are_skipped() {
        let series = ObservationSeries::new(
            (0..6).map(|d| Observation { day: d, active: 1.0 + d as f64 }).collect(),
        )
        .unwrap();
        let config = SimConfig::new(1000.0, 1.0, 10, 2).unwrap();
        let request = ComparisonRequest {
            kinds: vec![ModelKind::Sigmoid],
            intervention_day: 3.0,
            strategy: Strategy::default(),
            pre_intervention_weight: 1.0,
        };
        let err = compare_models(&series, config, &request).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    fn step_series(config: &SimConfig) -> ObservationSeries {
        use crate::data::{daily, synthesize_observations};
        use crate::models::Simulator;

        let traj = Simulator::new(SirModel::step(20.0))
            .run(&[0.4, 0.05, 0.1], config)
            .unwrap();
        synthesize_observations(&traj, &daily(config.duration_days), 0.02, 7).unwrap()
    }

    fn fit_with(kind: ModelKind, params: Vec<f64>, weighted_sse: f64) -> FitResult {
        let mut fit = scored(kind, 0.0).fit;
        fit.intervention_day = (kind == ModelKind::Step).then_some(20.0);
        fit.params = params;
        fit.sse = weighted_sse;
        fit
    }

    #[test]
    fn bic_ignores_the_fit_weighting() {
        let config = SimConfig::new(1e4, 10.0, 60, 4).unwrap();
        let series = step_series(&config);

        // The same parameters reported with different weighted SSEs.
        let constant = [1.0, 3.0, 10.0].map(|w| {
            let fit = fit_with(ModelKind::Constant, vec![0.3, 0.1], w);
            score_fit(&series, &config, fit).unwrap()
        });
        let step = [1.0, 3.0, 10.0].map(|w| {
            let fit = fit_with(ModelKind::Step, vec![0.4, 0.05, 0.1], w);
            score_fit(&series, &config, fit).unwrap()
        });

        for k in 1..3 {
            assert_eq!(constant[k].bic, constant[0].bic);
            assert_eq!(step[k].bic, step[0].bic);
        }
        assert!(step[0].bic < constant[0].bic);
        assert!(step[0].sse > 0.0);
        assert_eq!(step[0].bic, bic(series.len(), step[0].sse, 3));
    }

    #[test]
    fn pre_intervention_weight_keeps_the_selection() {
        let config = SimConfig::new(1e4, 10.0, 60, 4).unwrap();
        let series = step_series(&config);
        let request = |weight| ComparisonRequest {
            kinds: vec![ModelKind::Constant, ModelKind::Step],
            intervention_day: 20.0,
            strategy: Strategy::default(),
            pre_intervention_weight: weight,
        };

        let plain = compare_models(&series, config, &request(1.0)).unwrap();
        let weighted = compare_models(&series, config, &request(3.0)).unwrap();
        assert_eq!(plain.best.fit.model, ModelKind::Step);
        assert_eq!(weighted.best.fit.model, ModelKind::Step);

        // Constant is never weighted, so its scored fit is identical.
        assert_eq!(plain.fits[0].bic, weighted.fits[0].bic);
        // Unweighted fits score exactly their own objective.
        assert_eq!(plain.fits[1].sse, plain.fits[1].fit.sse);
        // Pre-intervention residuals count three times in the weighted objective.
        assert!(weighted.fits[1].sse <= weighted.fits[1].fit.sse);
    }
}
