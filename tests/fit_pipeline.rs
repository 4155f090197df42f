use sir_fit::data::{daily, synthesize_observations};
use sir_fit::domain::{Bounds, ModelKind, Observation, ObservationSeries};
use sir_fit::error::SirError;
use sir_fit::fit::{
    ComparisonRequest, EvolutionOptions, INFEASIBLE_SCORE, LocalSearchOptions, Objective,
    SseObjective, Strategy, compare_models, fit_model,
};
use sir_fit::models::{SimConfig, SirModel, Simulator};

fn synthetic(model: SirModel, params: &[f64], config: &SimConfig, noise: f64) -> ObservationSeries {
    let traj = Simulator::new(model).run(params, config).unwrap();
    synthesize_observations(&traj, &daily(config.duration_days), noise, 7).unwrap()
}

fn data_scale(series: &ObservationSeries) -> f64 {
    series.active().iter().map(|a| a * a).sum()
}

#[test]
fn constant_fit_recovers_known_parameters() {
    let config = SimConfig::new(1e6, 10.0, 120, 10).unwrap();
    let series = synthetic(SirModel::constant(), &[0.25, 0.08], &config, 0.0);

    let fit = fit_model(
        &series,
        config,
        SirModel::constant(),
        None,
        &Strategy::default(),
        None,
    )
    .unwrap();

    let beta = fit.param("beta").unwrap();
    let gamma = fit.param("gamma").unwrap();
    assert!((beta - 0.25).abs() / 0.25 < 0.05, "beta={beta}");
    assert!((gamma - 0.08).abs() / 0.08 < 0.05, "gamma={gamma}");
    assert!(fit.sse < 1e-6 * data_scale(&series), "sse={}", fit.sse);
    assert_eq!(fit.n_obs, 121);
    assert!((fit.derived.regimes[0].r0.unwrap() - 3.125).abs() < 0.1);
    assert!(fit.evaluations > 0);
}

#[test]
fn evolution_is_reproducible_for_a_seed() {
    let config = SimConfig::new(1e5, 10.0, 80, 2).unwrap();
    let series = synthetic(SirModel::constant(), &[0.3, 0.1], &config, 0.05);
    let strategy = Strategy::Evolution(EvolutionOptions {
        max_generations: 15,
        seed: 11,
        ..EvolutionOptions::default()
    });

    let a = fit_model(&series, config, SirModel::constant(), None, &strategy, None).unwrap();
    let b = fit_model(&series, config, SirModel::constant(), None, &strategy, None).unwrap();
    assert_eq!(a.params, b.params);
    assert_eq!(a.sse.to_bits(), b.sse.to_bits());
    assert_eq!(a.success, b.success);
    assert_eq!(a.strategy, "differential-evolution");
}

#[test]
fn evolution_fits_a_step_intervention() {
    // Small enough that S is visibly depleted by the intervention, which
    // separates β from γ.
    let config = SimConfig::new(1e4, 10.0, 60, 4).unwrap();
    let truth = [0.4, 0.05, 0.1];
    let series = synthetic(SirModel::step(20.0), &truth, &config, 0.0);

    let strategy = Strategy::Evolution(EvolutionOptions {
        seed: 3,
        ..EvolutionOptions::default()
    });
    let fit = fit_model(&series, config, SirModel::step(20.0), None, &strategy, None).unwrap();

    for (got, want) in fit.params.iter().zip(truth) {
        assert!((got - want).abs() / want < 0.1, "params={:?}", fit.params);
    }
    assert_eq!(fit.intervention_day, Some(20.0));
    let eff = fit.derived.intervention_effectiveness.unwrap();
    assert!((eff - 0.875).abs() < 0.05, "effectiveness={eff}");
}

#[test]
fn evolution_recovers_a_fitted_intervention_day() {
    let config = SimConfig::new(1e4, 10.0, 60, 4).unwrap();
    let truth = [0.4, 0.05, 0.1, 20.0];
    let series = synthetic(SirModel::step_fitted_day(), &truth, &config, 0.0);

    let strategy = Strategy::Evolution(EvolutionOptions {
        seed: 5,
        ..EvolutionOptions::default()
    });
    let fit = fit_model(
        &series,
        config,
        SirModel::step_fitted_day(),
        None,
        &strategy,
        None,
    )
    .unwrap();

    assert_eq!(fit.model, ModelKind::StepFittedDay);
    for (got, want) in fit.params.iter().zip(truth) {
        assert!((got - want).abs() / want < 0.1, "params={:?}", fit.params);
    }
    let day = fit.intervention_day.unwrap();
    assert!((day - 20.0).abs() < 1.0, "intervention_day={day}");
    assert_eq!(fit.param("intervention_day"), Some(day));
}

#[test]
fn evolution_fits_a_smooth_transition() {
    let config = SimConfig::new(5e4, 10.0, 80, 4).unwrap();
    let truth = [0.45, 0.08, 0.1, 8.0, 5.0];
    let series = synthetic(SirModel::sigmoid(15.0), &truth, &config, 0.0);

    let strategy = Strategy::Evolution(EvolutionOptions {
        seed: 9,
        ..EvolutionOptions::default()
    });
    let fit = fit_model(&series, config, SirModel::sigmoid(15.0), None, &strategy, None).unwrap();

    for (got, want) in fit.params.iter().zip(truth) {
        assert!((got - want).abs() / want < 0.1, "params={:?}", fit.params);
    }
    assert_eq!(fit.intervention_day, Some(15.0));
    assert!(fit.sse < 1e-6 * data_scale(&series), "sse={}", fit.sse);
}

#[test]
fn short_duration_fails_before_searching() {
    let series = ObservationSeries::new(
        (0..=50).map(|d| Observation { day: d, active: 1.0 }).collect(),
    )
    .unwrap();
    let config = SimConfig::new(1000.0, 1.0, 30, 1).unwrap();
    let err = fit_model(
        &series,
        config,
        SirModel::constant(),
        None,
        &Strategy::default(),
        None,
    )
    .unwrap_err();
    assert_eq!(
        err,
        SirError::DurationTooShort {
            duration: 30,
            max_day: 50
        }
    );
}

#[test]
fn negative_rate_is_a_score_not_an_error() {
    let config = SimConfig::new(1000.0, 1.0, 30, 1).unwrap();
    let series = synthetic(SirModel::constant(), &[0.3, 0.1], &config, 0.0);
    let sim = Simulator::new(SirModel::constant());
    let objective = SseObjective::new(
        &series,
        config,
        Bounds::new(&[(-2.0, 2.0), (-2.0, 2.0)]).unwrap(),
        ModelKind::Constant.rate_indices(),
        move |p: &[f64], c: &SimConfig| sim.run(p, c),
        None,
    )
    .unwrap();

    assert_eq!(objective.score(&[-1.0, 0.1]).unwrap(), INFEASIBLE_SCORE);
    assert_eq!(objective.score(&[0.3, -0.1]).unwrap(), INFEASIBLE_SCORE);
    assert!(objective.score(&[0.3, 0.1]).unwrap() < 1e-6);
}

#[test]
fn explicit_starts_are_honored() {
    let config = SimConfig::new(1e4, 5.0, 60, 2).unwrap();
    let series = synthetic(SirModel::constant(), &[0.3, 0.1], &config, 0.0);
    let strategy = Strategy::MultiStart {
        starts: Some(vec![vec![0.28, 0.11]]),
        grid_steps: 3,
        local: LocalSearchOptions::default(),
    };
    let fit = fit_model(&series, config, SirModel::constant(), None, &strategy, None).unwrap();
    assert!(fit.message.starts_with("best of 1 starts"), "{}", fit.message);
    assert!((fit.params[0] - 0.3).abs() < 0.01);
}

#[test]
fn comparison_picks_step_for_an_intervention() {
    let config = SimConfig::new(1e4, 10.0, 60, 4).unwrap();
    let series = synthetic(SirModel::step(20.0), &[0.4, 0.05, 0.1], &config, 0.02);

    let request = ComparisonRequest {
        kinds: vec![ModelKind::Constant, ModelKind::Step],
        intervention_day: 20.0,
        strategy: Strategy::default(),
        pre_intervention_weight: 1.0,
    };
    let comparison = compare_models(&series, config, &request).unwrap();
    assert_eq!(comparison.fits.len(), 2);
    assert!(comparison.skipped.is_empty());
    assert_eq!(comparison.best.fit.model, ModelKind::Step);
}
