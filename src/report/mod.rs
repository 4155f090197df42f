//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the simulation/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitResult, ObservationSeries, PeakStats, Regime};
use crate::fit::{ModelComparison, SweepPoint};
use crate::models::SimConfig;

fn fmt_opt(v: Option<f64>, precision: usize, unit: &str) -> String {
    match v {
        Some(x) => format!("{x:.precision$}{unit}"),
        None => "n/a".to_string(),
    }
}

fn regime_label(regime: Regime) -> &'static str {
    match regime {
        Regime::Constant => "constant",
        Regime::PreIntervention => "pre-intervention",
        Regime::PostIntervention => "post-intervention",
    }
}

/// Data and simulation setup header.
pub fn format_setup(series: &ObservationSeries, config: &SimConfig) -> String {
    let active = series.active();
    let (lo, hi) = active
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let mut out = String::new();
    out.push_str(&format!(
        "Data: n={} | days=[0, {}] | active=[{lo:.0}, {hi:.0}]\n",
        series.len(),
        series.max_day()
    ));
    out.push_str(&format!(
        "Simulation: N={:.0} | I0={:.0} | duration={}d | resolution={}/d\n",
        config.population, config.initial_infected, config.duration_days, config.resolution
    ));
    out
}

/// Parameters, derived quantities and fit diagnostics of one fit.
pub fn format_fit_summary(fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("Model: {} (strategy={})\n", fit.display_name, fit.strategy));
    if let Some(day) = fit.intervention_day {
        out.push_str(&format!("Intervention day: {day:.1}\n"));
    }

    out.push_str("\nParameters:\n");
    for (name, value) in fit.param_names.iter().zip(&fit.params) {
        out.push_str(&format!("  {name:<18} = {value:.6}\n"));
    }

    out.push_str("\nDerived:\n");
    for r in &fit.derived.regimes {
        out.push_str(&format!(
            "  R0 ({:<17}) = {} | doubling time = {}\n",
            regime_label(r.regime),
            fmt_opt(r.r0, 2, ""),
            fmt_opt(r.doubling_time, 1, " days"),
        ));
    }
    if fit.derived.regimes.len() > 1 {
        out.push_str(&format!(
            "  Intervention effectiveness = {}\n",
            fmt_opt(fit.derived.intervention_effectiveness.map(|e| e * 100.0), 1, "%")
        ));
    }
    out.push_str(&format!(
        "  Infectious period          = {}\n",
        fmt_opt(fit.derived.infectious_period, 1, " days")
    ));

    out.push_str(&format!(
        "\nFit: SSE={:.4e} | RMSE={:.0} cases | n={} | evaluations={} | converged={}\n",
        fit.sse,
        fit.rmse,
        fit.n_obs,
        fit.evaluations,
        if fit.success { "yes" } else { "no" }
    ));
    out.push_str(&format!("  {}\n", fit.message));
    out
}

pub fn format_peak(peak: &PeakStats) -> String {
    format!(
        "Peak infection: {:.2} people\nTime to peak:   {:.2} days\nFinal recovered: {:.2} people\n",
        peak.peak_infected, peak.peak_day, peak.final_recovered
    )
}

/// Model diagnostics table plus the chosen model's summary.
pub fn format_comparison(comparison: &ModelComparison) -> String {
    let mut out = String::new();
    out.push_str("Model diagnostics:\n");
    for f in &comparison.fits {
        let chosen = if f.fit.model == comparison.best.fit.model { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<24} SSE={:.4e} RMSE={:.0} BIC={:.3}\n",
            f.fit.display_name,
            f.sse,
            (f.sse / f.fit.n_obs.max(1) as f64).sqrt(),
            f.bic
        ));
    }
    for (kind, reason) in &comparison.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }
    out.push_str("\nChosen model:\n");
    out.push_str(&format_fit_summary(&comparison.best.fit));
    out
}

pub fn format_sweep(points: &[SweepPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>8} {:>14} {:>10} {:>16}\n",
        "beta", "peak infected", "peak day", "final recovered"
    ));
    for p in points {
        out.push_str(&format!(
            "{:>8.4} {:>14.2} {:>10.2} {:>16.2}\n",
            p.beta, p.peak_infected, p.peak_day, p.final_recovered
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::fit::derive_quantities;

    fn fit(kind: ModelKind, params: Vec<f64>) -> FitResult {
        FitResult {
            model: kind,
            display_name: kind.display_name().to_string(),
            param_names: kind.param_names().iter().map(|s| s.to_string()).collect(),
            derived: derive_quantities(kind, &params).unwrap(),
            params,
            intervention_day: Some(16.0),
            sse: 1234.5,
            rmse: 12.0,
            n_obs: 40,
            success: false,
            message: "reached the generation cap (200) without converging".to_string(),
            strategy: "differential-evolution".to_string(),
            evaluations: 3000,
        }
    }

    #[test]
    fn summary_lists_parameters_and_regimes() {
        let text = format_fit_summary(&fit(ModelKind::Step, vec![0.4, 0.1, 0.1]));
        assert!(text.contains("beta_pre"));
        assert!(text.contains("pre-intervention"));
        assert!(text.contains("Intervention effectiveness = 75.0%"));
        assert!(text.contains("converged=no"));
        // β_post = γ leaves the post-intervention doubling time undefined.
        assert!(text.contains("doubling time = n/a"));
    }

    #[test]
    fn constant_summary_omits_effectiveness() {
        let text = format_fit_summary(&fit(ModelKind::Constant, vec![0.3, 0.1]));
        assert!(!text.contains("effectiveness"));
        assert!(text.contains("Infectious period          = 10.0 days"));
    }
}
