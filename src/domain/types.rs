//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - handed to a rendering layer as read-only values

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SirError};
use crate::math::interp_linear;

/// One observed data point: `day` offset from the first observation and the
/// active case count on that day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub day: u32,
    pub active: f64,
}

/// Cleaned observation series, strictly increasing in day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationSeries {
    points: Vec<Observation>,
}

impl ObservationSeries {
    /// Validate and wrap a series.
    ///
    /// Fails on an empty series, non-increasing days, or a negative / non-finite
    /// active count.
    pub fn new(points: Vec<Observation>) -> Result<Self, SirError> {
        if points.is_empty() {
            return Err(SirError::EmptySeries);
        }
        for (index, p) in points.iter().enumerate() {
            if !(p.active.is_finite() && p.active >= 0.0) {
                return Err(SirError::InvalidObservation {
                    index,
                    value: p.active,
                });
            }
            if index > 0 && p.day <= points[index - 1].day {
                return Err(SirError::NonIncreasingDays {
                    index,
                    prev: points[index - 1].day,
                    day: p.day,
                });
            }
        }
        Ok(Self { points })
    }

    /// Build a series from dated observations, with day 0 at the first date.
    pub fn from_dated(rows: &[(NaiveDate, f64)]) -> Result<Self, SirError> {
        let Some(&(start, _)) = rows.first() else {
            return Err(SirError::EmptySeries);
        };
        let mut points = Vec::with_capacity(rows.len());
        for (index, &(date, active)) in rows.iter().enumerate() {
            let offset = (date - start).num_days();
            let day = u32::try_from(offset).map_err(|_| {
                SirError::InvalidConfig(format!(
                    "date {date} at index {index} precedes the first date {start}"
                ))
            })?;
            points.push(Observation { day, active });
        }
        Self::new(points)
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn max_day(&self) -> u32 {
        self.points[self.points.len() - 1].day
    }

    pub fn first_active(&self) -> f64 {
        self.points[0].active
    }

    pub fn days(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.day as f64).collect()
    }

    pub fn active(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.active).collect()
    }

    /// Per-observation weights: `pre_weight` for days before `day`, 1.0 after.
    pub fn regime_weights(&self, day: f64, pre_weight: f64) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| if (p.day as f64) < day { pre_weight } else { 1.0 })
            .collect()
    }
}

/// Days from `start` to `intervention`, clamped at 0.
pub fn intervention_day_from_dates(start: NaiveDate, intervention: NaiveDate) -> f64 {
    (intervention - start).num_days().max(0) as f64
}

/// Inclusive `[min, max]` box for a parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn new(pairs: &[(f64, f64)]) -> Result<Self, SirError> {
        if pairs.is_empty() {
            return Err(SirError::InvalidConfig("bounds must not be empty".to_string()));
        }
        for (index, &(min, max)) in pairs.iter().enumerate() {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(SirError::InvalidBounds { index, min, max });
            }
        }
        Ok(Self {
            lower: pairs.iter().map(|p| p.0).collect(),
            upper: pairs.iter().map(|p| p.1).collect(),
        })
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    /// Project `x` onto the box.
    pub fn clip(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(&v, (&lo, &hi))| if v.is_nan() { lo } else { v.clamp(lo, hi) })
            .collect()
    }

    /// Euclidean distance of `x` outside the box, each axis scaled by its width.
    pub fn normalized_excess(&self, x: &[f64]) -> f64 {
        let mut acc = 0.0;
        for (i, &v) in x.iter().enumerate() {
            let over = if v < self.lower[i] {
                self.lower[i] - v
            } else if v > self.upper[i] {
                v - self.upper[i]
            } else {
                0.0
            };
            let r = over / self.width(i);
            acc += r * r;
        }
        acc.sqrt()
    }
}

/// Which transmission-rate parameterization to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// `(β, γ)`.
    Constant,
    /// `(β_pre, β_post, γ)` with a fixed intervention day.
    Step,
    /// `(β_pre, β_post, γ, intervention_day)`.
    StepFittedDay,
    /// `(β_pre, β_post, γ, delay, transition_width)` with a fixed intervention day.
    Sigmoid,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Constant,
        ModelKind::Step,
        ModelKind::StepFittedDay,
        ModelKind::Sigmoid,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Constant => "constant beta",
            ModelKind::Step => "step beta",
            ModelKind::StepFittedDay => "step beta (fitted day)",
            ModelKind::Sigmoid => "sigmoid beta",
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Constant => &["beta", "gamma"],
            ModelKind::Step => &["beta_pre", "beta_post", "gamma"],
            ModelKind::StepFittedDay => &["beta_pre", "beta_post", "gamma", "intervention_day"],
            ModelKind::Sigmoid => &["beta_pre", "beta_post", "gamma", "delay", "transition_width"],
        }
    }

    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    /// Indices of rate-like parameters (transmission and recovery rates).
    pub fn rate_indices(self) -> &'static [usize] {
        match self {
            ModelKind::Constant => &[0, 1],
            _ => &[0, 1, 2],
        }
    }

    /// Index of γ in the parameter vector.
    pub fn gamma_index(self) -> usize {
        match self {
            ModelKind::Constant => 1,
            _ => 2,
        }
    }

    /// Order used when preferring simpler models.
    pub fn complexity_rank(self) -> usize {
        match self {
            ModelKind::Constant => 0,
            ModelKind::Step => 1,
            ModelKind::StepFittedDay => 2,
            ModelKind::Sigmoid => 3,
        }
    }
}

/// Which search strategy drives a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Deterministic grid of starts, bounded Nelder–Mead from each.
    MultiStart,
    /// Seeded differential evolution with optional polish.
    Evolution,
}

/// Dense simulated series, one sample per output time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub s: Vec<f64>,
    pub i: Vec<f64>,
    pub r: Vec<f64>,
}

/// Summary of a trajectory's epidemic curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakStats {
    pub peak_infected: f64,
    pub peak_day: f64,
    pub final_recovered: f64,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Linearly interpolated infected count at `day` (no extrapolation).
    pub fn infected_at(&self, day: f64) -> Result<f64, SimulationError> {
        interp_linear(&self.t, &self.i, day)
    }

    pub fn peak(&self) -> PeakStats {
        let mut idx = 0;
        for k in 1..self.i.len() {
            if self.i[k] > self.i[idx] {
                idx = k;
            }
        }
        PeakStats {
            peak_infected: self.i.get(idx).copied().unwrap_or(0.0),
            peak_day: self.t.get(idx).copied().unwrap_or(0.0),
            final_recovered: self.r.last().copied().unwrap_or(0.0),
        }
    }

    /// Smallest value of any compartment (negative means discretization undershoot).
    pub fn min_compartment(&self) -> f64 {
        self.s
            .iter()
            .chain(self.i.iter())
            .chain(self.r.iter())
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// Largest `|S + I + R - population|` over all samples.
    pub fn max_conservation_error(&self, population: f64) -> f64 {
        (0..self.len())
            .map(|k| (self.s[k] + self.i[k] + self.r[k] - population).abs())
            .fold(0.0, f64::max)
    }
}

/// Which β regime a rate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    Constant,
    PreIntervention,
    PostIntervention,
}

/// A β regime with its reproduction number and doubling time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegimeRates {
    pub regime: Regime,
    pub beta: f64,
    /// `β/γ`; `None` when γ = 0.
    pub r0: Option<f64>,
    /// `ln(2)/(β-γ)`; `None` when `|β-γ|` is within tolerance.
    pub doubling_time: Option<f64>,
}

/// Epidemiological quantities derived from fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedQuantities {
    pub regimes: Vec<RegimeRates>,
    /// `1 - β_post/β_pre`; `None` for single-regime models or `β_pre = 0`.
    pub intervention_effectiveness: Option<f64>,
    /// `1/γ`; `None` when γ = 0.
    pub infectious_period: Option<f64>,
}

/// Terminal output of a fit run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub display_name: String,
    pub param_names: Vec<String>,
    pub params: Vec<f64>,
    pub intervention_day: Option<f64>,
    pub derived: DerivedQuantities,
    pub sse: f64,
    pub rmse: f64,
    pub n_obs: usize,
    pub success: bool,
    pub message: String,
    pub strategy: String,
    pub evaluations: u64,
}

impl FitResult {
    /// Value of a named parameter.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.param_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.params[i])
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) or loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    pub csv_path: PathBuf,
    pub population: f64,
    /// Defaults to the first observed active count (at least 1).
    pub initial_infected: Option<f64>,
    pub duration_days: u32,
    pub resolution: u32,

    pub model: ModelKind,
    /// Fixed intervention day for `step` / `sigmoid` (also initial guess center
    /// for `step-fitted-day`). Ignored by `constant`.
    pub intervention_day: f64,
    /// Calendar date of the intervention; overrides `intervention_day` for dated CSVs.
    pub intervention_date: Option<NaiveDate>,
    /// Optional override of the model's default bounds.
    pub bounds: Option<Vec<(f64, f64)>>,
    /// Weight applied to observations before the intervention day.
    pub pre_intervention_weight: f64,

    pub strategy: StrategyKind,
    pub seed: u64,
    pub max_generations: usize,
    pub population_multiplier: usize,
    pub polish: bool,
    pub grid_steps: usize,
    pub local_max_iters: u64,

    pub export_result: Option<PathBuf>,
    pub export_trajectory: Option<PathBuf>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::new(),
            population: 60_360_000.0,
            initial_infected: None,
            duration_days: 120,
            resolution: 10,
            model: ModelKind::Constant,
            intervention_day: 16.0,
            intervention_date: None,
            bounds: None,
            pre_intervention_weight: 1.0,
            strategy: StrategyKind::MultiStart,
            seed: 42,
            max_generations: 200,
            population_multiplier: 15,
            polish: true,
            grid_steps: 3,
            local_max_iters: 1000,
            export_result: None,
            export_trajectory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(day: u32, active: f64) -> Observation {
        Observation { day, active }
    }

    #[test]
    fn series_rejects_non_increasing_days() {
        let err = ObservationSeries::new(vec![obs(0, 1.0), obs(2, 3.0), obs(2, 4.0)]).unwrap_err();
        assert_eq!(
            err,
            SirError::NonIncreasingDays {
                index: 2,
                prev: 2,
                day: 2
            }
        );
    }

    #[test]
    fn series_rejects_negative_counts() {
        let err = ObservationSeries::new(vec![obs(0, 1.0), obs(1, -3.0)]).unwrap_err();
        assert!(matches!(err, SirError::InvalidObservation { index: 1, .. }));
    }

    #[test]
    fn dated_series_uses_first_date_as_day_zero() {
        let d = |m, day| NaiveDate::from_ymd_opt(2020, m, day).unwrap();
        let series =
            ObservationSeries::from_dated(&[(d(2, 22), 79.0), (d(2, 24), 150.0), (d(3, 1), 900.0)])
                .unwrap();
        let days: Vec<u32> = series.points().iter().map(|p| p.day).collect();
        assert_eq!(days, vec![0, 2, 8]);
        assert_eq!(intervention_day_from_dates(d(2, 22), d(3, 9)), 16.0);
        assert_eq!(intervention_day_from_dates(d(3, 9), d(2, 22)), 0.0);
    }

    #[test]
    fn regime_weights_split_at_intervention() {
        let series = ObservationSeries::new(vec![obs(0, 1.0), obs(10, 2.0), obs(20, 3.0)]).unwrap();
        assert_eq!(series.regime_weights(10.0, 3.0), vec![3.0, 1.0, 1.0]);
    }

    #[test]
    fn bounds_validate_and_clip() {
        assert!(matches!(
            Bounds::new(&[(0.0, 1.0), (2.0, 2.0)]),
            Err(SirError::InvalidBounds { index: 1, .. })
        ));
        let b = Bounds::new(&[(0.0, 1.0), (-1.0, 1.0)]).unwrap();
        assert_eq!(b.clip(&[1.5, -3.0]), vec![1.0, -1.0]);
        assert!(b.contains(&[0.5, 0.0]));
        assert!(!b.contains(&[0.5, 2.0]));
        assert!((b.normalized_excess(&[1.5, 0.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn peak_stats_pick_maximum() {
        let traj = Trajectory {
            t: vec![0.0, 1.0, 2.0],
            s: vec![9.0, 7.0, 6.0],
            i: vec![1.0, 2.0, 1.5],
            r: vec![0.0, 1.0, 2.5],
        };
        let peak = traj.peak();
        assert_eq!(peak.peak_infected, 2.0);
        assert_eq!(peak.peak_day, 1.0);
        assert_eq!(peak.final_recovered, 2.5);
        assert!(traj.max_conservation_error(10.0) < 1e-12);
    }
}
