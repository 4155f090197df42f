//! Fit-quality scoring.
//!
//! An `SseObjective` is built once per fit from a fixed observation series and
//! a simulator closure. Scoring a parameter vector:
//!
//! 1. rejects non-positive rates and out-of-bounds values with `INFEASIBLE_SCORE`
//! 2. simulates a trajectory
//! 3. interpolates `I(t)` onto each observation day
//! 4. returns `Σ wᵢ (I(dayᵢ) - activeᵢ)²`
//!
//! Numerical simulation failures also score `INFEASIBLE_SCORE`. Anything else
//! (a wrong-length parameter vector, a malformed time grid) is a wiring error
//! and comes back as `Err`.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::domain::{Bounds, ObservationSeries, Trajectory};
use crate::error::{SimulationError, SirError};
use crate::models::SimConfig;

/// Score of an infeasible parameter vector: maximally bad but still finite.
pub const INFEASIBLE_SCORE: f64 = 1e20;

/// Something a search strategy can minimize.
///
/// `score` must be deterministic and safe to call from several threads at once.
pub trait Objective: Sync {
    fn dim(&self) -> usize;

    fn score(&self, params: &[f64]) -> Result<f64, SirError>;

    /// Number of `score` calls so far.
    fn evaluations(&self) -> u64 {
        0
    }
}

/// Weighted sum of squared errors between simulated and observed active cases.
pub struct SseObjective<F> {
    days: Vec<f64>,
    active: Vec<f64>,
    weights: Vec<f64>,
    config: SimConfig,
    bounds: Bounds,
    rate_indices: Vec<usize>,
    simulate: F,
    evaluations: AtomicU64,
}

impl<F> SseObjective<F>
where
    F: Fn(&[f64], &SimConfig) -> Result<Trajectory, SimulationError> + Sync,
{
    /// Build an objective.
    ///
    /// # Arguments
    /// - `series`: observations to compare against
    /// - `config`: population, initial infected, duration and resolution
    /// - `bounds`: search box; values outside it are never simulated
    /// - `rate_indices`: positions of rate parameters that must stay `> 0`
    /// - `simulate`: parameters → trajectory
    /// - `weights`: per-observation weights (all ones when `None`)
    pub fn new(
        series: &ObservationSeries,
        config: SimConfig,
        bounds: Bounds,
        rate_indices: &[usize],
        simulate: F,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, SirError> {
        if series.is_empty() {
            return Err(SirError::EmptySeries);
        }
        if config.duration_days < series.max_day() {
            return Err(SirError::DurationTooShort {
                duration: config.duration_days,
                max_day: series.max_day(),
            });
        }

        let weights = match weights {
            Some(w) => {
                if w.len() != series.len() {
                    return Err(SirError::WeightsMismatch {
                        expected: series.len(),
                        found: w.len(),
                    });
                }
                if let Some((index, &value)) = w
                    .iter()
                    .enumerate()
                    .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
                {
                    return Err(SirError::InvalidWeight { index, value });
                }
                w
            }
            None => vec![1.0; series.len()],
        };

        if let Some(&bad) = rate_indices.iter().find(|&&i| i >= bounds.dim()) {
            return Err(SirError::InvalidConfig(format!(
                "rate index {bad} is out of range for {} parameters",
                bounds.dim()
            )));
        }

        Ok(Self {
            days: series.days(),
            active: series.active(),
            weights,
            config,
            bounds,
            rate_indices: rate_indices.to_vec(),
            simulate,
            evaluations: AtomicU64::new(0),
        })
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn n_obs(&self) -> usize {
        self.days.len()
    }

    /// Weighted SSE of an already simulated trajectory.
    pub fn sse_of(&self, traj: &Trajectory) -> Result<f64, SimulationError> {
        let mut sse = 0.0;
        for k in 0..self.days.len() {
            let fitted = traj.infected_at(self.days[k])?;
            let resid = fitted - self.active[k];
            sse += self.weights[k] * resid * resid;
        }
        Ok(sse)
    }

    /// Simulate `params` over the configured duration.
    pub fn trajectory(&self, params: &[f64]) -> Result<Trajectory, SimulationError> {
        (self.simulate)(params, &self.config)
    }

    fn infeasible(&self, params: &[f64]) -> bool {
        self.rate_indices.iter().any(|&i| !(params[i] > 0.0)) || !self.bounds.contains(params)
    }
}

impl<F> Objective for SseObjective<F>
where
    F: Fn(&[f64], &SimConfig) -> Result<Trajectory, SimulationError> + Sync,
{
    fn dim(&self) -> usize {
        self.bounds.dim()
    }

    fn score(&self, params: &[f64]) -> Result<f64, SirError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        if params.len() != self.dim() {
            return Err(SirError::DimensionMismatch {
                expected: self.dim(),
                found: params.len(),
            });
        }
        if self.infeasible(params) {
            return Ok(INFEASIBLE_SCORE);
        }

        let sse = self.trajectory(params).and_then(|traj| self.sse_of(&traj));
        match sse {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(v) => {
                debug!("non-finite SSE {v} at {params:?}; scoring as infeasible");
                Ok(INFEASIBLE_SCORE)
            }
            Err(e) if e.is_numerical() => {
                debug!("simulation failed at {params:?} ({e}); scoring as infeasible");
                Ok(INFEASIBLE_SCORE)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use crate::error::IntegrationError;
    use crate::models::{SirModel, Simulator};

    fn series() -> ObservationSeries {
        ObservationSeries::new(vec![
            Observation { day: 0, active: 1.0 },
            Observation { day: 10, active: 6.0 },
            Observation { day: 20, active: 30.0 },
        ])
        .unwrap()
    }

    fn config(duration: u32) -> SimConfig {
        SimConfig::new(1000.0, 1.0, duration, 2).unwrap()
    }

    fn constant_bounds() -> Bounds {
        Bounds::new(&[(-2.0, 1.0), (0.01, 0.5)]).unwrap()
    }

    fn sim() -> impl Fn(&[f64], &SimConfig) -> Result<Trajectory, SimulationError> + Sync {
        let s = Simulator::new(SirModel::constant());
        move |p: &[f64], c: &SimConfig| s.run(p, c)
    }

    #[test]
    fn duration_shorter_than_data_fails_construction() {
        let err = SseObjective::new(&series(), config(15), constant_bounds(), &[0, 1], sim(), None)
            .err()
            .unwrap();
        assert_eq!(
            err,
            SirError::DurationTooShort {
                duration: 15,
                max_day: 20
            }
        );
    }

    #[test]
    fn negative_rate_scores_sentinel() {
        let obj =
            SseObjective::new(&series(), config(30), constant_bounds(), &[0, 1], sim(), None).unwrap();
        assert_eq!(obj.score(&[-1.0, 0.1]).unwrap(), INFEASIBLE_SCORE);
        assert_eq!(obj.score(&[0.0, 0.1]).unwrap(), INFEASIBLE_SCORE);
        assert_eq!(obj.score(&[f64::NAN, 0.1]).unwrap(), INFEASIBLE_SCORE);
    }

    #[test]
    fn out_of_bounds_is_never_simulated() {
        let calls = AtomicU64::new(0);
        let s = Simulator::new(SirModel::constant());
        let counting = |p: &[f64], c: &SimConfig| {
            calls.fetch_add(1, Ordering::Relaxed);
            s.run(p, c)
        };
        let obj =
            SseObjective::new(&series(), config(30), constant_bounds(), &[0, 1], counting, None)
                .unwrap();
        assert_eq!(obj.score(&[0.3, 0.9]).unwrap(), INFEASIBLE_SCORE);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert!(obj.score(&[0.3, 0.1]).unwrap() < INFEASIBLE_SCORE);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(obj.evaluations(), 2);
    }

    #[test]
    fn score_is_deterministic_and_weighted() {
        let obj =
            SseObjective::new(&series(), config(30), constant_bounds(), &[0, 1], sim(), None).unwrap();
        let a = obj.score(&[0.3, 0.1]).unwrap();
        let b = obj.score(&[0.3, 0.1]).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());

        // Day 0 matches I0 exactly, so zeroing the other weights zeroes the SSE.
        let obj = SseObjective::new(
            &series(),
            config(30),
            constant_bounds(),
            &[0, 1],
            sim(),
            Some(vec![1.0, 0.0, 0.0]),
        )
        .unwrap();
        assert_eq!(obj.score(&[0.3, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn numerical_failures_map_to_sentinel() {
        let failing = |_: &[f64], _: &SimConfig| -> Result<Trajectory, SimulationError> {
            Err(IntegrationError::NonFiniteDerivative { t: 3.0 }.into())
        };
        let obj =
            SseObjective::new(&series(), config(30), constant_bounds(), &[0, 1], failing, None)
                .unwrap();
        assert_eq!(obj.score(&[0.3, 0.1]).unwrap(), INFEASIBLE_SCORE);
    }

    #[test]
    fn wiring_errors_propagate() {
        let broken = |_: &[f64], _: &SimConfig| -> Result<Trajectory, SimulationError> {
            Err(IntegrationError::InvalidInput("no output times".into()).into())
        };
        let obj =
            SseObjective::new(&series(), config(30), constant_bounds(), &[0, 1], broken, None)
                .unwrap();
        assert!(obj.score(&[0.3, 0.1]).is_err());
        assert!(matches!(
            obj.score(&[0.3]),
            Err(SirError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn bad_weights_fail_construction() {
        let err = SseObjective::new(
            &series(),
            config(30),
            constant_bounds(),
            &[0, 1],
            sim(),
            Some(vec![1.0, -1.0, 1.0]),
        )
        .err()
        .unwrap();
        assert_eq!(err, SirError::InvalidWeight { index: 1, value: -1.0 });
    }
}
