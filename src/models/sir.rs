//! SIR simulation under a transmission schedule.
//!
//! `dS/dt = -β(t) S I / N`, `dI/dt = β(t) S I / N - γ I`, `dR/dt = γ I`,
//! started from `(N - I0, I0, 0)` and sampled on a uniform grid of
//! `duration_days × resolution + 1` points.

use log::warn;
use nalgebra::Vector3;

use crate::domain::{ModelKind, Trajectory};
use crate::error::{SimulationError, SirError};
use crate::math::{IntegratorOptions, OdeSystem, integrate};
use crate::models::schedule::TransmissionSchedule;

/// Compartments may dip this far below zero (relative to N) before we warn.
pub const NEGATIVE_TOLERANCE: f64 = 1e-6;

/// Static inputs of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub population: f64,
    pub initial_infected: f64,
    pub duration_days: u32,
    /// Output samples per day.
    pub resolution: u32,
}

impl SimConfig {
    pub fn new(
        population: f64,
        initial_infected: f64,
        duration_days: u32,
        resolution: u32,
    ) -> Result<Self, SirError> {
        if !(population.is_finite() && population > 0.0) {
            return Err(SirError::InvalidConfig(format!(
                "population must be finite and > 0 (got {population})"
            )));
        }
        if !(initial_infected.is_finite() && initial_infected >= 0.0 && initial_infected <= population)
        {
            return Err(SirError::InvalidConfig(format!(
                "initial infected must be in [0, {population}] (got {initial_infected})"
            )));
        }
        if duration_days == 0 {
            return Err(SirError::InvalidConfig("duration must be at least 1 day".to_string()));
        }
        if resolution == 0 {
            return Err(SirError::InvalidConfig(
                "resolution must be at least 1 sample per day".to_string(),
            ));
        }
        Ok(Self {
            population,
            initial_infected,
            duration_days,
            resolution,
        })
    }

    /// Output times `k / resolution` for `k = 0..=duration × resolution`.
    pub fn time_grid(&self) -> Vec<f64> {
        let n = self.duration_days as usize * self.resolution as usize;
        let res = self.resolution as f64;
        (0..=n).map(|k| k as f64 / res).collect()
    }
}

/// The SIR right-hand side for one parameter set.
struct SirSystem<'a> {
    schedule: &'a TransmissionSchedule,
    gamma: f64,
    population: f64,
}

impl OdeSystem<3> for SirSystem<'_> {
    fn derivative(&self, t: f64, y: &Vector3<f64>) -> Vector3<f64> {
        let (s, i) = (y[0], y[1]);
        let beta = self.schedule.rate_at(t);
        let infections = beta * s * i / self.population;
        let recoveries = self.gamma * i;
        Vector3::new(-infections, infections - recoveries, recoveries)
    }

    fn breakpoints(&self) -> Vec<f64> {
        self.schedule.breakpoints()
    }
}

/// Run one simulation.
pub fn simulate(
    config: &SimConfig,
    schedule: &TransmissionSchedule,
    gamma: f64,
    opts: &IntegratorOptions,
) -> Result<Trajectory, SimulationError> {
    let system = SirSystem {
        schedule,
        gamma,
        population: config.population,
    };
    let y0 = Vector3::new(
        config.population - config.initial_infected,
        config.initial_infected,
        0.0,
    );
    let t = config.time_grid();
    let states = integrate(&system, y0, &t, opts)?;

    let mut traj = Trajectory {
        s: Vec::with_capacity(t.len()),
        i: Vec::with_capacity(t.len()),
        r: Vec::with_capacity(t.len()),
        t,
    };
    for y in &states {
        traj.s.push(y[0]);
        traj.i.push(y[1]);
        traj.r.push(y[2]);
    }

    warn_on_negative_excursion(&traj, config.population, schedule, gamma);
    Ok(traj)
}

/// Warn when a compartment dips below `-NEGATIVE_TOLERANCE · population`.
/// Returns whether it did.
fn warn_on_negative_excursion(
    traj: &Trajectory,
    population: f64,
    schedule: &TransmissionSchedule,
    gamma: f64,
) -> bool {
    let floor = -NEGATIVE_TOLERANCE * population;
    let min = traj.min_compartment();
    if min < floor {
        warn!(
            "compartment fell to {min:.3e} (tolerance {floor:.3e}) with {schedule:?}, gamma={gamma}"
        );
        return true;
    }
    false
}

/// A model parameterization plus the intervention day it is anchored to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SirModel {
    kind: ModelKind,
    intervention_day: f64,
}

impl SirModel {
    pub fn constant() -> Self {
        Self {
            kind: ModelKind::Constant,
            intervention_day: 0.0,
        }
    }

    pub fn step(intervention_day: f64) -> Self {
        Self {
            kind: ModelKind::Step,
            intervention_day,
        }
    }

    /// Step model whose intervention day is a fitted parameter.
    pub fn step_fitted_day() -> Self {
        Self {
            kind: ModelKind::StepFittedDay,
            intervention_day: 0.0,
        }
    }

    pub fn sigmoid(intervention_day: f64) -> Self {
        Self {
            kind: ModelKind::Sigmoid,
            intervention_day,
        }
    }

    pub fn new(kind: ModelKind, intervention_day: f64) -> Self {
        match kind {
            ModelKind::Constant => Self::constant(),
            ModelKind::Step => Self::step(intervention_day),
            ModelKind::StepFittedDay => Self::step_fitted_day(),
            ModelKind::Sigmoid => Self::sigmoid(intervention_day),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn param_count(&self) -> usize {
        self.kind.param_count()
    }

    /// The fixed intervention day, if this model has one.
    pub fn fixed_intervention_day(&self) -> Option<f64> {
        match self.kind {
            ModelKind::Step | ModelKind::Sigmoid => Some(self.intervention_day),
            ModelKind::Constant | ModelKind::StepFittedDay => None,
        }
    }

    /// Split a parameter vector into a schedule and γ.
    pub fn schedule(&self, params: &[f64]) -> Result<(TransmissionSchedule, f64), SimulationError> {
        let expected = self.param_count();
        if params.len() != expected {
            return Err(SimulationError::ParameterCount {
                expected,
                found: params.len(),
            });
        }
        if let Some((index, &value)) = params.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(SimulationError::NonFiniteParameter { index, value });
        }

        let out = match self.kind {
            ModelKind::Constant => (TransmissionSchedule::Constant { beta: params[0] }, params[1]),
            ModelKind::Step => (
                TransmissionSchedule::Step {
                    beta_pre: params[0],
                    beta_post: params[1],
                    intervention_day: self.intervention_day,
                },
                params[2],
            ),
            ModelKind::StepFittedDay => (
                TransmissionSchedule::Step {
                    beta_pre: params[0],
                    beta_post: params[1],
                    intervention_day: params[3],
                },
                params[2],
            ),
            ModelKind::Sigmoid => (
                TransmissionSchedule::Sigmoid {
                    beta_pre: params[0],
                    beta_post: params[1],
                    intervention_day: self.intervention_day,
                    delay: params[3],
                    width: params[4],
                },
                params[2],
            ),
        };
        Ok(out)
    }

    /// Search box used when the caller does not supply one.
    pub fn default_bounds(&self, duration_days: u32) -> Vec<(f64, f64)> {
        match self.kind {
            ModelKind::Constant => vec![(0.01, 0.5), (0.05, 0.15)],
            ModelKind::Step => vec![(0.1, 1.0), (0.01, 0.3), (0.03, 0.15)],
            ModelKind::StepFittedDay => vec![
                (0.1, 1.0),
                (0.01, 0.3),
                (0.03, 0.15),
                (0.0, duration_days as f64),
            ],
            ModelKind::Sigmoid => vec![
                (0.2, 0.6),
                (0.05, 0.15),
                (0.05, 0.12),
                (5.0, 20.0),
                (3.0, 15.0),
            ],
        }
    }
}

/// Parameter vector → trajectory, for a fixed model.
///
/// Holds no state between calls, so it can be shared across threads.
#[derive(Debug, Clone, Copy)]
pub struct Simulator {
    model: SirModel,
    integrator: IntegratorOptions,
}

impl Simulator {
    pub fn new(model: SirModel) -> Self {
        Self {
            model,
            integrator: IntegratorOptions::default(),
        }
    }

    pub fn with_integrator(mut self, integrator: IntegratorOptions) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn model(&self) -> &SirModel {
        &self.model
    }

    pub fn run(&self, params: &[f64], config: &SimConfig) -> Result<Trajectory, SimulationError> {
        let (schedule, gamma) = self.model.schedule(params)?;
        simulate(config, &schedule, gamma, &self.integrator)
    }
}
