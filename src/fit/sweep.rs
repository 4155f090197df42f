//! β sensitivity sweep: how peak size and timing move with the transmission rate.

use rayon::prelude::*;
use serde::Serialize;

use crate::error::{SimulationError, SirError};
use crate::fit::start_grid::linear_space;
use crate::models::{SimConfig, Simulator, SirModel};

/// Peak statistics for one β value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub beta: f64,
    pub peak_infected: f64,
    pub peak_day: f64,
    pub final_recovered: f64,
}

/// Simulate a constant-β epidemic for `count` evenly spaced β in `[start, stop]`.
pub fn beta_sweep(
    config: &SimConfig,
    gamma: f64,
    start: f64,
    stop: f64,
    count: usize,
) -> Result<Vec<SweepPoint>, SirError> {
    let betas = linear_space(start, stop, count)?;
    let simulator = Simulator::new(SirModel::constant());
    let points = betas
        .par_iter()
        .map(|&beta| -> Result<SweepPoint, SimulationError> {
            let traj = simulator.run(&[beta, gamma], config)?;
            let peak = traj.peak();
            Ok(SweepPoint {
                beta,
                peak_infected: peak.peak_infected,
                peak_day: peak.peak_day,
                final_recovered: peak.final_recovered,
            })
        })
        .collect::<Result<Vec<_>, SimulationError>>()?;
    Ok(points)
}
