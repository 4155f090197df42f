//! Synthetic outbreak observations from a known trajectory.
//!
//! Each observed value is `I(day) · (1 + noise_rel · z)` with `z ~ N(0, 1)`
//! drawn from a seeded RNG, clamped at 0. `noise_rel = 0` reproduces the
//! trajectory exactly.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Observation, ObservationSeries, Trajectory};
use crate::error::SirError;

/// Sample `traj` at each of `days` and perturb with multiplicative noise.
pub fn synthesize_observations(
    traj: &Trajectory,
    days: &[u32],
    noise_rel: f64,
    seed: u64,
) -> Result<ObservationSeries, SirError> {
    if !(noise_rel.is_finite() && noise_rel >= 0.0) {
        return Err(SirError::InvalidConfig(format!(
            "relative noise must be finite and >= 0 (got {noise_rel})"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| SirError::InvalidConfig(format!("noise distribution: {e}")))?;

    let mut points = Vec::with_capacity(days.len());
    for &day in days {
        let clean = traj.infected_at(day as f64)?;
        let active = if noise_rel > 0.0 {
            let z: f64 = normal.sample(&mut rng);
            (clean * (1.0 + noise_rel * z)).max(0.0)
        } else {
            clean.max(0.0)
        };
        points.push(Observation { day, active });
    }
    ObservationSeries::new(points)
}

/// Every day from 0 through `max_day` inclusive.
pub fn daily(max_day: u32) -> Vec<u32> {
    (0..=max_day).collect()
}
