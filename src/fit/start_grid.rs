//! Initial-guess grids for multi-start local search.
//!
//! Starts sit at interior fractions `(i + 0.5) / steps` of each bound interval,
//! so no start lies on a bound face. The full grid is the cartesian product of
//! the per-axis points, enumerated in lexicographic order (first axis slowest)
//! so start indices are stable across runs.

use crate::domain::Bounds;
use crate::error::SirError;

/// Hard cap on grid size; `steps^dim` grows fast.
pub const MAX_GRID_POINTS: usize = 4096;

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn linear_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, SirError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(SirError::InvalidConfig(format!(
            "invalid range: min={min}, max={max} (must be finite with max > min)"
        )));
    }
    match steps {
        0 => Err(SirError::InvalidConfig("steps must be >= 1".to_string())),
        1 => Ok(vec![0.5 * (min + max)]),
        _ => {
            let step = (max - min) / (steps as f64 - 1.0);
            Ok((0..steps).map(|i| min + step * i as f64).collect())
        }
    }
}

/// `steps` points at the cell centers of `[min, max]` split into `steps` cells.
pub fn interior_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, SirError> {
    if steps == 0 {
        return Err(SirError::InvalidConfig("steps must be >= 1".to_string()));
    }
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(SirError::InvalidConfig(format!(
            "invalid range: min={min}, max={max} (must be finite with max > min)"
        )));
    }
    let width = max - min;
    Ok((0..steps)
        .map(|i| min + width * (i as f64 + 0.5) / steps as f64)
        .collect())
}

/// Cartesian product of per-axis values.
pub fn cartesian(axes: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut out: Vec<Vec<f64>> = vec![Vec::with_capacity(axes.len())];
    for axis in axes {
        let mut next = Vec::with_capacity(out.len() * axis.len());
        for prefix in &out {
            for &v in axis {
                let mut p = prefix.clone();
                p.push(v);
                next.push(p);
            }
        }
        out = next;
    }
    out
}

/// Default start grid: `steps` interior points per axis.
pub fn default_starts(bounds: &Bounds, steps: usize) -> Result<Vec<Vec<f64>>, SirError> {
    let total = steps
        .checked_pow(bounds.dim() as u32)
        .filter(|&n| n <= MAX_GRID_POINTS);
    if total.is_none() {
        return Err(SirError::InvalidConfig(format!(
            "start grid of {steps}^{} points exceeds {MAX_GRID_POINTS}",
            bounds.dim()
        )));
    }

    let axes = (0..bounds.dim())
        .map(|i| interior_space(bounds.lower()[i], bounds.upper()[i], steps))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cartesian(&axes))
}
