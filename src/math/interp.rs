//! Linear interpolation over a sampled series.
//!
//! Only points inside `[x[0], x[n-1]]` are accepted; there is no extrapolation.

use crate::error::SimulationError;

/// Interpolate `ys` (sampled at strictly increasing `xs`) at `x`.
pub fn interp_linear(xs: &[f64], ys: &[f64], x: f64) -> Result<f64, SimulationError> {
    debug_assert_eq!(xs.len(), ys.len());
    let (Some(&lo), Some(&hi)) = (xs.first(), xs.last()) else {
        return Err(SimulationError::OutOfRange {
            x,
            min: f64::NAN,
            max: f64::NAN,
        });
    };
    if !(x >= lo && x <= hi) {
        return Err(SimulationError::OutOfRange { x, min: lo, max: hi });
    }

    // First index with xs[j] >= x.
    let j = xs.partition_point(|&v| v < x);
    if xs[j] == x {
        return Ok(ys[j]);
    }
    let i = j - 1;
    let u = (x - xs[i]) / (xs[j] - xs[i]);
    Ok(ys[i] + u * (ys[j] - ys[i]))
}

/// Interpolate at every point of `at`.
pub fn interp_many(xs: &[f64], ys: &[f64], at: &[f64]) -> Result<Vec<f64>, SimulationError> {
    at.iter().map(|&x| interp_linear(xs, ys, x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_and_on_knots() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 30.0];
        assert_eq!(interp_linear(&xs, &ys, 1.0).unwrap(), 10.0);
        assert!((interp_linear(&xs, &ys, 1.5).unwrap() - 20.0).abs() < 1e-12);
        assert_eq!(interp_linear(&xs, &ys, 2.0).unwrap(), 30.0);
    }

    #[test]
    fn refuses_to_extrapolate() {
        let xs = [0.0, 1.0];
        let ys = [1.0, 2.0];
        let err = interp_linear(&xs, &ys, 1.5).unwrap_err();
        assert!(matches!(err, SimulationError::OutOfRange { .. }));
        assert!(interp_linear(&xs, &ys, f64::NAN).is_err());
    }
}
