//! Adaptive explicit Runge–Kutta integration (Dormand–Prince 5(4)).
//!
//! The integrator knows nothing about epidemiology. It advances any
//! `OdeSystem<D>` from an initial state and reports the state at each requested
//! output time.
//!
//! Stepping rules:
//! - steps are clamped so that every output time and every system breakpoint is
//!   hit exactly (no step straddles a discontinuity in the right-hand side)
//! - after a breakpoint the first stage is re-evaluated instead of reused (FSAL
//!   is only valid while the right-hand side is smooth)
//! - a non-finite derivative aborts integration with an error; values are never
//!   clipped

use nalgebra::SVector;

use crate::error::IntegrationError;

/// A first-order system `dy/dt = f(t, y)`.
///
/// Parameters live in the implementing type, which acts as the context passed to
/// every derivative evaluation.
pub trait OdeSystem<const D: usize> {
    fn derivative(&self, t: f64, y: &SVector<f64, D>) -> SVector<f64, D>;

    /// Times at which the right-hand side is discontinuous.
    fn breakpoints(&self) -> Vec<f64> {
        Vec::new()
    }
}

/// Tolerances and step limits.
#[derive(Debug, Clone, Copy)]
pub struct IntegratorOptions {
    pub rtol: f64,
    pub atol: f64,
    /// Upper bound on any single step.
    pub max_step: f64,
    /// Steps smaller than this (relative to `|t|` + 1) are treated as failure.
    pub min_step: f64,
    /// Accepted + rejected step budget across the whole integration.
    pub max_steps: usize,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-8,
            max_step: 1.0,
            min_step: 1e-12,
            max_steps: 200_000,
        }
    }
}

// Dormand–Prince coefficients.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// Error coefficients: b (5th order) - b* (4th order).
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Integrate `system` from `times[0]` and return the state at every time in `times`.
///
/// `times` must be non-empty, finite and strictly increasing. The first entry is the
/// initial time, so `out[0] == y0`.
pub fn integrate<const D: usize, S: OdeSystem<D>>(
    system: &S,
    y0: SVector<f64, D>,
    times: &[f64],
    opts: &IntegratorOptions,
) -> Result<Vec<SVector<f64, D>>, IntegrationError> {
    validate_times(times)?;
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(IntegrationError::InvalidInput(
            "initial state is not finite".to_string(),
        ));
    }

    let t_end = times[times.len() - 1];
    let mut stops: Vec<f64> = system
        .breakpoints()
        .into_iter()
        .filter(|b| b.is_finite() && *b > times[0] && *b < t_end)
        .collect();
    stops.sort_by(|a, b| a.total_cmp(b));
    stops.dedup();

    let mut out = Vec::with_capacity(times.len());
    out.push(y0);
    if times.len() == 1 {
        return Ok(out);
    }

    let mut t = times[0];
    let mut y = y0;
    let mut k1 = eval(system, t, &y)?;
    let mut h = initial_step(system, t, &y, &k1, opts)?;
    let mut steps = 0usize;
    let mut next_out = 1usize;
    let mut next_stop = 0usize;

    while next_out < times.len() {
        let target = match stops.get(next_stop) {
            Some(&b) if b < times[next_out] => b,
            _ => times[next_out],
        };

        // Advance exactly to `target`.
        while t < target {
            steps += 1;
            if steps > opts.max_steps {
                return Err(IntegrationError::TooManySteps {
                    t,
                    max_steps: opts.max_steps,
                });
            }

            let remaining = target - t;
            let lands = h >= remaining;
            let step = if lands { remaining } else { h.min(opts.max_step) };
            if step < opts.min_step * (t.abs() + 1.0) && !lands {
                return Err(IntegrationError::StepSizeUnderflow { t, h: step });
            }

            // Stages at the end of a step that lands on a breakpoint use the left limit.
            let onto_stop = lands && stops.get(next_stop).is_some_and(|&b| b == target);
            let t_right = if onto_stop {
                target - 4.0 * f64::EPSILON * target.abs().max(1.0)
            } else {
                t + step
            };
            let (y_new, k7, err) = dopri_step(system, t, &y, &k1, step, t_right)?;
            let err_norm = error_norm(&err, &y, &y_new, opts);

            if err_norm <= 1.0 {
                t = if lands { target } else { t + step };
                y = y_new;
                k1 = k7;
                let factor = if err_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                let proposed = (step * factor).min(opts.max_step);
                // A step shortened to land on a target says little about the next one.
                h = if lands { proposed.max(h).min(opts.max_step) } else { proposed };
            } else {
                let factor = (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, 1.0);
                h = step * factor;
                if h < opts.min_step * (t.abs() + 1.0) {
                    return Err(IntegrationError::StepSizeUnderflow { t, h });
                }
            }
        }

        if stops.get(next_stop).is_some_and(|&b| b == target) {
            next_stop += 1;
            k1 = eval(system, t, &y)?;
        }
        if target == times[next_out] {
            out.push(y);
            next_out += 1;
        }
    }

    Ok(out)
}

fn validate_times(times: &[f64]) -> Result<(), IntegrationError> {
    if times.is_empty() {
        return Err(IntegrationError::InvalidInput("no output times".to_string()));
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(IntegrationError::InvalidInput("non-finite output time".to_string()));
    }
    if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
        return Err(IntegrationError::InvalidInput(format!(
            "output times must be strictly increasing (t[{}]={} >= t[{}]={})",
            i,
            times[i],
            i + 1,
            times[i + 1]
        )));
    }
    Ok(())
}

fn eval<const D: usize, S: OdeSystem<D>>(
    system: &S,
    t: f64,
    y: &SVector<f64, D>,
) -> Result<SVector<f64, D>, IntegrationError> {
    let dy = system.derivative(t, y);
    if dy.iter().all(|v| v.is_finite()) {
        Ok(dy)
    } else {
        Err(IntegrationError::NonFiniteDerivative { t })
    }
}

#[allow(clippy::type_complexity)]
fn dopri_step<const D: usize, S: OdeSystem<D>>(
    system: &S,
    t: f64,
    y: &SVector<f64, D>,
    k1: &SVector<f64, D>,
    h: f64,
    t_right: f64,
) -> Result<(SVector<f64, D>, SVector<f64, D>, SVector<f64, D>), IntegrationError> {
    let k2 = eval(system, t + C2 * h, &(y + k1 * (h * A21)))?;
    let k3 = eval(system, t + C3 * h, &(y + (k1 * A31 + k2 * A32) * h))?;
    let k4 = eval(system, t + C4 * h, &(y + (k1 * A41 + k2 * A42 + k3 * A43) * h))?;
    let k5 = eval(
        system,
        t + C5 * h,
        &(y + (k1 * A51 + k2 * A52 + k3 * A53 + k4 * A54) * h),
    )?;
    let k6 = eval(
        system,
        t_right,
        &(y + (k1 * A61 + k2 * A62 + k3 * A63 + k4 * A64 + k5 * A65) * h),
    )?;
    let y_new = y + (k1 * A71 + k3 * A73 + k4 * A74 + k5 * A75 + k6 * A76) * h;
    if y_new.iter().any(|v| !v.is_finite()) {
        return Err(IntegrationError::NonFiniteDerivative { t: t + h });
    }
    let k7 = eval(system, t_right, &y_new)?;
    let err = (k1 * E1 + k3 * E3 + k4 * E4 + k5 * E5 + k6 * E6 + k7 * E7) * h;
    Ok((y_new, k7, err))
}

fn error_norm<const D: usize>(
    err: &SVector<f64, D>,
    y: &SVector<f64, D>,
    y_new: &SVector<f64, D>,
    opts: &IntegratorOptions,
) -> f64 {
    let mut acc = 0.0;
    for i in 0..D {
        let scale = opts.atol + opts.rtol * y[i].abs().max(y_new[i].abs());
        let r = err[i] / scale;
        acc += r * r;
    }
    (acc / D as f64).sqrt()
}

/// Starting step from the Hairer–Wanner heuristic.
fn initial_step<const D: usize, S: OdeSystem<D>>(
    system: &S,
    t: f64,
    y: &SVector<f64, D>,
    f0: &SVector<f64, D>,
    opts: &IntegratorOptions,
) -> Result<f64, IntegrationError> {
    let scale: SVector<f64, D> = y.map(|v| opts.atol + opts.rtol * v.abs());
    let d0 = rms(&y.component_div(&scale));
    let d1 = rms(&f0.component_div(&scale));
    let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    let h0 = h0.min(opts.max_step);

    let f1 = eval(system, t + h0, &(y + f0 * h0))?;
    let d2 = rms(&(f1 - f0).component_div(&scale)) / h0;
    let h1 = if d1.max(d2) <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / 5.0)
    };
    Ok((100.0 * h0).min(h1).min(opts.max_step))
}

fn rms<const D: usize>(v: &SVector<f64, D>) -> f64 {
    (v.iter().map(|x| x * x).sum::<f64>() / D as f64).sqrt()
}
