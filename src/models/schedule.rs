//! Transmission-rate schedules β(t).
//!
//! The simulator only ever calls `rate_at` and `breakpoints`; it never looks at
//! a variant's fields.

use serde::Serialize;

/// Lower limit applied to the sigmoid transition width (days).
///
/// Simulation and fitting both go through `TransmissionSchedule::rate_at`, so the
/// same floor applies everywhere.
pub const MIN_TRANSITION_WIDTH: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransmissionSchedule {
    Constant {
        beta: f64,
    },
    /// `beta_pre` for `t < intervention_day`, `beta_post` from then on.
    Step {
        beta_pre: f64,
        beta_post: f64,
        intervention_day: f64,
    },
    /// Logistic blend centered at `intervention_day + delay`.
    Sigmoid {
        beta_pre: f64,
        beta_post: f64,
        intervention_day: f64,
        delay: f64,
        width: f64,
    },
}

impl TransmissionSchedule {
    pub fn rate_at(&self, t: f64) -> f64 {
        match *self {
            TransmissionSchedule::Constant { beta } => beta,
            TransmissionSchedule::Step {
                beta_pre,
                beta_post,
                intervention_day,
            } => {
                if t < intervention_day {
                    beta_pre
                } else {
                    beta_post
                }
            }
            TransmissionSchedule::Sigmoid {
                beta_pre,
                beta_post,
                intervention_day,
                delay,
                width,
            } => {
                let t_eff = intervention_day + delay;
                let w = effective_width(width);
                // exp overflows to +inf far after t_eff, which gives exactly beta_post.
                let blend = 1.0 / (1.0 + ((t - t_eff) / w).exp());
                beta_post + (beta_pre - beta_post) * blend
            }
        }
    }

    /// Discontinuities the integrator must step onto exactly.
    pub fn breakpoints(&self) -> Vec<f64> {
        match *self {
            TransmissionSchedule::Step {
                intervention_day, ..
            } => vec![intervention_day],
            _ => Vec::new(),
        }
    }
}

/// `max(width, MIN_TRANSITION_WIDTH)`; NaN widths also fall back to the floor.
pub fn effective_width(width: f64) -> f64 {
    if width >= MIN_TRANSITION_WIDTH {
        width
    } else {
        MIN_TRANSITION_WIDTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn step_has_no_transition() {
        let s = TransmissionSchedule::Step {
            beta_pre: 0.4,
            beta_post: 0.1,
            intervention_day: 16.0,
        };
        assert_eq!(s.rate_at(15.999_999), 0.4);
        assert_eq!(s.rate_at(16.0), 0.1);
        assert_eq!(s.rate_at(100.0), 0.1);
        assert_eq!(s.breakpoints(), vec![16.0]);
    }

    #[test]
    fn sigmoid_reaches_both_plateaus() {
        let (pre, post, w) = (0.45, 0.08, 4.0);
        let s = TransmissionSchedule::Sigmoid {
            beta_pre: pre,
            beta_post: post,
            intervention_day: 16.0,
            delay: 10.0,
            width: w,
        };
        let t_eff = 26.0;
        assert_relative_eq!(s.rate_at(t_eff - 10.0 * w), pre, max_relative = 0.01);
        assert_relative_eq!(s.rate_at(t_eff + 10.0 * w), post, max_relative = 0.01);
        assert_relative_eq!(s.rate_at(t_eff), 0.5 * (pre + post), max_relative = 1e-12);
        assert!(s.breakpoints().is_empty());
    }

    #[test]
    fn sigmoid_width_is_floored() {
        let narrow = TransmissionSchedule::Sigmoid {
            beta_pre: 0.3,
            beta_post: 0.1,
            intervention_day: 10.0,
            delay: 0.0,
            width: 0.0,
        };
        let floored = TransmissionSchedule::Sigmoid {
            beta_pre: 0.3,
            beta_post: 0.1,
            intervention_day: 10.0,
            delay: 0.0,
            width: MIN_TRANSITION_WIDTH,
        };
        for t in [9.0, 9.9, 10.0, 10.05, 11.0] {
            assert_eq!(narrow.rate_at(t), floored.rate_at(t));
        }
        assert!(narrow.rate_at(1e6).is_finite());
        assert!(narrow.rate_at(-1e6).is_finite());
    }
}
