//! Error types.
//!
//! - `IntegrationError` / `SimulationError`: numerical failures while producing a
//!   trajectory. The objective maps the numerical subset to a sentinel score.
//! - `SirError`: library-level errors (configuration problems fail at construction).
//! - `AppError`: what the binary reports, with a process exit code.

use thiserror::Error;

/// Failure while advancing an ODE system.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("derivative is not finite at t={t}")]
    NonFiniteDerivative { t: f64 },

    #[error("step size underflow at t={t} (h={h:e})")]
    StepSizeUnderflow { t: f64, h: f64 },

    #[error("step budget of {max_steps} exhausted at t={t}")]
    TooManySteps { t: f64, max_steps: usize },

    #[error("invalid integrator input: {0}")]
    InvalidInput(String),
}

/// Failure while simulating or sampling a trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("interpolation point {x} is outside the sampled range [{min}, {max}]")]
    OutOfRange { x: f64, min: f64, max: f64 },

    #[error("expected {expected} parameters, got {found}")]
    ParameterCount { expected: usize, found: usize },

    #[error("non-finite parameter at index {index}: {value}")]
    NonFiniteParameter { index: usize, value: f64 },
}

impl SimulationError {
    /// Whether this failure means "the parameters are numerically infeasible"
    /// rather than "the caller wired something up wrong".
    pub fn is_numerical(&self) -> bool {
        match self {
            SimulationError::Integration(e) => !matches!(e, IntegrationError::InvalidInput(_)),
            SimulationError::OutOfRange { .. } => true,
            SimulationError::NonFiniteParameter { .. } => true,
            SimulationError::ParameterCount { .. } => false,
        }
    }
}

/// Library error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SirError {
    #[error("simulation duration ({duration} days) must cover the data range (max observed day {max_day})")]
    DurationTooShort { duration: u32, max_day: u32 },

    #[error("invalid bound for parameter {index}: min={min}, max={max} (must be finite with min < max)")]
    InvalidBounds { index: usize, min: f64, max: f64 },

    #[error("observation days must be strictly increasing: day {day} at index {index} follows day {prev}")]
    NonIncreasingDays { index: usize, prev: u32, day: u32 },

    #[error("invalid active count at index {index}: {value} (must be finite and >= 0)")]
    InvalidObservation { index: usize, value: f64 },

    #[error("observation series is empty")]
    EmptySeries,

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("weights length ({found}) does not match observation count ({expected})")]
    WeightsMismatch { expected: usize, found: usize },

    #[error("invalid weight at index {index}: {value} (must be finite and >= 0)")]
    InvalidWeight { index: usize, value: f64 },

    #[error("dimension mismatch: expected {expected} parameters, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("local search failed: {0}")]
    LocalSearch(String),
}

impl SirError {
    /// Exit code the binary uses when this error reaches `main`.
    pub fn exit_code(&self) -> u8 {
        match self {
            SirError::EmptySeries | SirError::InsufficientData(_) => 3,
            SirError::Simulation(_) | SirError::LocalSearch(_) => 4,
            _ => 2,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<SirError> for AppError {
    fn from(err: SirError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grid_is_not_numerical() {
        let err = SimulationError::from(IntegrationError::InvalidInput("empty".into()));
        assert!(!err.is_numerical());
        let err = SimulationError::from(IntegrationError::NonFiniteDerivative { t: 1.0 });
        assert!(err.is_numerical());
    }

    #[test]
    fn config_errors_map_to_exit_code_two() {
        let app: AppError = SirError::DurationTooShort { duration: 10, max_day: 20 }.into();
        assert_eq!(app.exit_code(), 2);
        assert!(app.to_string().contains("max observed day 20"));
    }
}
