//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observation inputs (`Observation`, `ObservationSeries`)
//! - search inputs (`Bounds`, `ModelKind`, `StrategyKind`)
//! - simulation and fit outputs (`Trajectory`, `FitResult`, derived quantities)
//! - the run configuration (`FitConfig`)

pub mod types;

pub use types::*;
