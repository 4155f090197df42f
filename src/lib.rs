//! `sir-fit` library crate.
//!
//! The binary (`sirfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the simulator and fitting engine are usable without the CLI
//! - code stays easy to navigate as the project grows
//!
//! Layering, leaves first: `math` (integrator, interpolation) -> `models`
//! (schedules, simulator) -> `fit` (objective, search strategies, selection).

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
