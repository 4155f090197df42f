//! SIR model family.
//!
//! - `schedule`: β(t) variants the simulator evaluates
//! - `sir`: parameter vectors → schedules, and the simulator itself

pub mod schedule;
pub mod sir;

pub use schedule::*;
pub use sir::*;
