//! Numerical building blocks: ODE integration and interpolation.

pub mod integrator;
pub mod interp;

pub use integrator::*;
pub use interp::*;
