//! Parameter fitting.
//!
//! Responsibilities:
//!
//! - score parameter vectors against observations (weighted SSE)
//! - search bounded parameter space (multi-start Nelder–Mead, differential evolution)
//! - package winners with derived epidemiological quantities
//! - compare models using BIC + guardrails
//! - sweep β for sensitivity analysis

pub mod driver;
pub mod evolution;
pub mod local;
pub mod objective;
pub mod selection;
pub mod start_grid;
pub mod sweep;

pub use driver::*;
pub use evolution::*;
pub use local::*;
pub use objective::*;
pub use selection::*;
pub use start_grid::*;
pub use sweep::*;
