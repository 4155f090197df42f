//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - trajectory / sweep CSV and fit JSON exports (`export`)
//! - TOML run configuration (`config`)

pub mod config;
pub mod export;
pub mod ingest;

pub use config::*;
pub use export::*;
pub use ingest::*;
