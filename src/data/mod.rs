//! Data sources other than CSV files.
//!
//! - synthetic observations sampled from a simulated trajectory (`synthetic`)

pub mod synthetic;

pub use synthetic::*;
