//! TOML run configuration.
//!
//! Every key is optional and falls back to `FitConfig::default()`; unknown
//! keys are rejected so typos surface immediately.

use std::fs;
use std::path::Path;

use crate::domain::FitConfig;
use crate::error::AppError;

pub fn load_config(path: &Path) -> Result<FitConfig, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read config '{}': {e}", path.display())))?;
    parse_config(&text)
        .map_err(|e| AppError::new(2, format!("Invalid config '{}': {e}", path.display())))
}

pub fn parse_config(text: &str) -> Result<FitConfig, toml::de::Error> {
    toml::from_str(text)
}
