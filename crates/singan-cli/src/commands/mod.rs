pub mod config;
pub mod pyramid;
pub mod train;

use std::path::Path;

use anyhow::{Context, Result};
use singan_core::config::SinGanConfig;

/// Config from `path`, or the defaults when no file is given.
fn load_config(path: Option<&Path>) -> Result<SinGanConfig> {
    match path {
        Some(path) => SinGanConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SinGanConfig::default()),
    }
}
