//! Common functionality for regional growth accounting.
#![warn(missing_docs)]
use anyhow::{Context, Result};
use std::path::PathBuf;

pub mod capital;
pub mod cli;
pub mod estimation;
pub mod growth;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod panel;
pub mod periods;
pub mod region;
pub mod regression;
pub mod seasonal;
pub mod settings;
pub mod shares;
pub mod variables;

#[cfg(test)]
mod fixture;

/// Get the path to the program's config directory
pub fn get_config_dir() -> Result<PathBuf> {
    let mut config_dir = dirs::config_dir().context("Could not get path to config dir")?;
    config_dir.push("growth-accounting");

    Ok(config_dir)
}
