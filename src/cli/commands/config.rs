//! Config Command
//!
//! Inspect and initialize docloom configuration.
//!
//! Usage:
//!   docloom config show [-f toml|json]
//!   docloom config path
//!   docloom config init [--force]

use std::path::PathBuf;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::config::ConfigLoader;
use crate::types::{DocError, Result};

/// Print the effective (merged) configuration
pub fn show(path: Option<PathBuf>, format: &str) -> Result<()> {
    let as_json = match format {
        "json" => true,
        "toml" | "text" => false,
        other => {
            return Err(DocError::config(format!(
                "Unknown format '{}'. Valid values: toml, json",
                other
            )));
        }
    };
    let context = CommandContext::load(path)?;
    println!("{}", ConfigLoader::render(&context.config, as_json)?);
    Ok(())
}

/// Print configuration file locations
pub fn path(path: Option<PathBuf>) -> Result<()> {
    let context = CommandContext::load(path)?;
    ConfigLoader::show_path(&context.root);
    Ok(())
}

/// Write a default project configuration
pub fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let context = CommandContext::load(path)?;
    let config_path = ConfigLoader::init_project(&context.root, force)?;

    let out = Output::new();
    out.success("Initialized project configuration");
    out.field("Config", config_path.display());
    Ok(())
}
