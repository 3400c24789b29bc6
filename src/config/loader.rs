//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (platform config dir, e.g. ~/.config/docloom/config.toml)
//! 3. Project config (.docloom/config.toml)
//! 4. Environment variables (DOCLOOM_* prefix, `__` separates nesting)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{DocError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_for(Path::new("."))
    }

    /// Same as [`ConfigLoader::load`], resolving the project config under `project_root`
    pub fn load_for(project_root: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = project_root.join(Self::project_config_path());
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // DOCLOOM_PIPELINE__MAX_ITERATIONS -> pipeline.max_iterations
        figment = figment.merge(Env::prefixed("DOCLOOM_").split("__"));

        Self::extract(figment)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| DocError::config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "docloom").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Project config file path (relative to the project root)
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Project data directory (relative to the project root)
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".docloom")
    }

    /// Print the config file locations
    pub fn show_path(project_root: &Path) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = project_root.join(Self::project_config_path());
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| DocError::config(e.to_string()))
        }
    }

    /// Create `.docloom/config.toml` with defaults if it does not exist
    pub fn init_project(project_root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = project_root.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_root.join(Self::project_config_path());
        if !config_path.exists() || force {
            let content = toml::to_string_pretty(&Config::default())
                .map_err(|e| DocError::config(e.to_string()))?;
            fs::write(
                &config_path,
                format!("# docloom project configuration\n\n{}", content),
            )?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[pipeline]\nmax_iterations = 3\nmax_files = 10\n\n[project]\nhints = [\"cli tool\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.pipeline.max_iterations, 3);
        assert_eq!(config.pipeline.max_files, 10);
        assert_eq!(config.pipeline.max_chars, 200_000);
        assert_eq!(config.project.hints, vec!["cli tool".to_string()]);
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pipeline]\nmax_chars = 0\n").unwrap();

        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, DocError::Configuration(_)));
    }

    #[test]
    fn test_init_project_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_project(dir.path(), false).unwrap();
        assert!(path.exists());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.pipeline.max_iterations, 5);
    }

    #[test]
    fn test_render_formats() {
        let config = Config::default();
        let toml_text = ConfigLoader::render(&config, false).unwrap();
        assert!(toml_text.contains("[pipeline]"));
        let json_text = ConfigLoader::render(&config, true).unwrap();
        assert!(json_text.contains("\"max_iterations\": 5"));
    }
}
