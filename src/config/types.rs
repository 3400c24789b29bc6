//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Components receive these as immutable values; nothing reads ambient state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{network, pipeline, prepare, retry, store};
use crate::types::{DocError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Project-specific settings
    pub project: ProjectConfig,

    /// Source discovery and filtering
    pub prepare: PrepareConfig,

    /// Exploration and aggregation limits
    pub pipeline: PipelineConfig,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Artifact store settings
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            project: ProjectConfig::default(),
            prepare: PrepareConfig::default(),
            pipeline: PipelineConfig::default(),
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `DocError::Configuration` on validation failure.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DocError::config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(DocError::config("LLM timeout_secs must be greater than 0"));
        }

        if self.prepare.max_file_size == 0 {
            return Err(DocError::config(
                "prepare.max_file_size must be greater than 0",
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Project Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name (defaults to directory name)
    pub name: Option<String>,

    /// Free-form hints handed to the exploration loop
    pub hints: Vec<String>,
}

// =============================================================================
// Prepare Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    /// Glob patterns to include
    pub include: Vec<String>,

    /// Glob patterns to exclude (matched against repo-relative paths)
    pub exclude: Vec<String>,

    /// Directory names excluded at any depth
    pub exclude_directories: Vec<String>,

    /// Exact repo-relative paths to exclude
    pub exclude_files: Vec<String>,

    /// Maximum file size in bytes
    pub max_file_size: u64,

    /// Drop files that look like embedded base64/hex blobs
    pub skip_encoded: bool,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*".to_string()],
            exclude: vec![],
            exclude_directories: prepare::DEFAULT_SKIP_DIRS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            exclude_files: vec![],
            max_file_size: prepare::MAX_FILE_SIZE,
            skip_encoded: true,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

/// Limits shared by the exploration loop and the aggregator
///
/// - `max_iterations`: hard ceiling on exploration rounds
/// - `max_chars` / `max_files`: per-batch limits for every oracle call that
///   carries file content
/// - `concurrency_limit`: maximum in-flight oracle calls during aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_iterations: usize,
    pub max_chars: usize,
    pub max_files: usize,
    pub concurrency_limit: usize,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: pipeline::MAX_ITERATIONS,
            max_chars: pipeline::MAX_CHARS,
            max_files: pipeline::MAX_FILES,
            concurrency_limit: pipeline::CONCURRENCY_LIMIT,
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(DocError::config("pipeline.max_iterations must be at least 1"));
        }
        if self.max_chars == 0 {
            return Err(DocError::config("pipeline.max_chars must be at least 1"));
        }
        if self.max_files == 0 {
            return Err(DocError::config("pipeline.max_files must be at least 1"));
        }
        if self.concurrency_limit == 0 {
            return Err(DocError::config(
                "pipeline.concurrency_limit must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(DocError::config(
                "pipeline.retry.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Bounded retry policy for transient oracle failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first call
    pub max_attempts: usize,
    pub min_delay_ms: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            min_delay_ms: retry::MIN_DELAY_MS,
            max_delay_secs: retry::MAX_DELAY_SECS,
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            min_delay_ms: 0,
            max_delay_secs: 0,
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" speaks any OpenAI-compatible endpoint)
    pub provider: String,

    /// Model name
    pub model: String,

    /// API base URL override
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for LLM generation (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate per call
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            max_tokens: network::DEFAULT_MAX_TOKENS,
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database path (relative paths resolve against the project directory)
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from(store::DATABASE_FILE),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.pipeline.max_iterations, 5);
        assert_eq!(config.pipeline.max_chars, 200_000);
        assert_eq!(config.pipeline.max_files, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = Config::default();
        config.pipeline.max_chars = 0;
        assert!(matches!(config.validate(), Err(DocError::Configuration(_))));

        let mut config = Config::default();
        config.pipeline.max_files = 0;
        assert!(matches!(config.validate(), Err(DocError::Configuration(_))));

        let mut config = Config::default();
        config.pipeline.concurrency_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_temperature_range() {
        let mut config = Config::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_skip_dirs() {
        let prepare = PrepareConfig::default();
        assert!(prepare.exclude_directories.iter().any(|d| d == "node_modules"));
        assert!(prepare.skip_encoded);
    }
}
