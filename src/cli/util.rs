//! CLI Common Utilities
//!
//! Shared project resolution and store setup for command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, ConfigLoader, StoreBackend};
use crate::pipeline::project_name;
use crate::store::{MemoryStore, SharedStore, SqliteStore};
use crate::types::{DocError, Result};

/// Command execution context
pub struct CommandContext {
    /// Project root (canonical when it exists)
    pub root: PathBuf,
    /// Effective configuration for this project
    pub config: Config,
}

impl CommandContext {
    /// Resolve the project root (default: current directory) and load its config
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let root = resolve_root(path)?;
        let config = ConfigLoader::load_for(&root)?;
        Ok(Self { root, config })
    }

    pub fn project_name(&self) -> String {
        project_name(&self.root, self.config.project.name.as_deref())
    }

    /// SQLite database location; relative paths live under the project data dir
    pub fn store_path(&self) -> PathBuf {
        resolve_store_path(&self.root, &self.config.store.path)
    }

    pub fn open_store(&self) -> Result<SharedStore> {
        match self.config.store.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(self.store_path())?)),
        }
    }
}

fn resolve_root(path: Option<PathBuf>) -> Result<PathBuf> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(DocError::config(format!(
            "Not a directory: {}",
            root.display()
        )));
    }
    Ok(root.canonicalize().unwrap_or(root))
}

fn resolve_store_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(ConfigLoader::project_dir()).join(configured)
    }
}
