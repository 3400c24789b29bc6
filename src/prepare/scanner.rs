//! Source file scanning for the prepare stage

use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, PrepareConfig};
use crate::constants::prepare;
use crate::types::{DocError, Result, SourceFile};

/// Compile glob patterns, rejecting invalid ones
pub(crate) fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| DocError::config(format!("Invalid glob pattern '{}': {}", p, e)))
        })
        .collect()
}

/// Loads the text sources of a project.
///
/// Walks with gitignore rules applied and symlinks not followed. Binary and
/// non-UTF-8 files are skipped silently; oversized ones are skipped with a
/// debug log.
pub struct SourceScanner {
    root: PathBuf,
    include: Vec<Pattern>,
    skip_directories: Vec<String>,
    max_file_size: u64,
}

#[derive(Debug, Default)]
struct SkipCounts {
    large: usize,
    binary: usize,
    unreadable: usize,
}

impl SourceScanner {
    /// `.git` and the tool's own data directory are always pruned
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            include: Vec::new(),
            skip_directories: vec![
                ".git".to_string(),
                ConfigLoader::project_dir().to_string_lossy().into_owned(),
            ],
            max_file_size: prepare::MAX_FILE_SIZE,
        }
    }

    pub fn from_config<P: AsRef<Path>>(root: P, config: &PrepareConfig) -> Result<Self> {
        Ok(Self::new(root)
            .with_include(&config.include)?
            .with_skip_directories(&config.exclude_directories)
            .with_max_file_size(config.max_file_size))
    }

    pub fn with_include(mut self, patterns: &[String]) -> Result<Self> {
        self.include = compile_patterns(patterns)?;
        Ok(self)
    }

    /// Directory names pruned at any depth
    pub fn with_skip_directories(mut self, names: &[String]) -> Self {
        for name in names {
            if !self.skip_directories.contains(name) {
                self.skip_directories.push(name.clone());
            }
        }
        self
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the project. Files come back sorted by path.
    pub fn scan(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            return Err(DocError::config(format!(
                "Project root is not a directory: {}",
                self.root.display()
            )));
        }

        let skip = self.skip_directories.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && entry.depth() > 0 && skip.iter().any(|s| entry.file_name() == s.as_str()))
            })
            .build();

        let mut files = Vec::new();
        let mut skipped = SkipCounts::default();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    skipped.unreadable += 1;
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let Some(relative) = relative_path(&self.root, path) else {
                continue;
            };
            if !self.is_included(&relative) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!(path = %relative, error = %e, "Skipping file without metadata");
                    skipped.unreadable += 1;
                    continue;
                }
            };
            if size > self.max_file_size {
                debug!(path = %relative, size, "Skipping file over max_file_size");
                skipped.large += 1;
                continue;
            }

            if let Some(content) = read_source(path, &relative, &mut skipped) {
                files.push(SourceFile::new(relative, content));
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            root = %self.root.display(),
            files = files.len(),
            skipped_large = skipped.large,
            skipped_binary = skipped.binary,
            skipped_unreadable = skipped.unreadable,
            "Scan complete"
        );
        Ok(files)
    }

    fn is_included(&self, relative: &str) -> bool {
        self.include.is_empty() || self.include.iter().any(|p| p.matches(relative))
    }
}

/// `/`-separated path of `path` below `root`
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    let parts = parts?;
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Text content of a file, counting the reason when it is skipped
fn read_source(path: &Path, relative: &str, skipped: &mut SkipCounts) -> Option<String> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %relative, error = %e, "Skipping unreadable file");
            skipped.unreadable += 1;
            return None;
        }
    };
    let content = decode_text(bytes);
    if content.is_none() {
        debug!(path = %relative, "Skipping binary or non-UTF-8 file");
        skipped.binary += 1;
    }
    content
}

/// UTF-8 text, or `None` for binary content
fn decode_text(bytes: Vec<u8>) -> Option<String> {
    let sniff = &bytes[..bytes.len().min(prepare::BINARY_SNIFF_BYTES)];
    if sniff.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}
