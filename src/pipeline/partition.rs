//! Batch Partitioner
//!
//! Splits an ordered file sequence into batches that respect per-call size
//! limits. Unlike a bin-packer this never reorders: batches are contiguous
//! runs of the input, so concatenating them gives the input back.

use crate::config::PipelineConfig;
use crate::types::{DocError, Result, SourceFile};

/// Per-call limits for any oracle call that carries file content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_chars: usize,
    pub max_files: usize,
}

impl BatchLimits {
    pub fn new(max_chars: usize, max_files: usize) -> Result<Self> {
        let limits = Self {
            max_chars,
            max_files,
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.max_chars, config.max_files)
    }

    fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(DocError::config("max_chars must be at least 1"));
        }
        if self.max_files == 0 {
            return Err(DocError::config("max_files must be at least 1"));
        }
        Ok(())
    }
}

/// Contiguous group of files processed by one oracle call
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    pub files: Vec<&'a SourceFile>,
    pub total_chars: usize,
    /// Single file larger than `max_chars`
    pub oversized: bool,
}

impl<'a> Batch<'a> {
    fn new() -> Self {
        Self {
            files: Vec::new(),
            total_chars: 0,
            oversized: false,
        }
    }

    fn add(&mut self, file: &'a SourceFile) {
        self.total_chars += file.size;
        self.files.push(file);
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }
}

/// Greedily partition `files` in order.
///
/// A file is added to the open batch while the batch stays within both
/// limits; otherwise the batch is closed and a new one started. A file
/// larger than `max_chars` closes any open batch and forms its own
/// `oversized` singleton. Empty input yields no batches.
pub fn partition<'a, I>(files: I, limits: BatchLimits) -> Result<Vec<Batch<'a>>>
where
    I: IntoIterator<Item = &'a SourceFile>,
{
    limits.validate()?;

    let mut batches = Vec::new();
    let mut current = Batch::new();

    for file in files {
        if file.size > limits.max_chars {
            if !current.is_empty() {
                batches.push(std::mem::replace(&mut current, Batch::new()));
            }
            let mut oversized = Batch::new();
            oversized.add(file);
            oversized.oversized = true;
            batches.push(oversized);
            continue;
        }

        let fits = current.count() < limits.max_files
            && current.total_chars + file.size <= limits.max_chars;
        if !fits {
            batches.push(std::mem::replace(&mut current, Batch::new()));
        }
        current.add(file);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    Ok(batches)
}

/// Statistics about partitioning results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batch_count: usize,
    pub total_files: usize,
    pub total_chars: usize,
    pub max_batch_chars: usize,
    pub oversized: usize,
}

impl BatchStats {
    pub fn from_batches(batches: &[Batch<'_>]) -> Self {
        Self {
            batch_count: batches.len(),
            total_files: batches.iter().map(Batch::count).sum(),
            total_chars: batches.iter().map(|b| b.total_chars).sum(),
            max_batch_chars: batches.iter().map(|b| b.total_chars).max().unwrap_or(0),
            oversized: batches.iter().filter(|b| b.oversized).count(),
        }
    }

    /// Fold another partitioning's statistics into this one
    pub fn absorb(&mut self, other: &BatchStats) {
        self.batch_count += other.batch_count;
        self.total_files += other.total_files;
        self.total_chars += other.total_chars;
        self.max_batch_chars = self.max_batch_chars.max(other.max_batch_chars);
        self.oversized += other.oversized;
    }

    /// Format as a human-readable summary
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} batches, {} files, {} chars (max {}/batch)",
            self.batch_count, self.total_files, self.total_chars, self.max_batch_chars
        );
        if self.oversized > 0 {
            text.push_str(&format!(", {} oversized", self.oversized));
        }
        text
    }
}
