//! Oracle Interfaces
//!
//! The pipeline core never talks to a model directly. It calls two narrow
//! interfaces and treats their answers as opaque text or structured choices:
//!
//! - [`SummarizationOracle`]: turns file contents or child summaries into text
//! - [`SelectionOracle`]: picks which files the exploration loop reads next
//!
//! Failures come back as [`OracleError`]; transient ones are retried by
//! [`retry::call_with_retry`] at the smallest enclosing scope.
//!
//! ## Modules
//!
//! - `llm`: oracle implementations backed by an [`crate::ai::provider::LlmProvider`]
//! - `prompt`: prompt builder and the per-call templates
//! - `retry`: bounded exponential backoff with cancellation

pub mod llm;
pub mod prompt;
pub mod retry;

pub use llm::{LlmSelector, LlmSummarizer};
pub use retry::{RetryPolicy, call_with_retry};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ExplorationRound, FileInfo, OracleError};

/// Oracle outcome
pub type OracleResult<T> = std::result::Result<T, OracleError>;

// =============================================================================
// Summarization
// =============================================================================

/// Identifies which pipeline call a summarization request belongs to
#[derive(Debug, Clone)]
pub enum SummaryContext {
    /// One exploration round: summarize the selected files given prior rounds
    Exploration {
        project: String,
        file_tree: String,
        hints: Vec<String>,
        history: Vec<ExplorationRound>,
        /// 1-based round number
        iteration: usize,
    },
    /// Raw files of one directory; expects one summary per input
    FileBatch {
        project: String,
        directory: String,
        /// Exploration narrative used as background
        overview: String,
    },
    /// Merge of a directory's child summaries into one
    Directory {
        project: String,
        directory: String,
        overview: String,
    },
}

impl SummaryContext {
    /// Whether the caller needs `per_input` filled for every input path
    pub fn expects_per_input(&self) -> bool {
        matches!(self, Self::FileBatch { .. })
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        match self {
            Self::Exploration { iteration, .. } => format!("exploration round {}", iteration),
            Self::FileBatch { directory, .. } => {
                format!("file batch in {}", crate::types::display_dir(directory))
            }
            Self::Directory { directory, .. } => {
                format!("directory {}", crate::types::display_dir(directory))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Raw file content
    File,
    FileSummary,
    DirectorySummary,
}

/// One piece of text handed to the summarizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryInput {
    pub path: String,
    pub text: String,
    pub kind: InputKind,
}

impl SummaryInput {
    pub fn file(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            kind: InputKind::File,
        }
    }

    pub fn file_summary(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            kind: InputKind::FileSummary,
        }
    }

    pub fn directory_summary(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            kind: InputKind::DirectorySummary,
        }
    }
}

/// Summarizer answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Overall text for the call
    pub text: String,
    /// Per-input summaries keyed by input path (file batches only)
    pub per_input: BTreeMap<String, String>,
}

impl Summary {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            per_input: BTreeMap::new(),
        }
    }

    /// Input paths the summarizer failed to answer for
    pub fn missing_inputs<'a>(&self, inputs: &'a [SummaryInput]) -> Vec<&'a str> {
        inputs
            .iter()
            .map(|i| i.path.as_str())
            .filter(|path| {
                self.per_input
                    .get(*path)
                    .is_none_or(|text| text.trim().is_empty())
            })
            .collect()
    }
}

#[async_trait]
pub trait SummarizationOracle: Send + Sync {
    async fn summarize(
        &self,
        context: &SummaryContext,
        inputs: &[SummaryInput],
    ) -> OracleResult<Summary>;
}

// =============================================================================
// Selection
// =============================================================================

/// What the selector sees before each exploration round
#[derive(Debug, Clone)]
pub struct SelectionContext {
    pub project: String,
    pub file_tree: String,
    pub hints: Vec<String>,
    pub history: Vec<ExplorationRound>,
    /// 1-based round about to run
    pub iteration: usize,
    pub max_iterations: usize,
}

/// Selector answer: the files to read next and whether to keep going
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub chosen: Vec<FileInfo>,
    pub continue_exploring: bool,
}

#[async_trait]
pub trait SelectionOracle: Send + Sync {
    async fn select(
        &self,
        context: &SelectionContext,
        candidates: &[String],
    ) -> OracleResult<Selection>;
}

/// Shared oracle handles for concurrent access across stages.
pub type SharedSummarizer = Arc<dyn SummarizationOracle>;
pub type SharedSelector = Arc<dyn SelectionOracle>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_inputs() {
        let inputs = vec![
            SummaryInput::file("a.rs", "fn a() {}"),
            SummaryInput::file("b.rs", "fn b() {}"),
            SummaryInput::file("c.rs", "fn c() {}"),
        ];
        let mut summary = Summary::text("batch");
        summary.per_input.insert("a.rs".into(), "does a".into());
        summary.per_input.insert("c.rs".into(), "   ".into());

        assert_eq!(summary.missing_inputs(&inputs), vec!["b.rs", "c.rs"]);
    }

    #[test]
    fn test_context_labels() {
        let ctx = SummaryContext::Directory {
            project: "demo".into(),
            directory: String::new(),
            overview: String::new(),
        };
        assert_eq!(ctx.label(), "directory .");
        assert!(!ctx.expects_per_input());

        let ctx = SummaryContext::FileBatch {
            project: "demo".into(),
            directory: "src".into(),
            overview: String::new(),
        };
        assert!(ctx.expects_per_input());
    }
}
