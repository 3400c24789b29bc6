//! Documents produced by the Explore and Document stages

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::source::FileInfo;

// =============================================================================
// Exploration
// =============================================================================

/// One select → summarize → decide iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationRound {
    /// 1-based round number
    pub iteration_index: usize,
    pub selected_files: Vec<FileInfo>,
    pub oracle_summary: String,
    /// Selection oracle's continuation flag for this round
    #[serde(rename = "continue")]
    pub continue_exploring: bool,
}

/// Why the exploration loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Selection oracle returned `continue = false`
    OracleStop,
    /// `max_iterations` rounds completed
    IterationCap,
    /// Every candidate file has been examined
    CandidatesExhausted,
    /// Selection oracle chose no usable file
    NothingSelected,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OracleStop => write!(f, "oracle requested stop"),
            Self::IterationCap => write!(f, "iteration cap reached"),
            Self::CandidatesExhausted => write!(f, "candidate pool exhausted"),
            Self::NothingSelected => write!(f, "nothing selected"),
        }
    }
}

/// Terminal artifact of the exploration loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialDescription {
    pub narrative: String,
    pub rounds: Vec<ExplorationRound>,
    pub stop_reason: StopReason,
}

impl InitialDescription {
    pub fn from_rounds(rounds: Vec<ExplorationRound>, stop_reason: StopReason) -> Self {
        let narrative = rounds
            .iter()
            .map(|r| r.oracle_summary.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            narrative,
            rounds,
            stop_reason,
        }
    }

    /// Paths examined across all rounds, in examination order
    pub fn examined_paths(&self) -> Vec<&str> {
        self.rounds
            .iter()
            .flat_map(|r| r.selected_files.iter().map(|f| f.path.as_str()))
            .collect()
    }
}

// =============================================================================
// Aggregation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub summary: String,
}

/// Summary of one directory, built only from its direct children's summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySummary {
    /// Repo-relative path ("" for the root)
    pub directory_path: String,
    /// Sorted by path
    pub child_file_summaries: Vec<FileSummary>,
    /// Sorted by path
    pub child_directory_summaries: Vec<DirectorySummary>,
    pub summary: String,
    /// Failed descendant directories whose summaries are absent below this node
    #[serde(default)]
    pub missing_children: Vec<String>,
}

impl DirectorySummary {
    /// Number of directories in this subtree, including self
    pub fn directory_count(&self) -> usize {
        1 + self
            .child_directory_summaries
            .iter()
            .map(|d| d.directory_count())
            .sum::<usize>()
    }

    /// Depth-first lookup by directory path
    pub fn find(&self, path: &str) -> Option<&DirectorySummary> {
        if self.directory_path == path {
            return Some(self);
        }
        self.child_directory_summaries
            .iter()
            .find_map(|d| d.find(path))
    }
}

/// Complete hierarchical documentation of a codebase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseDocumentation {
    pub root: DirectorySummary,
    /// Flat index of every produced file summary
    pub files: BTreeMap<String, FileSummary>,
    /// Directories that could not be summarized (empty on full success)
    #[serde(default)]
    pub failed_paths: Vec<String>,
}

impl CodebaseDocumentation {
    pub fn file(&self, path: &str) -> Option<&FileSummary> {
        self.files.get(path)
    }

    /// True when some branches failed but the root was still produced
    pub fn is_partial(&self) -> bool {
        !self.failed_paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(index: usize, summary: &str, files: &[&str]) -> ExplorationRound {
        ExplorationRound {
            iteration_index: index,
            selected_files: files.iter().map(|p| FileInfo::new(*p, "test")).collect(),
            oracle_summary: summary.to_string(),
            continue_exploring: true,
        }
    }

    #[test]
    fn test_narrative_joins_rounds_in_order() {
        let desc = InitialDescription::from_rounds(
            vec![round(1, "First.", &["a.rs"]), round(2, "  Second.\n", &["b.rs", "c.rs"])],
            StopReason::IterationCap,
        );
        assert_eq!(desc.narrative, "First.\n\nSecond.");
        assert_eq!(desc.examined_paths(), vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn test_round_serializes_continue_flag() {
        let json = serde_json::to_value(round(1, "x", &[])).unwrap();
        assert_eq!(json["continue"], true);
    }

    #[test]
    fn test_directory_find_and_count() {
        let leaf = DirectorySummary {
            directory_path: "src/ai".to_string(),
            child_file_summaries: vec![],
            child_directory_summaries: vec![],
            summary: "ai".to_string(),
            missing_children: vec![],
        };
        let src = DirectorySummary {
            directory_path: "src".to_string(),
            child_file_summaries: vec![],
            child_directory_summaries: vec![leaf],
            summary: "src".to_string(),
            missing_children: vec![],
        };
        assert_eq!(src.directory_count(), 2);
        assert_eq!(src.find("src/ai").map(|d| d.summary.as_str()), Some("ai"));
        assert!(src.find("tests").is_none());
    }
}
