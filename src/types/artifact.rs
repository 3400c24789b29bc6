//! Persisted artifact descriptors
//!
//! Artifacts are typed, named, immutable documents produced by pipeline
//! stages. The canonical name is the storage key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Pipeline stage that owns an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prepare,
    Explore,
    Document,
}

impl Stage {
    /// Execution order
    pub const ALL: [Stage; 3] = [Stage::Prepare, Stage::Explore, Stage::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Explore => "explore",
            Self::Document => "document",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prepare" => Some(Self::Prepare),
            "explore" => Some(Self::Explore),
            "document" => Some(Self::Document),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document type of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    SourceFiles,
    FileTree,
    InitialDescription,
    FileSummary,
    DirectorySummary,
    CodebaseDocumentation,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceFiles => "source_files",
            Self::FileTree => "file_tree",
            Self::InitialDescription => "initial_description",
            Self::FileSummary => "file_summary",
            Self::DirectorySummary => "directory_summary",
            Self::CodebaseDocumentation => "codebase_documentation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "source_files" => Some(Self::SourceFiles),
            "file_tree" => Some(Self::FileTree),
            "initial_description" => Some(Self::InitialDescription),
            "file_summary" => Some(Self::FileSummary),
            "directory_summary" => Some(Self::DirectorySummary),
            "codebase_documentation" => Some(Self::CodebaseDocumentation),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by a store write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    pub kind: ArtifactKind,
    pub stage: Stage,
    /// SHA-256 of the serialized payload (hex)
    pub digest: String,
    /// Serialized payload size in bytes
    pub size: usize,
}

/// A stored artifact with its payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub stage: Stage,
    pub payload: serde_json::Value,
    pub digest: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        name: impl Into<String>,
        kind: ArtifactKind,
        stage: Stage,
        payload: serde_json::Value,
    ) -> Self {
        let digest = payload_digest(&payload);
        Self {
            name: name.into(),
            kind,
            stage,
            payload,
            digest,
            created_at: Utc::now(),
        }
    }

    pub fn to_ref(&self) -> ArtifactRef {
        ArtifactRef {
            name: self.name.clone(),
            kind: self.kind,
            stage: self.stage,
            digest: self.digest.clone(),
            size: self.payload.to_string().len(),
        }
    }

    /// Deserialize the payload into a typed document
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::types::Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Hex SHA-256 of a JSON payload's compact serialization
pub fn payload_digest(payload: &serde_json::Value) -> String {
    let digest = Sha256::digest(payload.to_string().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Canonical artifact names
pub mod names {
    pub const SOURCE_FILES: &str = "prepare/source-files";
    pub const FILE_TREE: &str = "prepare/file-tree";
    pub const INITIAL_DESCRIPTION: &str = "explore/initial-description";
    pub const CODEBASE_DOCUMENTATION: &str = "document/codebase";

    pub fn file_summary(path: &str) -> String {
        format!("document/file/{}", path)
    }

    pub fn directory_summary(path: &str) -> String {
        if path.is_empty() {
            "document/dir/.".to_string()
        } else {
            format!("document/dir/{}", path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_order_and_parse() {
        assert!(Stage::Prepare < Stage::Explore);
        assert!(Stage::Explore < Stage::Document);
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::parse("render"), None);
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        let kinds = [
            ArtifactKind::SourceFiles,
            ArtifactKind::FileTree,
            ArtifactKind::InitialDescription,
            ArtifactKind::FileSummary,
            ArtifactKind::DirectorySummary,
            ArtifactKind::CodebaseDocumentation,
        ];
        for kind in kinds {
            assert_eq!(ArtifactKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_digest_is_stable() {
        let a = Artifact::new("x", ArtifactKind::FileTree, Stage::Prepare, json!("tree"));
        let b = Artifact::new("y", ArtifactKind::FileTree, Stage::Prepare, json!("tree"));
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
        assert_ne!(a.digest, payload_digest(&json!("other")));
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(names::file_summary("src/lib.rs"), "document/file/src/lib.rs");
        assert_eq!(names::directory_summary(""), "document/dir/.");
        assert_eq!(names::directory_summary("src"), "document/dir/src");
    }
}
