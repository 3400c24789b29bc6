pub mod artifact;
pub mod document;
pub mod error;
pub mod source;

pub use artifact::{Artifact, ArtifactKind, ArtifactRef, Stage, names, payload_digest};
pub use document::{
    CodebaseDocumentation, DirectorySummary, ExplorationRound, FileSummary, InitialDescription,
    StopReason,
};
pub use error::{DocError, ErrorCategory, ErrorClassifier, OracleError, Result};
pub use source::{FileInfo, SourceFile, display_dir, parent_dir};
