//! Pipeline stages
//!
//! Each stage declares the artifact kinds it reads and writes. The
//! controller checks both sides of that contract around every run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::aggregate::{AggregationContext, Aggregator};
use super::explore::{ExplorationLoop, ExplorationSeed};
use crate::config::{PipelineConfig, PrepareConfig};
use crate::oracle::{SharedSelector, SharedSummarizer};
use crate::prepare::{
    FileFilter, FileTree, SourceScanner, apply_filters, file_statistics, has_likely_encoded_data,
};
use crate::store::{ArtifactStoreExt, SharedStore};
use crate::types::{
    ArtifactKind, CodebaseDocumentation, DocError, InitialDescription, Result, SourceFile, Stage,
    names,
};

/// What a stage gets from the controller
pub struct StageContext {
    pub store: SharedStore,
    pub cancel: CancellationToken,
    pub run_id: String,
}

/// One step of the pipeline
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn stage(&self) -> Stage;

    /// Kinds that must already be in the store
    fn requires(&self) -> &'static [ArtifactKind];

    /// Kinds this stage writes, all of which must be produced
    fn produces(&self) -> &'static [ArtifactKind];

    async fn run(&self, context: &StageContext) -> Result<()>;
}

/// Load the project name from config or the root directory
pub fn project_name(root: &Path, configured: Option<&str>) -> String {
    if let Some(name) = configured.filter(|n| !n.trim().is_empty()) {
        return name.trim().to_string();
    }
    root.canonicalize()
        .unwrap_or_else(|_| root.to_path_buf())
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}

// =============================================================================
// Prepare
// =============================================================================

/// Loads, filters and catalogs the project's source files
pub struct PrepareStage {
    root: PathBuf,
    config: PrepareConfig,
}

impl PrepareStage {
    pub fn new(root: impl Into<PathBuf>, config: PrepareConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }
}

#[async_trait]
impl PipelineStage for PrepareStage {
    fn stage(&self) -> Stage {
        Stage::Prepare
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &[]
    }

    fn produces(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::SourceFiles, ArtifactKind::FileTree]
    }

    #[instrument(skip_all, fields(root = %self.root.display()))]
    async fn run(&self, context: &StageContext) -> Result<()> {
        let scanned = SourceScanner::from_config(&self.root, &self.config)?.scan()?;
        let mut files = apply_filters(scanned, &FileFilter::from_config(&self.config))?;

        if self.config.skip_encoded {
            files.retain(|f| {
                let encoded = has_likely_encoded_data(&f.content);
                if encoded {
                    debug!(path = %f.path, "Dropping file with encoded data");
                }
                !encoded
            });
        }

        if files.is_empty() {
            return Err(DocError::config(format!(
                "No source files found under {}",
                self.root.display()
            )));
        }

        for (path, (size, _)) in file_statistics(&files) {
            debug!(%path, %size, "Large or encoded file kept");
        }

        let tree = FileTree::new(&files);
        info!(
            files = files.len(),
            bytes = tree.total_bytes(),
            "Sources prepared"
        );

        context.store.put_document(
            names::SOURCE_FILES,
            ArtifactKind::SourceFiles,
            Stage::Prepare,
            &files,
        )?;
        context.store.put_document(
            names::FILE_TREE,
            ArtifactKind::FileTree,
            Stage::Prepare,
            &tree.render(),
        )?;
        Ok(())
    }
}

// =============================================================================
// Explore
// =============================================================================

/// Builds the initial description through iterative exploration
pub struct ExploreStage {
    selector: SharedSelector,
    summarizer: SharedSummarizer,
    config: PipelineConfig,
    project: String,
    hints: Vec<String>,
}

impl ExploreStage {
    pub fn new(
        selector: SharedSelector,
        summarizer: SharedSummarizer,
        config: PipelineConfig,
        project: impl Into<String>,
        hints: Vec<String>,
    ) -> Self {
        Self {
            selector,
            summarizer,
            config,
            project: project.into(),
            hints,
        }
    }
}

#[async_trait]
impl PipelineStage for ExploreStage {
    fn stage(&self) -> Stage {
        Stage::Explore
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::SourceFiles, ArtifactKind::FileTree]
    }

    fn produces(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::InitialDescription]
    }

    async fn run(&self, context: &StageContext) -> Result<()> {
        let files: Vec<SourceFile> = context.store.get_document(names::SOURCE_FILES)?;
        let file_tree: String = context.store.get_document(names::FILE_TREE)?;

        let mut hints = self.hints.clone();
        hints.extend(
            file_statistics(&files)
                .into_iter()
                .map(|(path, (size, _))| format!("{} is large or holds encoded data ({})", path, size)),
        );

        let seed = ExplorationSeed {
            project: self.project.clone(),
            file_tree,
            hints,
        };
        let description = ExplorationLoop::new(
            self.selector.clone(),
            self.summarizer.clone(),
            &self.config,
        )?
        .with_cancellation(context.cancel.clone())
        .run(&seed, &files)
        .await?;

        context.store.put_document(
            names::INITIAL_DESCRIPTION,
            ArtifactKind::InitialDescription,
            Stage::Explore,
            &description,
        )?;
        Ok(())
    }
}

// =============================================================================
// Document
// =============================================================================

/// Summarizes the whole codebase bottom-up
pub struct DocumentStage {
    summarizer: SharedSummarizer,
    config: PipelineConfig,
    project: String,
}

impl DocumentStage {
    pub fn new(
        summarizer: SharedSummarizer,
        config: PipelineConfig,
        project: impl Into<String>,
    ) -> Self {
        Self {
            summarizer,
            config,
            project: project.into(),
        }
    }
}

#[async_trait]
impl PipelineStage for DocumentStage {
    fn stage(&self) -> Stage {
        Stage::Document
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::SourceFiles, ArtifactKind::InitialDescription]
    }

    fn produces(&self) -> &'static [ArtifactKind] {
        &[
            ArtifactKind::FileSummary,
            ArtifactKind::DirectorySummary,
            ArtifactKind::CodebaseDocumentation,
        ]
    }

    async fn run(&self, context: &StageContext) -> Result<()> {
        let files: Vec<SourceFile> = context.store.get_document(names::SOURCE_FILES)?;
        let description: InitialDescription =
            context.store.get_document(names::INITIAL_DESCRIPTION)?;

        let aggregation = AggregationContext {
            project: self.project.clone(),
            overview: description.narrative,
        };
        let documentation: CodebaseDocumentation =
            Aggregator::new(self.summarizer.clone(), context.store.clone(), &self.config)?
                .with_cancellation(context.cancel.clone())
                .run(&aggregation, &files)
                .await?;

        context.store.put_document(
            names::CODEBASE_DOCUMENTATION,
            ArtifactKind::CodebaseDocumentation,
            Stage::Document,
            &documentation,
        )?;
        Ok(())
    }
}
