//! Pipeline Controller
//!
//! Sequences Prepare → Explore → Document and enforces each stage's artifact
//! contract. Holds no state between runs; everything a stage needs comes
//! from the store.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Span, info, instrument};
use uuid::Uuid;

use super::stages::{
    DocumentStage, ExploreStage, PipelineStage, PrepareStage, StageContext, project_name,
};
use crate::config::Config;
use crate::oracle::{SharedSelector, SharedSummarizer};
use crate::store::{ArtifactStoreExt, SharedStore};
use crate::types::{
    ArtifactKind, ArtifactRef, CodebaseDocumentation, DocError, InitialDescription, Result, Stage,
    names,
};

/// Outcome of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    /// Present when the Explore stage ran
    pub initial_description: Option<InitialDescription>,
    /// Present when the Document stage ran
    pub documentation: Option<CodebaseDocumentation>,
    /// Everything written during this run, in stage order
    pub artifacts: Vec<ArtifactRef>,
}

impl PipelineReport {
    pub fn artifact_count(&self, kind: ArtifactKind) -> usize {
        self.artifacts.iter().filter(|a| a.kind == kind).count()
    }
}

pub struct PipelineController {
    store: SharedStore,
    stages: Vec<Box<dyn PipelineStage>>,
    cancel: CancellationToken,
}

impl PipelineController {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            stages: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Controller with the three standard stages
    pub fn standard(
        root: &Path,
        config: &Config,
        selector: SharedSelector,
        summarizer: SharedSummarizer,
        store: SharedStore,
    ) -> Result<Self> {
        config.validate()?;
        let project = project_name(root, config.project.name.as_deref());

        Ok(Self::new(store)
            .with_stage(PrepareStage::new(root, config.prepare.clone()))
            .with_stage(ExploreStage::new(
                selector,
                summarizer.clone(),
                config.pipeline.clone(),
                project.clone(),
                config.project.hints.clone(),
            ))
            .with_stage(DocumentStage::new(
                summarizer,
                config.pipeline.clone(),
                project,
            )))
    }

    /// Add a stage. Stages run in [`Stage`] order regardless of insertion.
    pub fn with_stage(mut self, stage: impl PipelineStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self.stages.sort_by_key(|s| s.stage());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the run when fired
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every stage
    pub async fn run(&self) -> Result<PipelineReport> {
        self.run_until(Stage::Document).await
    }

    /// Run stages up to and including `last`
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run_until(&self, last: Stage) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4().to_string();
        Span::current().record("run_id", run_id.as_str());

        let context = StageContext {
            store: self.store.clone(),
            cancel: self.cancel.clone(),
            run_id: run_id.clone(),
        };

        let started = Instant::now();
        let mut artifacts = Vec::new();
        let mut ran = HashSet::new();

        for stage in self.stages.iter().filter(|s| s.stage() <= last) {
            if self.cancel.is_cancelled() {
                return Err(DocError::Cancelled);
            }
            let produced = self.run_stage(stage.as_ref(), &context).await?;
            artifacts.extend(produced);
            ran.insert(stage.stage());
        }

        let initial_description = if ran.contains(&Stage::Explore) {
            Some(self.store.get_document(names::INITIAL_DESCRIPTION)?)
        } else {
            None
        };
        let documentation = if ran.contains(&Stage::Document) {
            Some(self.store.get_document(names::CODEBASE_DOCUMENTATION)?)
        } else {
            None
        };

        info!(
            stages = ran.len(),
            artifacts = artifacts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );

        Ok(PipelineReport {
            run_id,
            initial_description,
            documentation,
            artifacts,
        })
    }

    async fn run_stage(
        &self,
        stage: &dyn PipelineStage,
        context: &StageContext,
    ) -> Result<Vec<ArtifactRef>> {
        let name = stage.stage();

        for kind in stage.requires() {
            if self.store.list_by_kind(*kind)?.is_empty() {
                return Err(DocError::ContractViolation {
                    stage: name,
                    message: format!("required artifact kind `{}` is missing", kind),
                });
            }
        }

        let cleared = self.store.clear_stage(name)?;
        if cleared > 0 {
            info!(stage = %name, cleared, "Cleared artifacts from a previous run");
        }

        let started = Instant::now();
        info!(stage = %name, run_id = %context.run_id, "Stage started");
        stage
            .run(context)
            .await
            .map_err(|e| DocError::stage(name, e))?;

        let produced = self.store.list_by_stage(name)?;
        let declared = stage.produces();
        if let Some(stray) = produced.iter().find(|a| !declared.contains(&a.kind)) {
            return Err(DocError::ContractViolation {
                stage: name,
                message: format!("produced undeclared artifact `{}` ({})", stray.name, stray.kind),
            });
        }
        if let Some(missing) = declared
            .iter()
            .find(|kind| !produced.iter().any(|a| a.kind == **kind))
        {
            return Err(DocError::ContractViolation {
                stage: name,
                message: format!("declared artifact kind `{}` was not produced", missing),
            });
        }

        info!(
            stage = %name,
            artifacts = produced.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage complete"
        );
        Ok(produced)
    }
}
