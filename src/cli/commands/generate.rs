//! Generate Command
//!
//! Runs the documentation pipeline against a project.
//!
//! Usage:
//!   docloom generate [PATH] [--until STAGE] [--output FILE] [--json]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::ai::create_provider;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::config::{Config, StoreBackend};
use crate::oracle::{LlmSelector, LlmSummarizer};
use crate::pipeline::{PipelineController, PipelineReport};
use crate::prepare::format_size;
use crate::types::{ArtifactKind, DocError, Result, Stage, display_dir};

/// Command-line overrides layered on top of the loaded config
#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub path: Option<PathBuf>,
    pub until: Option<Stage>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub max_iterations: Option<usize>,
    pub concurrency: Option<usize>,
    /// Keep artifacts in memory only
    pub ephemeral: bool,
    pub quiet: bool,
}

impl GenerateOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(api_base) = &self.api_base {
            config.llm.api_base = Some(api_base.clone());
        }
        if let Some(n) = self.max_iterations {
            config.pipeline.max_iterations = n;
        }
        if let Some(n) = self.concurrency {
            config.pipeline.concurrency_limit = n;
        }
        if self.ephemeral {
            config.store.backend = StoreBackend::Memory;
        }
    }
}

pub async fn run(options: GenerateOptions) -> Result<()> {
    let mut context = CommandContext::load(options.path.clone())?;
    options.apply(&mut context.config);
    context.config.validate()?;

    let out = Output::quiet(options.quiet || options.json);
    let project = context.project_name();
    out.header(&format!("docloom: {}", project));
    out.field("Root", context.root.display());
    out.field("Model", &context.config.llm.model);

    let provider = create_provider(&context.config.llm)?;
    let store = context.open_store()?;
    if context.config.store.backend == StoreBackend::Sqlite {
        out.field("Store", context.store_path().display());
    }

    let controller = PipelineController::standard(
        &context.root,
        &context.config,
        Arc::new(LlmSelector::new(provider.clone())),
        Arc::new(LlmSummarizer::new(provider)),
        store,
    )?;

    let cancel = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let report = controller
        .run_until(options.until.unwrap_or(Stage::Document))
        .await?;

    if let Some(path) = &options.output {
        write_output(path, &report)?;
        out.success(&format!("Wrote {}", path.display()));
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&out, &report);
    }
    Ok(())
}

/// Documentation when produced, otherwise the whole report
fn write_output(path: &Path, report: &PipelineReport) -> Result<()> {
    let json = match &report.documentation {
        Some(documentation) => serde_json::to_string_pretty(documentation)?,
        None => serde_json::to_string_pretty(report)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json).map_err(DocError::Io)
}

fn print_report(out: &Output, report: &PipelineReport) {
    out.header("Run summary");
    out.field("Run", &report.run_id);
    let bytes: usize = report.artifacts.iter().map(|a| a.size).sum();
    out.field(
        "Artifacts",
        format!("{} ({})", report.artifacts.len(), format_size(bytes as u64)),
    );

    if let Some(description) = &report.initial_description {
        out.field(
            "Exploration",
            format!(
                "{} rounds, {} files examined, stopped: {}",
                description.rounds.len(),
                description.examined_paths().len(),
                description.stop_reason
            ),
        );
    }

    if let Some(documentation) = &report.documentation {
        out.field(
            "Documented",
            format!(
                "{} files, {} directories",
                report.artifact_count(ArtifactKind::FileSummary),
                report.artifact_count(ArtifactKind::DirectorySummary)
            ),
        );
        if documentation.is_partial() {
            out.warning(&format!(
                "{} directories could not be summarized:",
                documentation.failed_paths.len()
            ));
            for path in &documentation.failed_paths {
                out.item(display_dir(path));
            }
        }
        out.header("Overview");
        println!("{}", documentation.root.summary);
    }

    out.success("Done");
}
