//! Hierarchical Aggregator
//!
//! Turns every source file into a [`FileSummary`], then folds summaries
//! upward directory by directory until the root yields the codebase
//! documentation.
//!
//! The work is an explicit dependency-counted graph over an arena of
//! directory nodes. A directory becomes ready for its merge call once all of
//! its file batches and child directories are resolved. Ready oracle calls
//! run concurrently (bounded by a semaphore); results are folded back into
//! the arena by the single driver loop, so no node is ever shared mutably.
//!
//! Children are sorted by path before each merge, so the produced text does
//! not depend on the order in which calls complete.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::partition::{BatchLimits, BatchStats, partition};
use crate::config::PipelineConfig;
use crate::oracle::{
    RetryPolicy, SharedSummarizer, Summary, SummaryContext, SummaryInput, call_with_retry,
};
use crate::store::{ArtifactStoreExt, SharedStore};
use crate::types::{
    ArtifactKind, CodebaseDocumentation, DirectorySummary, DocError, FileSummary, OracleError,
    Result, SourceFile, Stage, display_dir, names, parent_dir,
};

/// Background shared by every aggregation call
#[derive(Debug, Clone, Default)]
pub struct AggregationContext {
    pub project: String,
    /// Exploration narrative
    pub overview: String,
}

// =============================================================================
// Task graph
// =============================================================================

/// One directory in the arena
#[derive(Debug)]
struct DirNode {
    path: String,
    parent: Option<usize>,
    /// Indices into the input file slice, in input order
    files: Vec<usize>,
    child_dirs: usize,
    /// Unresolved file batches plus unresolved child directories
    pending: usize,
    file_summaries: Vec<FileSummary>,
    child_summaries: Vec<DirectorySummary>,
    /// Failed directories somewhere below this node
    missing: BTreeSet<String>,
    batch_failed: bool,
}

impl DirNode {
    fn new(path: &str, parent: Option<usize>) -> Self {
        Self {
            path: path.to_string(),
            parent,
            files: Vec::new(),
            child_dirs: 0,
            pending: 0,
            file_summaries: Vec::new(),
            child_summaries: Vec::new(),
            missing: BTreeSet::new(),
            batch_failed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    /// Summarize a batch of a directory's own files
    Batch,
    /// Merge a directory's child summaries
    Merge,
}

#[derive(Debug)]
struct Task {
    kind: TaskKind,
    dir: usize,
    directory: String,
    inputs: Vec<SummaryInput>,
}

struct TaskOutcome {
    kind: TaskKind,
    dir: usize,
    inputs: Vec<SummaryInput>,
    result: Result<Summary>,
}

/// Mutable aggregation state, owned by the driver loop
struct Graph {
    nodes: Vec<DirNode>,
    files: BTreeMap<String, FileSummary>,
    failed: BTreeSet<String>,
    root: Option<DirectorySummary>,
}

impl Graph {
    /// Arena with a node for every directory holding files and all its ancestors
    fn build(sources: &[SourceFile]) -> Self {
        let mut nodes = vec![DirNode::new("", None)];
        let mut index: HashMap<&str, usize> = HashMap::from([("", 0)]);

        for (i, file) in sources.iter().enumerate() {
            let dir = parent_dir(&file.path);

            let mut chain = Vec::new();
            let mut cursor = dir;
            while !index.contains_key(cursor) {
                chain.push(cursor);
                cursor = parent_dir(cursor);
            }
            let mut parent = index.get(cursor).copied().unwrap_or(0);
            for path in chain.into_iter().rev() {
                let id = nodes.len();
                nodes.push(DirNode::new(path, Some(parent)));
                nodes[parent].child_dirs += 1;
                index.insert(path, id);
                parent = id;
            }

            nodes[parent].files.push(i);
        }

        Self {
            nodes,
            files: BTreeMap::new(),
            failed: BTreeSet::new(),
            root: None,
        }
    }

    /// One unit of `dir`'s dependencies resolved. Returns the merge task
    /// once everything is in.
    fn resolve(&mut self, dir: usize) -> Option<Task> {
        let node = &mut self.nodes[dir];
        node.pending = node.pending.saturating_sub(1);
        if node.pending == 0 {
            self.finalize(dir)
        } else {
            None
        }
    }

    /// All dependencies of `dir` are resolved: schedule its merge or fail it
    fn finalize(&mut self, dir: usize) -> Option<Task> {
        let node = &mut self.nodes[dir];
        if node.batch_failed {
            return self.fail(dir, "a file batch failed");
        }

        node.file_summaries.sort_by(|a, b| a.path.cmp(&b.path));
        node.child_summaries
            .sort_by(|a, b| a.directory_path.cmp(&b.directory_path));

        let inputs: Vec<SummaryInput> = node
            .file_summaries
            .iter()
            .map(|f| SummaryInput::file_summary(f.path.as_str(), f.summary.as_str()))
            .chain(node.child_summaries.iter().map(|d| {
                SummaryInput::directory_summary(d.directory_path.as_str(), d.summary.as_str())
            }))
            .collect();

        if inputs.is_empty() {
            return self.fail(dir, "no child could be summarized");
        }

        Some(Task {
            kind: TaskKind::Merge,
            dir,
            directory: node.path.clone(),
            inputs,
        })
    }

    /// Mark `dir` failed and report it to its parent
    fn fail(&mut self, dir: usize, reason: &str) -> Option<Task> {
        let node = &mut self.nodes[dir];
        warn!(directory = %display_dir(&node.path), reason, "Directory could not be summarized");

        let path = node.path.clone();
        let mut lost = std::mem::take(&mut node.missing);
        lost.insert(path.clone());
        self.failed.insert(path);

        let parent = node.parent?;
        self.nodes[parent].missing.extend(lost);
        self.resolve(parent)
    }

    /// Record a completed directory summary and report it to its parent
    fn complete(&mut self, dir: usize, summary: DirectorySummary) -> Option<Task> {
        match self.nodes[dir].parent {
            Some(parent) => {
                let node = &mut self.nodes[parent];
                node.missing.extend(summary.missing_children.iter().cloned());
                node.child_summaries.push(summary);
                self.resolve(parent)
            }
            None => {
                self.root = Some(summary);
                None
            }
        }
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Bottom-up summarizer over the directory tree
pub struct Aggregator {
    summarizer: SharedSummarizer,
    store: SharedStore,
    limits: BatchLimits,
    concurrency_limit: usize,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Aggregator {
    pub fn new(
        summarizer: SharedSummarizer,
        store: SharedStore,
        config: &PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            summarizer,
            store,
            limits: BatchLimits::from_config(config)?,
            concurrency_limit: config.concurrency_limit,
            retry: RetryPolicy::from_config(&config.retry),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Summarize `files` into hierarchical documentation.
    ///
    /// File and directory summaries are persisted as they complete. A failed
    /// directory does not stop its siblings; it is listed in
    /// `failed_paths` and in each ancestor's `missing_children`. If the root
    /// cannot be summarized the result is `AggregationFailed`.
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn run(
        &self,
        context: &AggregationContext,
        files: &[SourceFile],
    ) -> Result<CodebaseDocumentation> {
        let mut graph = Graph::build(files);
        let semaphore = Semaphore::new(self.concurrency_limit);
        let mut in_flight = FuturesUnordered::new();

        let mut initial = Vec::new();
        let mut stats = BatchStats::default();
        for dir in 0..graph.nodes.len() {
            let node = &graph.nodes[dir];
            let batches = partition(node.files.iter().map(|&i| &files[i]), self.limits)?;
            stats.absorb(&BatchStats::from_batches(&batches));

            for batch in &batches {
                if batch.oversized {
                    warn!(
                        directory = %display_dir(&node.path),
                        chars = batch.total_chars,
                        "File exceeds max_chars, sending it alone"
                    );
                }
                initial.push(Task {
                    kind: TaskKind::Batch,
                    dir,
                    directory: node.path.clone(),
                    inputs: batch
                        .files
                        .iter()
                        .map(|f| SummaryInput::file(f.path.as_str(), f.content.as_str()))
                        .collect(),
                });
            }
            let pending = batches.len() + node.child_dirs;
            graph.nodes[dir].pending = pending;
        }

        info!(directories = graph.nodes.len(), "Aggregating: {}", stats.summary());

        for dir in 0..graph.nodes.len() {
            if graph.nodes[dir].pending == 0 {
                initial.extend(graph.finalize(dir));
            }
        }
        for task in initial {
            in_flight.push(self.execute(context, task, &semaphore));
        }

        while let Some(outcome) = in_flight.next().await {
            if let Some(task) = self.apply(&mut graph, outcome)? {
                in_flight.push(self.execute(context, task, &semaphore));
            }
        }

        let failed_paths: Vec<String> = graph.failed.into_iter().collect();
        let Some(root) = graph.root else {
            return Err(DocError::AggregationFailed { failed_paths });
        };

        info!(
            files = graph.files.len(),
            directories = root.directory_count(),
            failed = failed_paths.len(),
            "Aggregation complete"
        );

        Ok(CodebaseDocumentation {
            root,
            files: graph.files,
            failed_paths,
        })
    }

    /// Run one oracle call; each attempt holds a slot of the concurrency limit
    async fn execute(
        &self,
        context: &AggregationContext,
        task: Task,
        semaphore: &Semaphore,
    ) -> TaskOutcome {
        let summary_context = match task.kind {
            TaskKind::Batch => SummaryContext::FileBatch {
                project: context.project.clone(),
                directory: task.directory.clone(),
                overview: context.overview.clone(),
            },
            TaskKind::Merge => SummaryContext::Directory {
                project: context.project.clone(),
                directory: task.directory.clone(),
                overview: context.overview.clone(),
            },
        };
        let label = summary_context.label();
        debug!(call = %label, inputs = task.inputs.len(), "Dispatching oracle call");

        let summarizer = self.summarizer.as_ref();
        let (ctx, inputs) = (&summary_context, task.inputs.as_slice());
        let result = call_with_retry(&self.retry, &self.cancel, &label, move || async move {
            // Never closed, so acquisition only waits; released before any backoff sleep
            let _permit = semaphore.acquire().await.ok();
            let summary = summarizer.summarize(ctx, inputs).await?;
            if ctx.expects_per_input() {
                let missing = summary.missing_inputs(inputs);
                if !missing.is_empty() {
                    return Err(OracleError::incomplete(format!(
                        "Summary omitted {} of {} inputs: {}",
                        missing.len(),
                        inputs.len(),
                        missing.join(", ")
                    )));
                }
            }
            Ok(summary)
        })
        .await;

        TaskOutcome {
            kind: task.kind,
            dir: task.dir,
            inputs: task.inputs,
            result,
        }
    }

    /// Fold a finished call into the graph; returns the next ready task
    fn apply(&self, graph: &mut Graph, outcome: TaskOutcome) -> Result<Option<Task>> {
        let TaskOutcome {
            kind,
            dir,
            inputs,
            result,
        } = outcome;

        let summary = match result {
            Ok(summary) => summary,
            Err(DocError::Cancelled) => return Err(DocError::Cancelled),
            Err(e) => {
                let directory = display_dir(&graph.nodes[dir].path).to_string();
                warn!(%directory, ?kind, error = %e, "Oracle call failed");
                return Ok(match kind {
                    TaskKind::Batch => {
                        graph.nodes[dir].batch_failed = true;
                        graph.resolve(dir)
                    }
                    TaskKind::Merge => graph.fail(dir, "merge call failed"),
                });
            }
        };

        match kind {
            TaskKind::Batch => {
                let mut per_input = summary.per_input;
                for input in inputs {
                    let text = per_input.remove(&input.path).unwrap_or_default();
                    let file_summary = FileSummary {
                        path: input.path,
                        summary: text.trim().to_string(),
                    };
                    self.store.put_document(
                        &names::file_summary(&file_summary.path),
                        ArtifactKind::FileSummary,
                        Stage::Document,
                        &file_summary,
                    )?;
                    graph
                        .files
                        .insert(file_summary.path.clone(), file_summary.clone());
                    graph.nodes[dir].file_summaries.push(file_summary);
                }
                Ok(graph.resolve(dir))
            }
            TaskKind::Merge => {
                let node = &mut graph.nodes[dir];
                let directory_summary = DirectorySummary {
                    directory_path: node.path.clone(),
                    child_file_summaries: std::mem::take(&mut node.file_summaries),
                    child_directory_summaries: std::mem::take(&mut node.child_summaries),
                    summary: summary.text.trim().to_string(),
                    missing_children: node.missing.iter().cloned().collect(),
                };
                self.store.put_document(
                    &names::directory_summary(&directory_summary.directory_path),
                    ArtifactKind::DirectorySummary,
                    Stage::Document,
                    &directory_summary,
                )?;
                debug!(
                    directory = %display_dir(&directory_summary.directory_path),
                    "Directory summarized"
                );
                Ok(graph.complete(dir, directory_summary))
            }
        }
    }
}
