//! Exploration Loop
//!
//! Builds an initial description of an unknown codebase under a fixed
//! context budget:
//!
//! ```text
//! INIT → (SELECT → SUMMARIZE → DECIDE)* → DONE
//! ```
//!
//! Each round the selection oracle sees the history so far and the files
//! not yet examined, the chosen files are cut to one batch, and the
//! summarization oracle turns them into the round's findings. Rounds run
//! strictly one after another; the loop itself has no randomness.

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::partition::{BatchLimits, partition};
use crate::config::PipelineConfig;
use crate::oracle::{
    RetryPolicy, SelectionContext, SharedSelector, SharedSummarizer, SummaryContext,
    SummaryInput, call_with_retry,
};
use crate::types::{
    DocError, ExplorationRound, FileInfo, InitialDescription, Result, SourceFile, StopReason,
};

/// Fixed inputs of an exploration run
#[derive(Debug, Clone, Default)]
pub struct ExplorationSeed {
    pub project: String,
    /// Rendered directory tree
    pub file_tree: String,
    /// User-supplied hints about the project
    pub hints: Vec<String>,
}

/// Iterative select → summarize → decide loop
pub struct ExplorationLoop {
    selector: SharedSelector,
    summarizer: SharedSummarizer,
    max_iterations: usize,
    limits: BatchLimits,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ExplorationLoop {
    pub fn new(
        selector: SharedSelector,
        summarizer: SharedSummarizer,
        config: &PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            selector,
            summarizer,
            max_iterations: config.max_iterations,
            limits: BatchLimits::from_config(config)?,
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

    /// Explore `files` (the candidate pool, in stable order).
    ///
    /// Fails with `ExplorationFailed` when a round's oracle call fails
    /// permanently or exhausts its retries, and with `Cancelled` when the
    /// token fires.
    #[instrument(skip_all, fields(project = %seed.project, files = files.len()))]
    pub async fn run(
        &self,
        seed: &ExplorationSeed,
        files: &[SourceFile],
    ) -> Result<InitialDescription> {
        let by_path: HashMap<&str, &SourceFile> =
            files.iter().map(|f| (f.path.as_str(), f)).collect();
        let mut examined: HashSet<String> = HashSet::new();
        let mut rounds: Vec<ExplorationRound> = Vec::new();

        let stop_reason = loop {
            let iteration = rounds.len() + 1;

            let candidates: Vec<String> = files
                .iter()
                .filter(|f| !examined.contains(&f.path))
                .map(|f| f.path.clone())
                .collect();
            if candidates.is_empty() {
                break StopReason::CandidatesExhausted;
            }

            // SELECT
            let selection_context = SelectionContext {
                project: seed.project.clone(),
                file_tree: seed.file_tree.clone(),
                hints: seed.hints.clone(),
                history: rounds.clone(),
                iteration,
                max_iterations: self.max_iterations,
            };
            let selector = self.selector.as_ref();
            let (ctx, cands) = (&selection_context, candidates.as_slice());
            let selection = call_with_retry(
                &self.retry,
                &self.cancel,
                "select",
                move || selector.select(ctx, cands),
            )
            .await
            .map_err(|e| round_failure(iteration, e))?;

            let chosen = self.accept_selection(iteration, selection.chosen, &by_path, &examined);
            if chosen.is_empty() {
                info!(round = iteration, "Selection oracle chose no usable file");
                break StopReason::NothingSelected;
            }

            // Bound the round to one batch
            let chosen_files: Vec<&SourceFile> = chosen
                .iter()
                .filter_map(|info| by_path.get(info.path.as_str()).copied())
                .collect();
            let batches = partition(chosen_files.iter().copied(), self.limits)?;
            let Some(batch) = batches.first() else {
                break StopReason::NothingSelected;
            };
            let mut chosen = chosen;
            if batch.count() < chosen.len() {
                debug!(
                    round = iteration,
                    kept = batch.count(),
                    dropped = chosen.len() - batch.count(),
                    "Selection exceeds batch limits, truncating"
                );
                chosen.truncate(batch.count());
            }
            if batch.oversized {
                warn!(
                    round = iteration,
                    path = %chosen[0].path,
                    chars = batch.total_chars,
                    "Selected file exceeds max_chars, sending it alone"
                );
            }
            let inputs: Vec<SummaryInput> = batch
                .files
                .iter()
                .map(|f| SummaryInput::file(f.path.as_str(), f.content.as_str()))
                .collect();

            // SUMMARIZE
            let summary_context = SummaryContext::Exploration {
                project: seed.project.clone(),
                file_tree: seed.file_tree.clone(),
                hints: seed.hints.clone(),
                history: rounds.clone(),
                iteration,
            };
            let summarizer = self.summarizer.as_ref();
            let (ctx, batch_inputs) = (&summary_context, inputs.as_slice());
            let summary = call_with_retry(
                &self.retry,
                &self.cancel,
                "summarize",
                move || summarizer.summarize(ctx, batch_inputs),
            )
            .await
            .map_err(|e| round_failure(iteration, e))?;

            examined.extend(chosen.iter().map(|f| f.path.clone()));
            info!(
                round = iteration,
                files = chosen.len(),
                continue_exploring = selection.continue_exploring,
                "Exploration round complete"
            );
            rounds.push(ExplorationRound {
                iteration_index: iteration,
                selected_files: chosen,
                oracle_summary: summary.text,
                continue_exploring: selection.continue_exploring,
            });

            // DECIDE
            if !selection.continue_exploring {
                break StopReason::OracleStop;
            }
            if iteration >= self.max_iterations {
                break StopReason::IterationCap;
            }
            if examined.len() >= files.len() {
                break StopReason::CandidatesExhausted;
            }
        };

        info!(rounds = rounds.len(), stop = %stop_reason, "Exploration finished");
        Ok(InitialDescription::from_rounds(rounds, stop_reason))
    }

    /// Keep candidate paths only, first occurrence wins
    fn accept_selection(
        &self,
        iteration: usize,
        chosen: Vec<FileInfo>,
        by_path: &HashMap<&str, &SourceFile>,
        examined: &HashSet<String>,
    ) -> Vec<FileInfo> {
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(chosen.len());

        for info in chosen {
            if !by_path.contains_key(info.path.as_str()) {
                warn!(round = iteration, path = %info.path, "Ignoring selection of unknown file");
                continue;
            }
            if examined.contains(&info.path) {
                warn!(round = iteration, path = %info.path, "Ignoring already examined file");
                continue;
            }
            if !seen.insert(info.path.clone()) {
                continue;
            }
            accepted.push(info);
        }
        accepted
    }
}

fn round_failure(round: usize, err: DocError) -> DocError {
    match err {
        DocError::Cancelled => DocError::Cancelled,
        other => DocError::ExplorationFailed {
            round,
            source: Box::new(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::oracle::Selection;
    use crate::pipeline::testing::{MockSelector, MockSummarizer, source, sources};
    use crate::types::OracleError;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn config() -> PipelineConfig {
        PipelineConfig {
            retry: RetryConfig::immediate(3),
            ..PipelineConfig::default()
        }
    }

    fn seed() -> ExplorationSeed {
        ExplorationSeed {
            project: "demo".into(),
            file_tree: "demo/".into(),
            hints: vec!["a cli tool".into()],
        }
    }

    fn many_files(count: usize) -> Vec<SourceFile> {
        (0..count)
            .map(|i| source(&format!("src/f{:03}.rs", i), 50))
            .collect()
    }

    fn exploration(
        selector: MockSelector,
        summarizer: MockSummarizer,
        config: &PipelineConfig,
    ) -> (ExplorationLoop, Arc<MockSelector>, Arc<MockSummarizer>) {
        let selector = Arc::new(selector);
        let summarizer = Arc::new(summarizer);
        let explorer =
            ExplorationLoop::new(selector.clone(), summarizer.clone(), config).unwrap();
        (explorer, selector, summarizer)
    }

    #[tokio::test]
    async fn test_stops_when_oracle_says_so() {
        let (explorer, _, summarizer) =
            exploration(MockSelector::new(2, Some(2)), MockSummarizer::new(), &config());

        let description = explorer.run(&seed(), &many_files(10)).await.unwrap();

        assert_eq!(description.rounds.len(), 2);
        assert_eq!(description.stop_reason, StopReason::OracleStop);
        assert!(!description.rounds[1].continue_exploring);
        assert_eq!(
            description.narrative,
            "Round 1 read src/f000.rs, src/f001.rs.\n\nRound 2 read src/f002.rs, src/f003.rs."
        );
        // Second round summarizer saw the first round as history
        assert_eq!(*summarizer.exploration_history.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_always_continue_hits_iteration_cap() {
        let (explorer, selector, _) =
            exploration(MockSelector::new(1, None), MockSummarizer::new(), &config());

        let description = explorer.run(&seed(), &many_files(100)).await.unwrap();

        assert_eq!(description.rounds.len(), 5);
        assert_eq!(description.stop_reason, StopReason::IterationCap);
        assert_eq!(selector.calls.load(Ordering::SeqCst), 5);
        let indices: Vec<_> = description.rounds.iter().map(|r| r.iteration_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_candidate_pool_exhaustion() {
        let (explorer, selector, _) =
            exploration(MockSelector::new(2, None), MockSummarizer::new(), &config());

        let description = explorer.run(&seed(), &many_files(3)).await.unwrap();

        assert_eq!(description.rounds.len(), 2);
        assert_eq!(description.stop_reason, StopReason::CandidatesExhausted);
        assert_eq!(description.examined_paths().len(), 3);
        // Candidates shrink as files are examined
        let seen = selector.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(1, 0, 3), (2, 1, 1)]);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let (explorer, selector, _) =
            exploration(MockSelector::new(1, None), MockSummarizer::new(), &config());

        let description = explorer.run(&seed(), &[]).await.unwrap();
        assert!(description.rounds.is_empty());
        assert_eq!(description.stop_reason, StopReason::CandidatesExhausted);
        assert_eq!(selector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_selections_are_discarded() {
        let selector = MockSelector::scripted(vec![
            Ok(Selection {
                chosen: vec![
                    FileInfo::new("ghost.rs", "does not exist"),
                    FileInfo::new("a.rs", "entry"),
                    FileInfo::new("a.rs", "again"),
                ],
                continue_exploring: true,
            }),
            Ok(Selection {
                chosen: vec![FileInfo::new("a.rs", "already read")],
                continue_exploring: true,
            }),
        ]);
        let (explorer, _, _) = exploration(selector, MockSummarizer::new(), &config());

        let description = explorer
            .run(&seed(), &sources(&["a.rs", "b.rs"]))
            .await
            .unwrap();

        assert_eq!(description.rounds.len(), 1);
        assert_eq!(
            description.rounds[0].selected_files,
            vec![FileInfo::new("a.rs", "entry")]
        );
        assert_eq!(description.stop_reason, StopReason::NothingSelected);
    }

    #[tokio::test]
    async fn test_selection_cut_to_one_batch() {
        let config = PipelineConfig {
            max_files: 2,
            ..config()
        };
        let (explorer, _, summarizer) =
            exploration(MockSelector::new(5, Some(1)), MockSummarizer::new(), &config);

        let description = explorer.run(&seed(), &many_files(10)).await.unwrap();

        assert_eq!(description.rounds[0].selected_files.len(), 2);
        let log = summarizer.log.lock().unwrap();
        assert_eq!(log[0].1, vec!["src/f000.rs", "src/f001.rs"]);
    }

    #[tokio::test]
    async fn test_oversized_file_examined_alone() {
        let config = PipelineConfig {
            max_chars: 1_000,
            ..config()
        };
        let files = vec![source("big.sql", 5_000), source("small.rs", 10)];
        let (explorer, _, _) =
            exploration(MockSelector::new(2, None), MockSummarizer::new(), &config);

        let description = explorer.run(&seed(), &files).await.unwrap();

        assert_eq!(description.rounds.len(), 2);
        assert_eq!(description.rounds[0].selected_files[0].path, "big.sql");
        assert_eq!(description.rounds[0].selected_files.len(), 1);
        assert_eq!(description.stop_reason, StopReason::CandidatesExhausted);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (explorer, _, summarizer) = exploration(
            MockSelector::new(1, Some(1)),
            MockSummarizer::new().transient_failures(2),
            &config(),
        );

        let description = explorer.run(&seed(), &many_files(3)).await.unwrap();

        assert_eq!(description.rounds.len(), 1);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_round() {
        let (explorer, _, summarizer) = exploration(
            MockSelector::new(1, None),
            MockSummarizer::new().always_transient(),
            &config(),
        );

        let err = explorer.run(&seed(), &many_files(3)).await.unwrap_err();

        assert!(matches!(err, DocError::ExplorationFailed { round: 1, .. }));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_names_round() {
        let selector = MockSelector::scripted(vec![
            Ok(Selection {
                chosen: vec![FileInfo::new("src/f000.rs", "first")],
                continue_exploring: true,
            }),
            Err(OracleError::permanent("invalid request")),
        ]);
        let (explorer, selector, _) = exploration(selector, MockSummarizer::new(), &config());

        let err = explorer.run(&seed(), &many_files(3)).await.unwrap_err();

        match err {
            DocError::ExplorationFailed { round, source } => {
                assert_eq!(round, 2);
                assert!(matches!(*source, DocError::Oracle(ref e) if !e.is_transient()));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Permanent errors are not retried
        assert_eq!(selector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (explorer, _, _) =
            exploration(MockSelector::new(1, None), MockSummarizer::new(), &config());
        let explorer = explorer.with_cancellation(cancel);

        let err = explorer.run(&seed(), &many_files(3)).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            max_iterations: 0,
            ..PipelineConfig::default()
        };
        let result = ExplorationLoop::new(
            Arc::new(MockSelector::new(1, None)),
            Arc::new(MockSummarizer::new()),
            &config,
        );
        assert!(matches!(result, Err(DocError::Configuration(_))));
    }
}
