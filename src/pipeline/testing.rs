//! Scripted oracles for pipeline tests

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::oracle::{
    InputKind, OracleResult, Selection, SelectionContext, SelectionOracle, SummarizationOracle,
    Summary, SummaryContext, SummaryInput,
};
use crate::types::{FileInfo, OracleError, SourceFile, display_dir};

pub(crate) fn source(path: &str, chars: usize) -> SourceFile {
    SourceFile::new(path, "x".repeat(chars))
}

pub(crate) fn sources(paths: &[&str]) -> Vec<SourceFile> {
    paths.iter().map(|p| source(p, 100)).collect()
}

// =============================================================================
// Selector
// =============================================================================

/// Picks the first `per_round` candidates unless a scripted answer is queued
pub(crate) struct MockSelector {
    per_round: usize,
    /// Round on which `continue` turns false
    stop_at_round: Option<usize>,
    script: Mutex<VecDeque<OracleResult<Selection>>>,
    pub calls: AtomicUsize,
    /// (iteration, history length, candidate count) per call
    pub seen: Mutex<Vec<(usize, usize, usize)>>,
}

impl MockSelector {
    pub fn new(per_round: usize, stop_at_round: Option<usize>) -> Self {
        Self {
            per_round,
            stop_at_round,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(answers: Vec<OracleResult<Selection>>) -> Self {
        let selector = Self::new(1, None);
        *selector.script.lock().unwrap() = answers.into();
        selector
    }
}

#[async_trait]
impl SelectionOracle for MockSelector {
    async fn select(
        &self,
        context: &SelectionContext,
        candidates: &[String],
    ) -> OracleResult<Selection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((
            context.iteration,
            context.history.len(),
            candidates.len(),
        ));

        if let Some(answer) = self.script.lock().unwrap().pop_front() {
            return answer;
        }

        Ok(Selection {
            chosen: candidates
                .iter()
                .take(self.per_round)
                .map(|p| FileInfo::new(p.as_str(), "next in line"))
                .collect(),
            continue_exploring: self.stop_at_round.is_none_or(|r| context.iteration < r),
        })
    }
}

// =============================================================================
// Summarizer
// =============================================================================

/// Deterministic summarizer with optional latency and failure injection.
///
/// Output text depends only on the call's directory and its inputs, so any
/// scheduling order yields the same documents.
#[derive(Default)]
pub(crate) struct MockSummarizer {
    /// Seeds per-call sleep (0..20ms) when set
    latency_seed: Option<u64>,
    /// Directories whose merge fails permanently
    fail_merges: HashSet<String>,
    /// Directories whose file batches fail permanently
    fail_batches: HashSet<String>,
    /// First N calls fail transiently
    transient_failures: AtomicUsize,
    /// First N file batches omit their first input
    omit_first_input: AtomicUsize,
    /// Every call fails transiently
    always_transient: bool,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Call labels with their input paths
    pub log: Mutex<Vec<(String, Vec<String>)>>,
    /// History lengths seen by exploration calls
    pub exploration_history: Mutex<Vec<usize>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, seed: u64) -> Self {
        self.latency_seed = Some(seed);
        self
    }

    pub fn failing_merge(mut self, directory: &str) -> Self {
        self.fail_merges.insert(directory.to_string());
        self
    }

    pub fn failing_batches(mut self, directory: &str) -> Self {
        self.fail_batches.insert(directory.to_string());
        self
    }

    pub fn transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn omitting_first_input(self, count: usize) -> Self {
        self.omit_first_input.store(count, Ordering::SeqCst);
        self
    }

    pub fn always_transient(mut self) -> Self {
        self.always_transient = true;
        self
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn simulate_latency(&self, label: &str) {
        if let Some(seed) = self.latency_seed {
            let mut hasher = DefaultHasher::new();
            seed.hash(&mut hasher);
            label.hash(&mut hasher);
            tokio::time::sleep(Duration::from_millis(hasher.finish() % 20)).await;
        }
    }

    async fn answer(
        &self,
        context: &SummaryContext,
        inputs: &[SummaryInput],
    ) -> OracleResult<Summary> {
        let label = context.label();
        self.log.lock().unwrap().push((
            label.clone(),
            inputs.iter().map(|i| i.path.clone()).collect(),
        ));
        self.simulate_latency(&format!(
            "{}:{}",
            label,
            inputs.first().map(|i| i.path.as_str()).unwrap_or("")
        ))
        .await;

        if self.always_transient || Self::take_one(&self.transient_failures) {
            return Err(OracleError::transient("simulated rate limit"));
        }

        match context {
            SummaryContext::Exploration {
                iteration, history, ..
            } => {
                self.exploration_history.lock().unwrap().push(history.len());
                let paths: Vec<_> = inputs.iter().map(|i| i.path.as_str()).collect();
                Ok(Summary::text(format!(
                    "Round {} read {}.",
                    iteration,
                    paths.join(", ")
                )))
            }
            SummaryContext::FileBatch { directory, .. } => {
                if self.fail_batches.contains(directory) {
                    return Err(OracleError::permanent(format!(
                        "refused batch in {}",
                        display_dir(directory)
                    )));
                }
                let skip = usize::from(Self::take_one(&self.omit_first_input));
                let mut summary = Summary::text(format!("{} files", inputs.len()));
                for input in inputs.iter().skip(skip) {
                    summary.per_input.insert(
                        input.path.clone(),
                        format!("{} ({} chars)", input.path, input.text.chars().count()),
                    );
                }
                Ok(summary)
            }
            SummaryContext::Directory { directory, .. } => {
                if self.fail_merges.contains(directory) {
                    return Err(OracleError::permanent(format!(
                        "refused merge of {}",
                        display_dir(directory)
                    )));
                }
                let parts: Vec<String> = inputs
                    .iter()
                    .map(|i| {
                        let tag = match i.kind {
                            InputKind::File => "raw",
                            InputKind::FileSummary => "file",
                            InputKind::DirectorySummary => "dir",
                        };
                        format!("[{} {}: {}]", tag, i.path, i.text)
                    })
                    .collect();
                Ok(Summary::text(format!(
                    "{} <- {}",
                    display_dir(directory),
                    parts.join(" ")
                )))
            }
        }
    }
}

#[async_trait]
impl SummarizationOracle for MockSummarizer {
    async fn summarize(
        &self,
        context: &SummaryContext,
        inputs: &[SummaryInput],
    ) -> OracleResult<Summary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.answer(context, inputs).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
