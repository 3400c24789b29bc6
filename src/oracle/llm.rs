//! LLM-backed oracles
//!
//! Thin adapters: render a prompt, ask the provider for JSON matching a
//! fixed schema, and turn the JSON into a [`Summary`] or [`Selection`].
//! Shape problems in the response are `incomplete` (retryable) errors.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    OracleResult, Selection, SelectionContext, SelectionOracle, SummarizationOracle, Summary,
    SummaryContext, SummaryInput, prompt,
};
use crate::ai::provider::SharedProvider;
use crate::types::{DocError, ErrorCategory, FileInfo, OracleError};

fn summary_schema(per_input: bool) -> Value {
    if per_input {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"},
                "files": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": {"type": "string"},
                            "summary": {"type": "string"}
                        },
                        "required": ["path", "summary"]
                    }
                }
            },
            "required": ["summary", "files"]
        })
    } else {
        json!({
            "type": "object",
            "properties": {"summary": {"type": "string"}},
            "required": ["summary"]
        })
    }
}

fn selection_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "files": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "rationale": {"type": "string"}
                    },
                    "required": ["path"]
                }
            },
            "continue": {"type": "boolean"}
        },
        "required": ["files", "continue"]
    })
}

/// Unwrap provider failures back into oracle errors
fn into_oracle_error(err: DocError, provider: &str) -> OracleError {
    match err {
        DocError::Oracle(e) => e,
        other => OracleError::with_provider(ErrorCategory::Unknown, other.to_string(), provider),
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Summarization oracle backed by an LLM provider
pub struct LlmSummarizer {
    provider: SharedProvider,
}

impl LlmSummarizer {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    fn parse(&self, content: &Value, per_input: bool) -> OracleResult<Summary> {
        let text = str_field(content, "summary")
            .ok_or_else(|| OracleError::incomplete("Response is missing `summary`"))?;

        let mut summary = Summary::text(text.trim());
        if per_input {
            let files = content
                .get("files")
                .and_then(Value::as_array)
                .ok_or_else(|| OracleError::incomplete("Response is missing `files`"))?;
            for entry in files {
                if let (Some(path), Some(text)) = (str_field(entry, "path"), str_field(entry, "summary"))
                {
                    summary
                        .per_input
                        .insert(path.trim().to_string(), text.trim().to_string());
                }
            }
        }
        Ok(summary)
    }
}

#[async_trait]
impl SummarizationOracle for LlmSummarizer {
    async fn summarize(
        &self,
        context: &SummaryContext,
        inputs: &[SummaryInput],
    ) -> OracleResult<Summary> {
        let per_input = context.expects_per_input();
        let prompt = prompt::summarization(context, inputs);
        debug!(call = %context.label(), inputs = inputs.len(), "Summarizing");

        let response = self
            .provider
            .generate(&prompt, &summary_schema(per_input))
            .await
            .map_err(|e| into_oracle_error(e, self.provider.name()))?;

        self.parse(&response.content, per_input)
    }
}

/// Selection oracle backed by an LLM provider
pub struct LlmSelector {
    provider: SharedProvider,
}

impl LlmSelector {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    fn parse(&self, content: &Value) -> OracleResult<Selection> {
        let files = content
            .get("files")
            .and_then(Value::as_array)
            .ok_or_else(|| OracleError::incomplete("Response is missing `files`"))?;

        let chosen = files
            .iter()
            .filter_map(|entry| match entry {
                // Some models answer with bare paths
                Value::String(path) => Some(FileInfo::new(path.trim(), "")),
                _ => str_field(entry, "path").map(|path| {
                    FileInfo::new(path.trim(), str_field(entry, "rationale").unwrap_or(""))
                }),
            })
            .collect();

        let continue_exploring = content
            .get("continue")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Selection {
            chosen,
            continue_exploring,
        })
    }
}

#[async_trait]
impl SelectionOracle for LlmSelector {
    async fn select(
        &self,
        context: &SelectionContext,
        candidates: &[String],
    ) -> OracleResult<Selection> {
        let prompt = prompt::selection(context, candidates);
        debug!(round = context.iteration, candidates = candidates.len(), "Selecting files");

        let response = self
            .provider
            .generate(&prompt, &selection_schema())
            .await
            .map_err(|e| into_oracle_error(e, self.provider.name()))?;

        self.parse(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{LlmProvider, LlmResponse};
    use crate::types::Result;
    use std::sync::{Arc, Mutex};

    /// Replays canned responses and records prompts
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<Value>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<Value>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, prompt: &str, _schema: &Value) -> Result<LlmResponse> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.responses.lock().unwrap().remove(0);
            next.map(LlmResponse::content_only)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn batch_context() -> SummaryContext {
        SummaryContext::FileBatch {
            project: "demo".into(),
            directory: "src".into(),
            overview: "A demo".into(),
        }
    }

    #[tokio::test]
    async fn test_file_batch_parses_per_input() {
        let provider = ScriptedProvider::new(vec![Ok(json!({
            "summary": "two files",
            "files": [
                {"path": "src/a.rs", "summary": " does a "},
                {"path": "src/b.rs", "summary": "does b"}
            ]
        }))]);
        let oracle = LlmSummarizer::new(provider.clone());
        let inputs = vec![
            SummaryInput::file("src/a.rs", "fn a() {}"),
            SummaryInput::file("src/b.rs", "fn b() {}"),
        ];

        let summary = oracle.summarize(&batch_context(), &inputs).await.unwrap();
        assert_eq!(summary.text, "two files");
        assert_eq!(summary.per_input["src/a.rs"], "does a");
        assert!(summary.missing_inputs(&inputs).is_empty());
        assert!(provider.prompts.lock().unwrap()[0].contains("## File: src/a.rs"));
    }

    #[tokio::test]
    async fn test_missing_summary_is_incomplete() {
        let provider = ScriptedProvider::new(vec![Ok(json!({"files": []}))]);
        let oracle = LlmSummarizer::new(provider);
        let err = oracle.summarize(&batch_context(), &[]).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::ParseError);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_provider_errors_keep_category() {
        let provider = ScriptedProvider::new(vec![Err(OracleError::with_provider(
            ErrorCategory::Auth,
            "401 unauthorized",
            "scripted",
        )
        .into())]);
        let oracle = LlmSummarizer::new(provider);
        let err = oracle.summarize(&batch_context(), &[]).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Auth);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_selection_parsing() {
        let provider = ScriptedProvider::new(vec![Ok(json!({
            "files": [
                {"path": "README.md", "rationale": "overview"},
                "src/main.rs",
                {"rationale": "no path"}
            ],
            "continue": true
        }))]);
        let oracle = LlmSelector::new(provider);
        let context = SelectionContext {
            project: "demo".into(),
            file_tree: String::new(),
            hints: vec![],
            history: vec![],
            iteration: 1,
            max_iterations: 5,
        };

        let selection = oracle
            .select(&context, &["README.md".into(), "src/main.rs".into()])
            .await
            .unwrap();
        assert!(selection.continue_exploring);
        let paths: Vec<_> = selection.chosen.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/main.rs"]);
        assert_eq!(selection.chosen[0].rationale, "overview");
    }
}
