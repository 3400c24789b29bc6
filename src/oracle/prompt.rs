//! Prompt Builder System
//!
//! Standardized prompt construction for the LLM-backed oracles. Wording is
//! deliberately short and structural; the pipeline does not depend on it.

use super::{InputKind, SelectionContext, SummaryContext, SummaryInput};
use crate::types::{ExplorationRound, display_dir};

/// Prompt section types
#[derive(Debug, Clone)]
enum PromptSection {
    Role { expertise: String, task: String },
    Objectives(Vec<String>),
    /// Ordered key-value pairs
    Context(Vec<(String, String)>),
    Text {
        header: Option<String>,
        content: String,
    },
    Code { language: String, content: String },
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives(mut self, objectives: &[&str]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|o| o.to_string()).collect(),
        ));
        self
    }

    /// Add a context item to the (single) context section
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        for section in &mut self.sections {
            if let PromptSection::Context(items) = section {
                items.push((key.to_string(), value.to_string()));
                return self;
            }
        }
        self.sections.push(PromptSection::Context(vec![(
            key.to_string(),
            value.to_string(),
        )]));
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(items) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

// =============================================================================
// Templates
// =============================================================================

fn render_history(history: &[ExplorationRound]) -> String {
    if history.is_empty() {
        return "(no files examined yet)".to_string();
    }
    history
        .iter()
        .map(|round| {
            let files = round
                .selected_files
                .iter()
                .map(|f| f.path.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "## Round {}\nFiles: {}\n\n{}",
                round.iteration_index, files, round.oracle_summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_hints(hints: &[String]) -> String {
    if hints.is_empty() {
        "(none)".to_string()
    } else {
        hints.join("; ")
    }
}

fn language_for(path: &str) -> &str {
    path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Prompt for choosing the next files to read
pub fn selection(context: &SelectionContext, candidates: &[String]) -> String {
    PromptBuilder::new()
        .role(
            "software architect",
            "exploring unfamiliar codebases efficiently",
        )
        .objectives(&[
            "Pick the few files that best explain what this project is and how it is organized",
            "Only pick paths from the candidate list",
            "Set `continue` to false once the project is understood well enough to describe it",
        ])
        .context_item("Project", &context.project)
        .context_item(
            "Round",
            &format!("{} of {}", context.iteration, context.max_iterations),
        )
        .context_item("Hints", &render_hints(&context.hints))
        .section("File Tree", &context.file_tree)
        .section("Findings So Far", &render_history(&context.history))
        .section("Candidates", &candidates.join("\n"))
        .build()
}

/// Prompt for any summarization call
pub fn summarization(context: &SummaryContext, inputs: &[SummaryInput]) -> String {
    let builder = match context {
        SummaryContext::Exploration {
            project,
            file_tree,
            hints,
            history,
            iteration,
        } => PromptBuilder::new()
            .role("software architect", "describing codebases")
            .objectives(&[
                "Describe what the files below reveal about the project's purpose and structure",
                "Build on earlier findings instead of repeating them",
            ])
            .context_item("Project", project)
            .context_item("Round", &iteration.to_string())
            .context_item("Hints", &render_hints(hints))
            .section("File Tree", file_tree)
            .section("Findings So Far", &render_history(history)),
        SummaryContext::FileBatch {
            project,
            directory,
            overview,
        } => PromptBuilder::new()
            .role("code documentation assistant", "documenting source files")
            .objectives(&[
                "Summarize each file: what it does and how it fits the project",
                "Return exactly one entry per file path, using the path verbatim",
            ])
            .context_item("Project", project)
            .context_item("Directory", display_dir(directory))
            .section("Project Overview", overview),
        SummaryContext::Directory {
            project,
            directory,
            overview,
        } => PromptBuilder::new()
            .role("technical writer", "synthesizing module documentation")
            .objectives(&[
                "Describe this directory as a whole from the summaries of its direct children",
                "Explain how the children relate to each other",
            ])
            .context_item("Project", project)
            .context_item("Directory", display_dir(directory))
            .section("Project Overview", overview),
    };

    let mut builder = builder;
    for input in inputs {
        builder = match input.kind {
            InputKind::File => builder
                .text(&format!("## File: {}", input.path))
                .code(language_for(&input.path), &input.text),
            InputKind::FileSummary => {
                builder.section(&format!("File Summary: {}", input.path), &input.text)
            }
            InputKind::DirectorySummary => builder.section(
                &format!("Directory Summary: {}", display_dir(&input.path)),
                &input.text,
            ),
        };
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileInfo;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptBuilder::new()
            .role("code analyst", "Rust documentation")
            .objectives(&["Analyze code", "Generate docs"])
            .context_item("Project", "demo")
            .context_item("Language", "Rust")
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("1. Analyze code"));
        assert!(prompt.contains("2. Generate docs"));
        // Context items keep insertion order in a single section
        let project = prompt.find("**Project**: demo").unwrap();
        let language = prompt.find("**Language**: Rust").unwrap();
        assert!(project < language);
        assert_eq!(prompt.matches("# Context").count(), 1);
    }

    #[test]
    fn test_selection_prompt_lists_candidates_and_history() {
        let context = SelectionContext {
            project: "demo".into(),
            file_tree: "src/\n└── main.rs".into(),
            hints: vec!["cli tool".into()],
            history: vec![ExplorationRound {
                iteration_index: 1,
                selected_files: vec![FileInfo::new("README.md", "entry point")],
                oracle_summary: "A demo CLI.".into(),
                continue_exploring: true,
            }],
            iteration: 2,
            max_iterations: 5,
        };
        let prompt = selection(&context, &["src/main.rs".to_string()]);
        assert!(prompt.contains("2 of 5"));
        assert!(prompt.contains("Files: README.md"));
        assert!(prompt.contains("src/main.rs"));
        assert!(prompt.contains("cli tool"));
    }

    #[test]
    fn test_file_batch_prompt_embeds_code() {
        let context = SummaryContext::FileBatch {
            project: "demo".into(),
            directory: String::new(),
            overview: "A demo".into(),
        };
        let prompt = summarization(&context, &[SummaryInput::file("main.rs", "fn main() {}")]);
        assert!(prompt.contains("**Directory**: ."));
        assert!(prompt.contains("## File: main.rs"));
        assert!(prompt.contains("```rs\nfn main() {}\n```"));
    }
}
