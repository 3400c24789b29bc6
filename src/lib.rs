//! docloom - AI-Driven Codebase Documentation Generator
//!
//! Documents an arbitrary codebase in three stages: load and filter the
//! sources, explore them iteratively to build an initial description, then
//! summarize every file and fold the summaries upward into a hierarchical
//! document tree.
//!
//! ## Core Features
//!
//! - **Iterative Exploration**: a selection oracle picks what to read next
//!   under a fixed per-call budget, until it stops or the cap is hit
//! - **Hierarchical Aggregation**: concurrent, order-independent bottom-up
//!   summarization with partial-failure containment
//! - **Artifact Contracts**: every stage declares what it reads and writes;
//!   artifacts persist in SQLite or memory
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use docloom::{Config, LlmSelector, LlmSummarizer, MemoryStore, PipelineController};
//!
//! let config = Config::default();
//! let provider = docloom::ai::create_provider(&config.llm)?;
//! let controller = PipelineController::standard(
//!     &project_path,
//!     &config,
//!     Arc::new(LlmSelector::new(provider.clone())),
//!     Arc::new(LlmSummarizer::new(provider)),
//!     Arc::new(MemoryStore::new()),
//! )?;
//! let report = controller.run().await?;
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: partitioner, exploration loop, aggregator, controller
//! - [`oracle`]: oracle interfaces, retry, LLM-backed oracles
//! - [`ai`]: LLM provider abstraction
//! - [`prepare`]: source scanning, filtering, file tree
//! - [`store`]: artifact persistence
//! - [`config`]: configuration and loading

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod oracle;
pub mod pipeline;
pub mod prepare;
pub mod store;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, PipelineConfig};

// Error Types
pub use types::{DocError, ErrorCategory, OracleError, Result};

// Data Model
pub use types::{
    CodebaseDocumentation, DirectorySummary, FileInfo, FileSummary, InitialDescription,
    SourceFile, StopReason,
};

// Storage
pub use store::{ArtifactStore, ArtifactStoreExt, MemoryStore, SharedStore, SqliteStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    Aggregator, ExplorationLoop, PipelineController, PipelineReport, PipelineStage,
};

// =============================================================================
// Oracle Re-exports
// =============================================================================

pub use oracle::{
    LlmSelector, LlmSummarizer, SelectionOracle, SharedSelector, SharedSummarizer,
    SummarizationOracle,
};
