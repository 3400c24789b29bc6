//! Documentation pipeline
//!
//! - [`partition`]: order-preserving batches within per-call limits
//! - [`explore`]: iterative exploration producing the initial description
//! - [`aggregate`]: bottom-up hierarchical summarization
//! - [`stages`] / [`controller`]: stage contracts and sequencing

pub mod aggregate;
pub mod controller;
pub mod explore;
pub mod partition;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{AggregationContext, Aggregator};
pub use controller::{PipelineController, PipelineReport};
pub use explore::{ExplorationLoop, ExplorationSeed};
pub use partition::{Batch, BatchLimits, BatchStats, partition};
pub use stages::{
    DocumentStage, ExploreStage, PipelineStage, PrepareStage, StageContext, project_name,
};
