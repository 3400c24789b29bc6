//! AI Integration Layer
//!
//! LLM providers used by the oracle implementations in [`crate::oracle`].

pub mod provider;

pub use provider::{
    LlmProvider, LlmResponse, OpenAiProvider, SharedProvider, TokenUsage, create_provider,
};
