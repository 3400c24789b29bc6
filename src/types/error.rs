//! Unified Error Type System
//!
//! Centralized error types for the whole pipeline. Oracle failures carry an
//! [`ErrorCategory`] so call sites can decide between retrying (transient)
//! and propagating (permanent).
//!
//! ## Error Categories
//!
//! - **Transient**: rate limits, network trouble, server hiccups, unparsable
//!   responses. Retried with bounded attempts at the call site.
//! - **Permanent**: auth failures, malformed requests, unavailable backends.
//!   Never retried, propagated to the enclosing stage.

use std::time::Duration;
use thiserror::Error;

use super::artifact::Stage;

// =============================================================================
// Error Categories
// =============================================================================

/// Oracle error categories for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Context/token limit exceeded - the request itself is too large
    TokenLimit,
    /// Authentication failed - fail fast
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Backend unavailable or missing
    Unavailable,
    /// Invalid request - don't retry
    BadRequest,
    /// Response could not be parsed or was incomplete - may succeed on retry
    ParseError,
    /// Temporary server issues
    Transient,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::ParseError
        )
    }
}

// =============================================================================
// Oracle Error
// =============================================================================

/// Failure reported by a summarization or selection oracle
#[derive(Debug, Clone)]
pub struct OracleError {
    /// Error category for retry decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for OracleError {}

impl OracleError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    /// Retryable failure (network/rate-limit-like)
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transient, message)
    }

    /// Non-retryable failure (malformed or refused request)
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::BadRequest, message)
    }

    /// Response was received but is unusable (missing fields, omitted inputs)
    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ParseError, message)
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw provider failures onto error categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> OracleError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return OracleError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30));
        }

        if lower.contains("token")
            && (lower.contains("limit") || lower.contains("exceed") || lower.contains("maximum"))
            || lower.contains("context length")
            || lower.contains("too large")
        {
            return OracleError::with_provider(ErrorCategory::TokenLimit, message, provider);
        }

        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return OracleError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
        {
            return OracleError::with_provider(ErrorCategory::Network, message, provider)
                .retry_after(Duration::from_secs(5));
        }

        if lower.contains("502")
            || lower.contains("503")
            || lower.contains("504")
            || lower.contains("overloaded")
            || lower.contains("temporary")
        {
            return OracleError::with_provider(ErrorCategory::Transient, message, provider)
                .retry_after(Duration::from_secs(2));
        }

        if lower.contains("400") || lower.contains("bad request") || lower.contains("malformed") {
            return OracleError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        if lower.contains("parse") || lower.contains("json") || lower.contains("unexpected token")
        {
            return OracleError::with_provider(ErrorCategory::ParseError, message, provider)
                .retry_after(Duration::from_secs(1));
        }

        if lower.contains("not found") || lower.contains("unavailable") {
            return OracleError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        OracleError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> OracleError {
        match status {
            429 => OracleError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => OracleError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 422 => OracleError::with_provider(ErrorCategory::BadRequest, message, provider),
            404 => OracleError::with_provider(ErrorCategory::Unavailable, message, provider),
            500 | 502 | 503 | 504 => {
                OracleError::with_provider(ErrorCategory::Transient, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            _ => OracleError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum DocError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------
    /// Invalid limits or settings. Fatal, reported immediately.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // -------------------------------------------------------------------------
    // Oracle Errors
    // -------------------------------------------------------------------------
    #[error("Oracle error: {0}")]
    Oracle(OracleError),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// The exploration loop could not complete a round after retries
    #[error("Exploration failed in round {round}: {source}")]
    ExplorationFailed {
        round: usize,
        #[source]
        source: Box<DocError>,
    },

    /// The root directory could not be summarized
    #[error("Aggregation failed: root summary unavailable ({} failed paths)", failed_paths.len())]
    AggregationFailed { failed_paths: Vec<String> },

    /// A stage's declared inputs or outputs did not match the store
    #[error("Contract violation in {stage} stage: {message}")]
    ContractViolation { stage: Stage, message: String },

    /// A stage failed; wraps the underlying cause
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<DocError>,
    },

    #[error("Run cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<OracleError> for DocError {
    fn from(err: OracleError) -> Self {
        DocError::Oracle(err)
    }
}

pub type Result<T> = std::result::Result<T, DocError>;

impl DocError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap an error as the failure of a pipeline stage
    pub fn stage(stage: Stage, source: DocError) -> Self {
        match source {
            // Keep the innermost stage; cancellation stays recognizable
            already @ (Self::StageFailed { .. } | Self::Cancelled) => already,
            other => Self::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Check if this error may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Oracle(e) => e.is_transient(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// =============================================================================
// Tests
// =============================================================================
