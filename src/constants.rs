//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Pipeline limits
pub mod pipeline {
    /// Maximum exploration rounds
    pub const MAX_ITERATIONS: usize = 5;

    /// Maximum characters per batch
    pub const MAX_CHARS: usize = 200_000;

    /// Maximum files per batch
    pub const MAX_FILES: usize = 50;

    /// Maximum concurrent oracle calls during aggregation
    pub const CONCURRENCY_LIMIT: usize = 4;
}

/// Oracle retry constants
pub mod retry {
    /// Total attempts per oracle call (first try included)
    pub const MAX_ATTEMPTS: usize = 3;

    /// First backoff delay (milliseconds)
    pub const MIN_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;
}

/// Prepare stage constants
pub mod prepare {
    /// Maximum file size to load (1MB)
    pub const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Bytes inspected for NUL when detecting binary files
    pub const BINARY_SNIFF_BYTES: usize = 512;

    /// Content at or below this length is never flagged as encoded data
    pub const ENCODED_MIN_CONTENT: usize = 1000;

    /// Minimum run length of base64/hex characters to count as encoded
    pub const ENCODED_RUN: usize = 500;

    /// Minimum count of `\xNN` escapes to count as encoded
    pub const ENCODED_ESCAPES: usize = 50;

    /// Files above this size get a statistics sample
    pub const SAMPLE_SIZE_THRESHOLD: usize = 10 * 1024;

    /// Chunks per statistics sample
    pub const SAMPLE_CHUNKS: usize = 5;

    /// Lines per sample chunk
    pub const SAMPLE_CHUNK_LINES: usize = 5;

    /// Longest sampled line before truncation
    pub const SAMPLE_LINE_CHARS: usize = 200;

    /// Directories skipped by default
    pub const DEFAULT_SKIP_DIRS: &[&str] = &[
        "node_modules",
        "target",
        ".git",
        "build",
        "dist",
        "__pycache__",
        "vendor",
        ".venv",
    ];
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Default generation limit per request
    pub const DEFAULT_MAX_TOKENS: usize = 4096;
}

/// Store constants
pub mod store {
    /// Default database file inside the project directory
    pub const DATABASE_FILE: &str = "artifacts.db";

    /// Maximum pooled SQLite connections
    pub const MAX_POOL_SIZE: u32 = 8;
}
