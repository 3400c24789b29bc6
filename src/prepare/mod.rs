//! Source preparation
//!
//! Everything the pipeline needs before the first oracle call: loading the
//! project's text files, dropping excluded and blob-like ones, and rendering
//! the directory tree handed to the exploration loop.

mod filter;
mod scanner;
mod tree;

pub use filter::{FileFilter, apply_filters, file_statistics, format_size, has_likely_encoded_data};
pub use scanner::SourceScanner;
pub use tree::FileTree;
