//! Source filtering and content heuristics

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::scanner::compile_patterns;
use crate::config::PrepareConfig;
use crate::constants::prepare;
use crate::types::{Result, SourceFile};

static BASE64_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[A-Za-z0-9+/]{{{},}}", prepare::ENCODED_RUN + 1))
        .expect("base64 run pattern is valid")
});

static HEX_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[0-9a-fA-F]{{{},}}", prepare::ENCODED_RUN + 1))
        .expect("hex run pattern is valid")
});

static HEX_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\x[0-9a-fA-F]{2}").expect("escape pattern is valid"));

/// Which files to drop before exploration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    /// Why these exclusions were chosen
    pub reasoning: String,
    /// Glob patterns matched against repo-relative paths
    pub exclude_patterns: Vec<String>,
    /// Directory names excluded at any depth
    pub exclude_directories: Vec<String>,
    /// Exact repo-relative paths
    pub exclude_specific_files: Vec<String>,
}

impl FileFilter {
    pub fn from_config(config: &PrepareConfig) -> Self {
        Self {
            reasoning: "configured exclusions".to_string(),
            exclude_patterns: config.exclude.clone(),
            exclude_directories: config.exclude_directories.clone(),
            exclude_specific_files: config.exclude_files.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exclude_patterns.is_empty()
            && self.exclude_directories.is_empty()
            && self.exclude_specific_files.is_empty()
    }
}

/// Drop every file the filter excludes, keeping order
pub fn apply_filters(files: Vec<SourceFile>, filter: &FileFilter) -> Result<Vec<SourceFile>> {
    if filter.is_empty() {
        return Ok(files);
    }
    let patterns = compile_patterns(&filter.exclude_patterns)?;

    let before = files.len();
    let kept: Vec<SourceFile> = files
        .into_iter()
        .filter(|file| {
            let path = file.path.as_str();
            let by_pattern = patterns.iter().any(|p| p.matches(path));
            let by_directory = path
                .rsplit_once('/')
                .is_some_and(|(dir, _)| {
                    dir.split('/')
                        .any(|part| filter.exclude_directories.iter().any(|d| d == part))
                });
            let by_name = filter.exclude_specific_files.iter().any(|f| f == path);
            !(by_pattern || by_directory || by_name)
        })
        .collect();

    tracing::debug!(
        reason = %filter.reasoning,
        removed = before - kept.len(),
        kept = kept.len(),
        "Applied file filter"
    );
    Ok(kept)
}

/// Heuristic for embedded blobs (base64, hex dumps, escaped bytes).
///
/// Short content is never flagged.
pub fn has_likely_encoded_data(content: &str) -> bool {
    if content.chars().count() <= prepare::ENCODED_MIN_CONTENT {
        return false;
    }
    BASE64_RUN.is_match(content)
        || HEX_RUN.is_match(content)
        || HEX_ESCAPE.find_iter(content).count() >= prepare::ENCODED_ESCAPES
}

/// Human-readable byte size with one decimal
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let size = bytes as f64;
    if size < KB {
        format!("{:.1}B", size)
    } else if size < MB {
        format!("{:.1}KB", size / KB)
    } else {
        format!("{:.1}MB", size / MB)
    }
}

/// Size and content sample for every large or blob-like file.
///
/// Samples are evenly spaced chunks, each headed `// Lines a-b` (1-based,
/// inclusive). Long lines are truncated.
pub fn file_statistics(files: &[SourceFile]) -> BTreeMap<String, (String, String)> {
    files
        .iter()
        .filter(|f| f.byte_len() > prepare::SAMPLE_SIZE_THRESHOLD || has_likely_encoded_data(&f.content))
        .map(|f| {
            (
                f.path.clone(),
                (format_size(f.byte_len() as u64), sample(&f.content)),
            )
        })
        .collect()
}

fn sample(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let chunk = prepare::SAMPLE_CHUNK_LINES;
    let chunks = prepare::SAMPLE_CHUNKS;

    let starts: Vec<usize> = if lines.len() <= chunk * chunks {
        vec![0]
    } else {
        let span = lines.len() - chunk;
        (0..chunks).map(|i| i * span / (chunks - 1)).collect()
    };
    let len = if starts.len() == 1 { lines.len() } else { chunk };

    let mut out = Vec::new();
    for start in starts {
        let end = (start + len).min(lines.len());
        out.push(format!("// Lines {}-{}", start + 1, end));
        for line in &lines[start..end] {
            out.push(truncate_line(line));
        }
    }
    out.join("\n")
}

fn truncate_line(line: &str) -> String {
    match line.char_indices().nth(prepare::SAMPLE_LINE_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}
