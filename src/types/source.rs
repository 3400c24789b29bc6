//! Source files and selection records

use serde::{Deserialize, Serialize};

/// A loaded source file. `path` is repo-relative and unique.
///
/// `size` counts characters, the unit batch limits are expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    pub size: usize,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let size = content.chars().count();
        Self {
            path: path.into(),
            content,
            size,
        }
    }

    /// UTF-8 size of the content
    pub fn byte_len(&self) -> usize {
        self.content.len()
    }

    /// Immediate parent directory ("" for top-level files)
    pub fn directory(&self) -> &str {
        parent_dir(&self.path)
    }
}

/// A file chosen for exploration, with the reason it was chosen
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub rationale: String,
}

impl FileInfo {
    pub fn new(path: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rationale: rationale.into(),
        }
    }
}

/// Parent directory of a repo-relative path ("" at the top level)
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Display form of a directory path
pub fn display_dir(path: &str) -> &str {
    if path.is_empty() { "." } else { path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_counts_chars() {
        let file = SourceFile::new("unicode.txt", "café");
        assert_eq!(file.size, 4);
        assert_eq!(file.byte_len(), 5);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("main.rs"), "");
        assert_eq!(parent_dir("src/main.rs"), "src");
        assert_eq!(parent_dir("a/b/c.rs"), "a/b");
        assert_eq!(SourceFile::new("a/b/c.rs", "").directory(), "a/b");
        assert_eq!(display_dir(""), ".");
        assert_eq!(display_dir("src"), "src");
    }
}
