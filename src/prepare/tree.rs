//! Directory tree of the prepared sources with cumulative sizes

use std::collections::BTreeMap;

use crate::types::SourceFile;

#[derive(Debug, Default)]
struct DirEntry {
    dirs: BTreeMap<String, DirEntry>,
    files: BTreeMap<String, usize>,
    bytes: usize,
}

enum Entry<'a> {
    Dir(&'a str, &'a DirEntry),
    File(&'a str, usize),
}

impl Entry<'_> {
    fn name(&self) -> &str {
        match self {
            Entry::Dir(name, _) | Entry::File(name, _) => name,
        }
    }
}

/// Directory tree of the loaded sources with cumulative UTF-8 sizes
#[derive(Debug, Default)]
pub struct FileTree {
    root: DirEntry,
}

impl FileTree {
    pub fn new(files: &[SourceFile]) -> Self {
        let mut root = DirEntry::default();
        for file in files {
            let bytes = file.byte_len();
            let mut node = &mut root;
            node.bytes += bytes;

            let mut parts = file.path.split('/').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_none() {
                    node.files.insert(part.to_string(), bytes);
                } else {
                    node = node.dirs.entry(part.to_string()).or_default();
                    node.bytes += bytes;
                }
            }
        }
        Self { root }
    }

    pub fn total_bytes(&self) -> usize {
        self.root.bytes
    }

    /// Box-drawing rendering; entries sorted by name, directories marked `/`
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        render_dir(&self.root, "", &mut lines);
        lines.join("\n")
    }
}

fn render_dir(dir: &DirEntry, prefix: &str, lines: &mut Vec<String>) {
    let mut entries: Vec<Entry<'_>> = dir
        .dirs
        .iter()
        .map(|(name, d)| Entry::Dir(name.as_str(), d))
        .chain(dir.files.iter().map(|(name, &bytes)| Entry::File(name.as_str(), bytes)))
        .collect();
    entries.sort_by(|a, b| a.name().cmp(b.name()));

    let last = entries.len().saturating_sub(1);
    for (i, entry) in entries.iter().enumerate() {
        let (branch, indent) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        match entry {
            Entry::Dir(name, sub) => {
                lines.push(format!("{}{}{}/ ({} bytes)", prefix, branch, name, sub.bytes));
                render_dir(sub, &format!("{}{}", prefix, indent), lines);
            }
            Entry::File(name, bytes) => {
                lines.push(format!("{}{}{} ({} bytes)", prefix, branch, name, bytes));
            }
        }
    }
}
