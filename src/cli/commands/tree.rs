//! Tree Command
//!
//! Shows what the Prepare stage would load, without calling any model.
//!
//! Usage:
//!   docloom tree [PATH] [--stats]

use std::path::PathBuf;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::prepare::{
    FileFilter, FileTree, SourceScanner, apply_filters, file_statistics, format_size,
    has_likely_encoded_data,
};
use crate::types::Result;

pub fn run(path: Option<PathBuf>, stats: bool) -> Result<()> {
    let context = CommandContext::load(path)?;
    let prepare = &context.config.prepare;
    let out = Output::new();

    let scanned = SourceScanner::from_config(&context.root, prepare)?.scan()?;
    let mut files = apply_filters(scanned, &FileFilter::from_config(prepare))?;
    let before = files.len();
    if prepare.skip_encoded {
        files.retain(|f| !has_likely_encoded_data(&f.content));
    }

    let tree = FileTree::new(&files);
    println!("{}", context.project_name());
    println!("{}", tree.render());

    out.header("Totals");
    out.field("Files", files.len());
    out.field("Size", format_size(tree.total_bytes() as u64));
    if before > files.len() {
        out.field("Encoded", format!("{} skipped", before - files.len()));
    }

    if stats {
        let notable = file_statistics(&files);
        if !notable.is_empty() {
            out.header("Large or encoded files");
            for (path, (size, sample)) in notable {
                out.item(&format!("{} ({})", path, size));
                for line in sample.lines() {
                    println!("      {}", line);
                }
            }
        }
    }
    Ok(())
}
