//! Unified diffs of what an operation does to each text file.

use std::path::PathBuf;

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

/// How a file fares under the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// New file.
    Created,
    /// Existing file rewritten.
    Modified,
    /// File removed.
    Deleted,
}

/// Before/after diff of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    /// Absolute path.
    pub path: PathBuf,
    /// Outcome for the file.
    pub status: FileStatus,
    /// Grouped line diff; empty for binary files.
    pub diff: String,
}

/// Line diff with three lines of context, groups separated by `...`.
pub fn unified_diff(original: &str, modified: &str) -> String {
    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                output.push_str(sign);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
            }
        }
    }

    output
}
