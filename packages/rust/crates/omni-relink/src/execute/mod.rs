//! Applying a change set to disk, or simulating it.
//!
//! Per file the executor builds the final text in memory (base content plus
//! spliced link updates) and writes it once; deletions run last. The first
//! failure halts the run. Nothing is rolled back: the result lists exactly
//! the changes that landed.

mod preview;
mod sink;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::corpus::Corpus;
use crate::error::ExecutionError;
use crate::plan::{Change, ChangeSet, ContentSource, OperationKind};

pub use preview::{FilePreview, FileStatus, unified_diff};
pub use sink::{ChangeSink, DiskSink, MemorySink};

/// Outcome of one `execute` call.
#[derive(Debug)]
pub struct OperationResult {
    /// Operation that was applied.
    pub operation: OperationKind,
    /// Whether every change was applied.
    pub success: bool,
    /// Nothing touched disk.
    pub dry_run: bool,
    /// Existing files rewritten.
    pub modified_files: BTreeSet<PathBuf>,
    /// Files that did not exist before.
    pub created_files: BTreeSet<PathBuf>,
    /// Files removed.
    pub deleted_files: BTreeSet<PathBuf>,
    /// Changes applied, or simulated in dry-run, in order.
    pub changes: Vec<Change>,
    /// Failures; at most one, since the first one halts.
    pub errors: Vec<ExecutionError>,
    snapshot: Arc<Corpus>,
}

/// Serializable digest of an [`OperationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSummary {
    /// Operation kind.
    pub operation: OperationKind,
    /// Whether every change was applied.
    pub success: bool,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Created files.
    pub created_files: Vec<PathBuf>,
    /// Modified files.
    pub modified_files: Vec<PathBuf>,
    /// Deleted files.
    pub deleted_files: Vec<PathBuf>,
    /// Number of changes applied.
    pub changes: usize,
    /// Rendered execution errors.
    pub errors: Vec<String>,
}

impl OperationResult {
    fn new(operation: OperationKind, dry_run: bool, snapshot: Arc<Corpus>) -> Self {
        Self {
            operation,
            success: true,
            dry_run,
            modified_files: BTreeSet::new(),
            created_files: BTreeSet::new(),
            deleted_files: BTreeSet::new(),
            changes: Vec::new(),
            errors: Vec::new(),
            snapshot,
        }
    }

    /// Snapshot the change set was planned against.
    #[must_use]
    pub const fn snapshot(&self) -> &Arc<Corpus> {
        &self.snapshot
    }

    /// Created, modified and deleted files together.
    #[must_use]
    pub fn touched_files(&self) -> BTreeSet<PathBuf> {
        self.created_files
            .iter()
            .chain(&self.modified_files)
            .chain(&self.deleted_files)
            .cloned()
            .collect()
    }

    fn record(&mut self, change: &Change) {
        let path = change.path().to_path_buf();
        match change {
            Change::FileCreated { .. } => {
                self.modified_files.remove(&path);
                self.created_files.insert(path);
            }
            Change::FileModified { .. } | Change::LinkUpdated { .. } => {
                if !self.created_files.contains(&path) {
                    self.modified_files.insert(path);
                }
            }
            Change::FileDeleted { .. } => {
                self.deleted_files.insert(path);
            }
        }
        self.changes.push(change.clone());
    }

    fn fail(&mut self, error: ExecutionError) {
        tracing::error!(error = %error, "execution halted");
        self.success = false;
        self.errors.push(error);
    }

    /// Replay the recorded changes over the snapshot in memory.
    ///
    /// Assets are opaque in the snapshot, so copies of them come out empty.
    #[must_use]
    pub fn simulate(&self) -> MemorySink {
        let (sink, errors) = self.replay();
        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "replaying recorded changes failed");
        }
        sink
    }

    pub(crate) fn replay(&self) -> (MemorySink, Vec<ExecutionError>) {
        let mut sink = MemorySink::from_corpus(&self.snapshot);
        let replay = apply(
            &mut sink,
            &self.changes,
            self.operation,
            Arc::clone(&self.snapshot),
        );
        (sink, replay.errors)
    }

    /// Diff of every touched text file, before against after.
    #[must_use]
    pub fn previews(&self) -> Vec<FilePreview> {
        let after = self.simulate();
        self.touched_files()
            .into_iter()
            .filter_map(|path| {
                let before = self.snapshot.document(&path).map(|doc| doc.content.as_str());
                let (status, after_text) = if self.deleted_files.contains(&path) {
                    (FileStatus::Deleted, Some(""))
                } else if self.created_files.contains(&path) {
                    (FileStatus::Created, after.text(&path))
                } else {
                    (FileStatus::Modified, after.text(&path))
                };
                if before.is_none() && self.snapshot.is_asset(&path) {
                    return None;
                }
                let diff = unified_diff(before.unwrap_or_default(), after_text.unwrap_or_default());
                Some(FilePreview { path, status, diff })
            })
            .collect()
    }

    /// Serializable digest.
    #[must_use]
    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            operation: self.operation,
            success: self.success,
            dry_run: self.dry_run,
            created_files: self.created_files.iter().cloned().collect(),
            modified_files: self.modified_files.iter().cloned().collect(),
            deleted_files: self.deleted_files.iter().cloned().collect(),
            changes: self.changes.len(),
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Applies change sets through a [`ChangeSink`].
#[derive(Debug)]
pub struct Executor<S: ChangeSink> {
    sink: S,
}

impl<S: ChangeSink> Executor<S> {
    /// Executor writing to `sink`.
    pub const fn new(sink: S) -> Self {
        Self { sink }
    }

    /// The sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Take the sink back.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Apply `set`, or with `dry_run` only describe what would happen.
    pub fn execute(&mut self, set: &ChangeSet, dry_run: bool) -> OperationResult {
        if dry_run {
            let mut result =
                OperationResult::new(set.operation(), true, Arc::clone(set.snapshot()));
            for change in set.changes() {
                result.record(change);
            }
            tracing::info!(
                operation = ?set.operation(),
                changes = result.changes.len(),
                "dry run"
            );
            return result;
        }
        let result = apply(
            &mut self.sink,
            set.changes(),
            set.operation(),
            Arc::clone(set.snapshot()),
        );
        tracing::info!(
            operation = ?set.operation(),
            applied = result.changes.len(),
            planned = set.len(),
            success = result.success,
            "executed"
        );
        result
    }
}

/// Apply `set` to the file system below its snapshot root.
pub fn execute(set: &ChangeSet, dry_run: bool) -> OperationResult {
    Executor::new(DiskSink::new(set.snapshot().root())).execute(set, dry_run)
}

fn io_error(path: &Path, action: &'static str, source: omni_io::IoError) -> ExecutionError {
    ExecutionError::Io {
        path: path.to_path_buf(),
        action,
        source,
    }
}

fn apply<S: ChangeSink + ?Sized>(
    sink: &mut S,
    changes: &[Change],
    operation: OperationKind,
    snapshot: Arc<Corpus>,
) -> OperationResult {
    let mut result = OperationResult::new(operation, false, snapshot);

    // Copy sources that are overwritten in this run are read before anything is written.
    let written: BTreeSet<&Path> = changes
        .iter()
        .filter(|change| !matches!(change, Change::FileDeleted { .. }))
        .map(Change::path)
        .collect();
    let mut captured: HashMap<PathBuf, Vec<u8>> = HashMap::new();
    for change in changes {
        if let Change::FileCreated { content: ContentSource::CopyOf(from), .. }
        | Change::FileModified { content: ContentSource::CopyOf(from), .. } = change
            && written.contains(from.as_path())
            && !captured.contains_key(from)
        {
            match sink.read_bytes(from) {
                Ok(bytes) => {
                    captured.insert(from.clone(), bytes);
                }
                Err(source) => {
                    result.fail(io_error(from, "read", source));
                    return result;
                }
            }
        }
    }

    let mut index = 0;
    while index < changes.len() {
        let change = &changes[index];
        if let Change::FileDeleted { path } = change {
            if let Err(source) = sink.remove_file(path) {
                result.fail(io_error(path, "remove", source));
                return result;
            }
            result.record(change);
            index += 1;
            continue;
        }

        let path = change.path();
        let end = changes[index..]
            .iter()
            .position(|next| next.path() != path || matches!(next, Change::FileDeleted { .. }))
            .map_or(changes.len(), |offset| index + offset);
        let group = &changes[index..end];
        if let Err(error) = apply_file(sink, path, group, &captured) {
            result.fail(error);
            return result;
        }
        for change in group {
            result.record(change);
        }
        index = end;
    }
    result
}

/// Build one file's final content from its group of changes and write it once.
fn apply_file<S: ChangeSink + ?Sized>(
    sink: &mut S,
    path: &Path,
    group: &[Change],
    captured: &HashMap<PathBuf, Vec<u8>>,
) -> Result<(), ExecutionError> {
    let base = group.iter().find_map(|change| match change {
        Change::FileCreated { content, .. } | Change::FileModified { content, .. } => {
            Some(content)
        }
        _ => None,
    });
    let has_updates = group
        .iter()
        .any(|change| matches!(change, Change::LinkUpdated { .. }));

    let mut text = match base {
        Some(ContentSource::Text(text)) => text.clone(),
        Some(ContentSource::CopyOf(from)) => {
            let bytes = match captured.get(from) {
                Some(bytes) => bytes.clone(),
                None => sink
                    .read_bytes(from)
                    .map_err(|source| io_error(from, "copy", source))?,
            };
            if !has_updates {
                return sink
                    .write_bytes(path, &bytes)
                    .map_err(|source| io_error(path, "write", source));
            }
            omni_io::decode_text(&from.to_string_lossy(), bytes)
                .map_err(|source| io_error(from, "read", source))?
        }
        None if has_updates => sink
            .read_text(path)
            .map_err(|source| io_error(path, "read", source))?,
        None => return Err(ExecutionError::MissingBase(path.to_path_buf())),
    };

    for change in group {
        let Change::LinkUpdated {
            span,
            old_value,
            new_value,
            ..
        } = change
        else {
            continue;
        };
        match text.get(span.start..span.end) {
            Some(found) if found == old_value => {
                text.replace_range(span.start..span.end, new_value);
            }
            found => {
                return Err(ExecutionError::StaleContent {
                    path: path.to_path_buf(),
                    span: *span,
                    expected: old_value.clone(),
                    found: found.map_or_else(
                        || {
                            let bytes = text.as_bytes().get(span.start..span.end);
                            String::from_utf8_lossy(bytes.unwrap_or_default()).into_owned()
                        },
                        str::to_string,
                    ),
                });
            }
        }
    }

    sink.write_text(path, &text)
        .map_err(|source| io_error(path, "write", source))?;
    tracing::debug!(path = %path.display(), changes = group.len(), "wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Span;
    use crate::plan::{MoveOptions, Planner};

    fn corpus() -> Arc<Corpus> {
        Arc::new(Corpus::from_documents(
            "/c",
            [
                ("a.md", "# A\n\n[b](b.md#usage)\n"),
                ("b.md", "# B\n\n## Usage\n"),
            ],
        ))
    }

    #[test]
    fn test_move_applies_in_memory() -> Result<(), Box<dyn std::error::Error>> {
        let planner = Planner::new(corpus());
        let set = planner.plan_move(
            &[(PathBuf::from("b.md"), PathBuf::from("guide/b.md"))],
            &MoveOptions::default(),
        )?;
        let mut executor = Executor::new(MemorySink::from_corpus(planner.corpus()));
        let result = executor.execute(&set, false);
        assert!(result.success);
        assert_eq!(result.changes, set.changes());

        let sink = executor.into_sink();
        assert_eq!(
            sink.text(Path::new("/c/a.md")),
            Some("# A\n\n[b](guide/b.md#usage)\n")
        );
        assert!(!sink.contains(Path::new("/c/b.md")));
        assert!(result.created_files.contains(Path::new("/c/guide/b.md")));
        assert!(result.modified_files.contains(Path::new("/c/a.md")));
        assert!(result.deleted_files.contains(Path::new("/c/b.md")));
        Ok(())
    }

    #[test]
    fn test_dry_run_matches_real_run() -> Result<(), Box<dyn std::error::Error>> {
        let planner = Planner::new(corpus());
        let set = planner.plan_move(
            &[(PathBuf::from("b.md"), PathBuf::from("c.md"))],
            &MoveOptions::default(),
        )?;
        let mut executor = Executor::new(MemorySink::from_corpus(planner.corpus()));
        let dry = executor.execute(&set, true);
        assert_eq!(executor.sink(), &MemorySink::from_corpus(planner.corpus()));
        let real = executor.execute(&set, false);
        assert_eq!(dry.changes, real.changes);
        assert_eq!(dry.touched_files(), real.touched_files());
        Ok(())
    }

    #[test]
    fn test_stale_span_halts() {
        let snapshot = corpus();
        let mut sink = MemorySink::from_corpus(&snapshot);
        let changes = vec![
            Change::LinkUpdated {
                path: PathBuf::from("/c/a.md"),
                span: Span::new(5, 20),
                old_value: "[x](x.md#usage)".to_string(),
                new_value: "[x](y.md#usage)".to_string(),
            },
            Change::FileDeleted {
                path: PathBuf::from("/c/b.md"),
            },
        ];
        let result = apply(&mut sink, &changes, OperationKind::Move, snapshot);
        assert!(!result.success);
        assert!(result.changes.is_empty());
        assert!(matches!(
            result.errors.as_slice(),
            [ExecutionError::StaleContent { found, .. }] if found == "[b](b.md#usage)"
        ));
        assert!(sink.contains(Path::new("/c/b.md")));
    }

    #[test]
    fn test_previews_show_link_rewrite() -> Result<(), Box<dyn std::error::Error>> {
        let planner = Planner::new(corpus());
        let set = planner.plan_move(
            &[(PathBuf::from("b.md"), PathBuf::from("c.md"))],
            &MoveOptions::default(),
        )?;
        let result = Executor::new(MemorySink::default()).execute(&set, true);
        let previews = result.previews();
        let a = previews
            .iter()
            .find(|preview| preview.path == Path::new("/c/a.md"))
            .ok_or("no preview for a.md")?;
        assert_eq!(a.status, FileStatus::Modified);
        assert!(a.diff.contains("+[b](c.md#usage)\n"));
        assert!(previews.iter().any(|p| p.status == FileStatus::Deleted));
        Ok(())
    }
}
