//! Change and ChangeSet: ordered, replayable descriptions of mutations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::document::Span;
use crate::error::PlanError;

/// Operation that produced a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Rename or relocate files.
    Move,
    /// One file into several.
    Split,
    /// Several files into one, automatic slug disambiguation.
    Join,
    /// Several files into one, explicit conflict strategy.
    Merge,
    /// Restyle or re-path links in place.
    Convert,
}

/// Where new file content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentSource {
    /// Full text captured at plan time.
    Text(String),
    /// Byte copy of another file (assets).
    CopyOf(PathBuf),
}

/// One planned mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Change {
    /// A new file.
    FileCreated {
        /// Path written.
        path: PathBuf,
        /// Content.
        content: ContentSource,
    },
    /// An existing file replaced wholesale.
    FileModified {
        /// Path written.
        path: PathBuf,
        /// Content.
        content: ContentSource,
    },
    /// A file removed after everything that reads it has run.
    FileDeleted {
        /// Path removed.
        path: PathBuf,
    },
    /// Raw link text replaced at a span of the file's base content.
    LinkUpdated {
        /// File edited.
        path: PathBuf,
        /// Byte range of `old_value`.
        span: Span,
        /// Raw syntax before.
        old_value: String,
        /// Raw syntax after.
        new_value: String,
    },
}

impl Change {
    /// File this change applies to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::FileCreated { path, .. }
            | Self::FileModified { path, .. }
            | Self::FileDeleted { path }
            | Self::LinkUpdated { path, .. } => path,
        }
    }
}

/// Ordered changes plus the snapshot they were planned against.
///
/// Per file: its content change first, then link updates by descending span
/// start. Deletions come after every write.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    operation: OperationKind,
    changes: Vec<Change>,
    snapshot: Arc<Corpus>,
}

impl PartialEq for ChangeSet {
    fn eq(&self, other: &Self) -> bool {
        self.operation == other.operation
            && self.changes == other.changes
            && self.snapshot.fingerprint() == other.snapshot.fingerprint()
    }
}

impl ChangeSet {
    /// Operation kind.
    #[must_use]
    pub const fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Changes in application order.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Snapshot the plan is valid against.
    #[must_use]
    pub const fn snapshot(&self) -> &Arc<Corpus> {
        &self.snapshot
    }

    /// Number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Link updates only.
    pub fn link_updates(&self) -> impl Iterator<Item = &Change> {
        self.changes
            .iter()
            .filter(|change| matches!(change, Change::LinkUpdated { .. }))
    }

    /// Every path the set writes or deletes.
    #[must_use]
    pub fn touched_paths(&self) -> BTreeSet<PathBuf> {
        self.changes
            .iter()
            .map(|change| change.path().to_path_buf())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Created,
    Modified,
}

#[derive(Debug)]
struct FileEntry {
    path: PathBuf,
    content: Option<(ContentKind, ContentSource)>,
    updates: Vec<(Span, String, String)>,
}

/// Collects changes in any order and emits them in application order.
#[derive(Debug, Default)]
pub(crate) struct ChangeSetBuilder {
    entries: Vec<FileEntry>,
    index: HashMap<PathBuf, usize>,
    deletions: Vec<PathBuf>,
}

impl ChangeSetBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, path: &Path) -> &mut FileEntry {
        let idx = *self.index.entry(path.to_path_buf()).or_insert_with(|| {
            self.entries.push(FileEntry {
                path: path.to_path_buf(),
                content: None,
                updates: Vec::new(),
            });
            self.entries.len() - 1
        });
        &mut self.entries[idx]
    }

    fn set_content(
        &mut self,
        path: &Path,
        kind: ContentKind,
        content: ContentSource,
    ) -> Result<(), PlanError> {
        let entry = self.entry(path);
        if entry.content.is_some() {
            return Err(PlanError::ConflictingChanges(path.to_path_buf()));
        }
        entry.content = Some((kind, content));
        Ok(())
    }

    pub(crate) fn create(&mut self, path: &Path, content: ContentSource) -> Result<(), PlanError> {
        self.set_content(path, ContentKind::Created, content)
    }

    pub(crate) fn modify(&mut self, path: &Path, content: ContentSource) -> Result<(), PlanError> {
        self.set_content(path, ContentKind::Modified, content)
    }

    /// Record a link edit; identical old and new text is dropped.
    pub(crate) fn update_link(&mut self, path: &Path, span: Span, old: &str, new: &str) {
        if old == new {
            return;
        }
        self.entry(path)
            .updates
            .push((span, old.to_string(), new.to_string()));
    }

    pub(crate) fn delete(&mut self, path: &Path) {
        if !self.deletions.iter().any(|known| known == path) {
            self.deletions.push(path.to_path_buf());
        }
    }

    pub(crate) fn build(
        self,
        operation: OperationKind,
        snapshot: Arc<Corpus>,
    ) -> Result<ChangeSet, PlanError> {
        let mut changes = Vec::new();
        for entry in self.entries {
            if entry.content.is_none() && entry.updates.is_empty() {
                continue;
            }
            if self.deletions.contains(&entry.path) {
                return Err(PlanError::ConflictingChanges(entry.path));
            }
            if let Some((kind, content)) = entry.content {
                let path = entry.path.clone();
                changes.push(match kind {
                    ContentKind::Created => Change::FileCreated { path, content },
                    ContentKind::Modified => Change::FileModified { path, content },
                });
            }

            let mut updates = entry.updates;
            updates.sort_by(|a, b| b.0.start.cmp(&a.0.start));
            for pair in updates.windows(2) {
                let (later, earlier) = (&pair[0].0, &pair[1].0);
                if earlier.end > later.start {
                    return Err(PlanError::OverlappingEdits {
                        path: entry.path,
                        first: *earlier,
                        second: *later,
                    });
                }
            }
            for (span, old_value, new_value) in updates {
                changes.push(Change::LinkUpdated {
                    path: entry.path.clone(),
                    span,
                    old_value,
                    new_value,
                });
            }
        }
        for path in self.deletions {
            changes.push(Change::FileDeleted { path });
        }
        tracing::debug!(?operation, changes = changes.len(), "built change set");
        Ok(ChangeSet {
            operation,
            changes,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Arc<Corpus> {
        Arc::new(Corpus::from_documents("/c", [("a.md", "x")]))
    }

    #[test]
    fn test_ordering_per_file_and_deletions_last() -> Result<(), PlanError> {
        let mut builder = ChangeSetBuilder::new();
        builder.delete(Path::new("/c/old.md"));
        builder.update_link(Path::new("/c/a.md"), Span::new(2, 5), "[a]", "[b]");
        builder.create(Path::new("/c/new.md"), ContentSource::Text("n".into()))?;
        builder.update_link(Path::new("/c/a.md"), Span::new(10, 12), "xy", "zz");
        builder.update_link(Path::new("/c/a.md"), Span::new(20, 22), "same", "same");

        let set = builder.build(OperationKind::Move, snapshot())?;
        let kinds: Vec<(String, Option<usize>)> = set
            .changes()
            .iter()
            .map(|change| match change {
                Change::LinkUpdated { path, span, .. } => {
                    (path.display().to_string(), Some(span.start))
                }
                other => (other.path().display().to_string(), None),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("/c/a.md".to_string(), Some(10)),
                ("/c/a.md".to_string(), Some(2)),
                ("/c/new.md".to_string(), None),
                ("/c/old.md".to_string(), None),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_overlapping_edits_rejected() {
        let mut builder = ChangeSetBuilder::new();
        builder.update_link(Path::new("/c/a.md"), Span::new(0, 10), "a", "b");
        builder.update_link(Path::new("/c/a.md"), Span::new(5, 12), "c", "d");
        let result = builder.build(OperationKind::Convert, snapshot());
        assert!(matches!(result, Err(PlanError::OverlappingEdits { .. })));
    }

    #[test]
    fn test_write_and_delete_same_path_conflicts() -> Result<(), PlanError> {
        let mut builder = ChangeSetBuilder::new();
        builder.create(Path::new("/c/a.md"), ContentSource::Text(String::new()))?;
        builder.delete(Path::new("/c/a.md"));
        let result = builder.build(OperationKind::Move, snapshot());
        assert!(matches!(result, Err(PlanError::ConflictingChanges(_))));
        Ok(())
    }
}
