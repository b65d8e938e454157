//! Post-operation link validation.
//!
//! After a real run the touched files are re-read from disk; after a dry run
//! the recorded changes are replayed in memory. Either way the corpus is
//! rebuilt and every link in the affected slice is resolved again.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::corpus::Corpus;
use crate::document::paths::is_markdown_path;
use crate::execute::{ChangeSink, DiskSink, OperationResult};
use crate::graph::{BrokenLink, LinkGraph};
use crate::plan::Change;

/// Findings of one validation pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// No broken links and no structural errors.
    pub valid: bool,
    /// Links in the checked slice that do not resolve.
    pub broken_links: Vec<BrokenLink>,
    /// Structural problems with the run itself.
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn new(broken_links: Vec<BrokenLink>, errors: Vec<String>) -> Self {
        Self {
            valid: broken_links.is_empty() && errors.is_empty(),
            broken_links,
            errors,
        }
    }

    /// Number of broken links.
    #[must_use]
    pub fn broken_count(&self) -> usize {
        self.broken_links.len()
    }
}

/// Re-resolves links after an operation.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_file_size: u64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl Validator {
    /// Validator reading at most `max_file_size` bytes per file.
    #[must_use]
    pub const fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Check every touched file and every file that linked to one.
    #[must_use]
    pub fn validate(&self, result: &OperationResult) -> ValidationReport {
        let snapshot = result.snapshot();
        let touched = result.touched_files();
        let mut errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();

        for change in &result.changes {
            if let Change::FileCreated { path, .. } = change
                && snapshot.contains(path)
                && !result.deleted_files.contains(path)
            {
                errors.push(format!("{} was created over an existing file", path.display()));
            }
        }

        let after = if result.dry_run {
            let (sink, replay_errors) = result.replay();
            errors.extend(replay_errors.iter().map(ToString::to_string));
            sink.to_corpus(snapshot)
        } else {
            self.reread(result, &touched, &mut errors)
        };

        let before = LinkGraph::build(Arc::clone(snapshot));
        let mut slice = before.referring_documents(&touched);
        slice.extend(touched.iter().cloned());
        slice.retain(|path| after.document(path).is_some());

        let after = LinkGraph::build(Arc::new(after));
        let broken_links: Vec<BrokenLink> = slice
            .iter()
            .flat_map(|path| after.broken_links_in(path))
            .collect();

        let report = ValidationReport::new(broken_links, errors);
        tracing::info!(
            checked = slice.len(),
            broken = report.broken_count(),
            errors = report.errors.len(),
            valid = report.valid,
            "validated"
        );
        report
    }

    /// Every broken link in a whole corpus.
    #[must_use]
    pub fn check_corpus(corpus: &Corpus) -> ValidationReport {
        let graph = LinkGraph::build(Arc::new(corpus.clone()));
        let report = ValidationReport::new(graph.broken_links(), Vec::new());
        tracing::info!(
            documents = corpus.len(),
            broken = report.broken_count(),
            "checked corpus"
        );
        report
    }

    /// The snapshot with every touched file taken from disk again.
    fn reread(
        &self,
        result: &OperationResult,
        touched: &BTreeSet<PathBuf>,
        errors: &mut Vec<String>,
    ) -> Corpus {
        let snapshot = result.snapshot();
        let disk = DiskSink::new(snapshot.root()).with_max_file_size(self.max_file_size);
        let mut files: BTreeMap<PathBuf, String> = snapshot
            .documents()
            .map(|doc| (doc.path.clone(), doc.content.clone()))
            .collect();
        let mut assets = snapshot.assets().clone();

        for path in touched {
            files.remove(path);
            assets.remove(path);
            if result.deleted_files.contains(path) {
                if path.exists() {
                    errors.push(format!("{} was not removed", path.display()));
                }
                continue;
            }
            if !(is_markdown_path(path) || snapshot.document(path).is_some()) {
                assets.insert(path.clone());
                continue;
            }
            match disk.read_text(path) {
                Ok(text) => {
                    files.insert(path.clone(), text);
                }
                Err(error) => errors.push(format!("cannot re-read {}: {error}", path.display())),
            }
        }
        snapshot.derive(files, assets)
    }
}

/// Validate `result` with default limits.
#[must_use]
pub fn validate(result: &OperationResult) -> ValidationReport {
    Validator::default().validate(result)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::execute::{Executor, MemorySink};
    use crate::graph::BrokenKind;
    use crate::plan::{ChangeSetBuilder, ContentSource, OperationKind};

    fn snapshot() -> Arc<Corpus> {
        Arc::new(Corpus::from_documents(
            "/c",
            [
                ("a.md", "# A\n\n[b](b.md#usage)\n"),
                ("b.md", "# B\n\n## Usage\n"),
            ],
        ))
    }

    #[test]
    fn test_move_without_rewrites_is_caught() -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = snapshot();
        let mut builder = ChangeSetBuilder::new();
        builder.create(
            Path::new("/c/c.md"),
            ContentSource::Text("# B\n\n## Usage\n".to_string()),
        )?;
        builder.delete(Path::new("/c/b.md"));
        let set = builder.build(OperationKind::Move, Arc::clone(&snapshot))?;

        let result = Executor::new(MemorySink::default()).execute(&set, true);
        let report = validate(&result);
        assert!(!report.valid);
        assert_eq!(report.broken_count(), 1);
        assert_eq!(report.broken_links[0].source, Path::new("/c/a.md"));
        assert_eq!(report.broken_links[0].kind, BrokenKind::MissingFile);
        Ok(())
    }

    #[test]
    fn test_creating_over_existing_file_is_structural() -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = snapshot();
        let mut builder = ChangeSetBuilder::new();
        builder.create(Path::new("/c/b.md"), ContentSource::Text("# B\n\n## Usage\n".into()))?;
        let set = builder.build(OperationKind::Move, snapshot)?;

        let result = Executor::new(MemorySink::default()).execute(&set, true);
        let report = validate(&result);
        assert!(report.broken_links.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(!report.valid);
        Ok(())
    }

    #[test]
    fn test_check_corpus_finds_dangling_fragment() {
        let corpus = Corpus::from_documents("/c", [("a.md", "[x](#nowhere)\n# A\n")]);
        let report = Validator::check_corpus(&corpus);
        assert_eq!(report.broken_count(), 1);
        assert_eq!(report.broken_links[0].kind, BrokenKind::DanglingFragment);
    }
}
