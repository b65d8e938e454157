//! Immutable snapshot of a markdown corpus.
//!
//! Planning always runs against a `Corpus`; the executor is the only thing
//! that changes disk, and only after planning has finished.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;
use xxhash_rust::xxh3::Xxh3;

use crate::config::RelinkConfig;
use crate::document::paths::{file_stem_lower, lexical_normalize};
use crate::document::{Document, ParseMode};
use crate::error::ParseError;

/// Parsed documents, asset paths and per-file timestamps under one root.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    documents: BTreeMap<PathBuf, Document>,
    assets: BTreeSet<PathBuf>,
    mtimes: HashMap<PathBuf, i64>,
    stems: HashMap<String, Vec<PathBuf>>,
    exclude_dirs: Vec<String>,
    mode: ParseMode,
    fingerprint: u64,
}

impl Corpus {
    /// Walk `root` and parse every markdown file.
    ///
    /// # Errors
    /// `ParseError::RootNotFound` for a missing root, `ParseError::Walk` when
    /// a directory cannot be listed and `ParseError::Unreadable` when any
    /// markdown file fails the checked read. One bad file aborts the load.
    pub fn load(root: impl AsRef<Path>, config: &RelinkConfig) -> Result<Self, ParseError> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .ok()
            .filter(|path| path.is_dir())
            .ok_or_else(|| ParseError::RootNotFound(root.to_path_buf()))?;

        let mut documents = Vec::new();
        let mut assets = Vec::new();
        let mut mtimes = HashMap::new();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !config
                        .exclude_dirs
                        .iter()
                        .any(|name| entry.file_name().to_string_lossy() == name.as_str())
            });
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();
            if let Some(modified) = entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
                .and_then(|dur| i64::try_from(dur.as_secs()).ok())
            {
                mtimes.insert(path.clone(), modified);
            }

            let is_markdown = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| config.is_markdown_extension(ext));
            if !is_markdown {
                assets.push(path);
                continue;
            }
            let content = omni_io::read_text(&path, config.max_file_size).map_err(|source| {
                ParseError::Unreadable {
                    path: path.clone(),
                    source,
                }
            })?;
            documents.push(Document::parse_with_mode(path, content, config.parse_mode));
        }

        let mut corpus = Self::assemble(root, documents, assets, config.parse_mode);
        corpus.mtimes = mtimes;
        corpus.exclude_dirs.clone_from(&config.exclude_dirs);
        tracing::info!(
            root = %corpus.root.display(),
            documents = corpus.documents.len(),
            assets = corpus.assets.len(),
            "loaded corpus"
        );
        Ok(corpus)
    }

    /// Snapshot from in-memory text; relative paths are joined onto `root`.
    #[must_use]
    pub fn from_documents<P, S>(root: impl AsRef<Path>, files: impl IntoIterator<Item = (P, S)>) -> Self
    where
        P: AsRef<Path>,
        S: Into<String>,
    {
        Self::from_parts(root, files, std::iter::empty::<PathBuf>(), ParseMode::Combined)
    }

    /// Snapshot from in-memory text plus asset paths, parsed with `mode`.
    #[must_use]
    pub fn from_parts<P, S, A>(
        root: impl AsRef<Path>,
        files: impl IntoIterator<Item = (P, S)>,
        assets: impl IntoIterator<Item = A>,
        mode: ParseMode,
    ) -> Self
    where
        P: AsRef<Path>,
        S: Into<String>,
        A: AsRef<Path>,
    {
        let root = lexical_normalize(root.as_ref());
        let documents = files
            .into_iter()
            .map(|(path, content)| {
                let path = lexical_normalize(&root.join(path.as_ref()));
                Document::parse_with_mode(path, content, mode)
            })
            .collect();
        let assets = assets
            .into_iter()
            .map(|path| lexical_normalize(&root.join(path.as_ref())))
            .collect();
        Self::assemble(root, documents, assets, mode)
    }

    /// Snapshot of other files under the same root, mode and exclusions.
    ///
    /// Used to look at a corpus as it would be after a change set.
    #[must_use]
    pub fn derive(
        &self,
        files: impl IntoIterator<Item = (PathBuf, String)>,
        assets: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        let documents = files
            .into_iter()
            .map(|(path, content)| Document::parse_with_mode(path, content, self.mode))
            .collect();
        let mut corpus = Self::assemble(
            self.root.clone(),
            documents,
            assets.into_iter().collect(),
            self.mode,
        );
        corpus.exclude_dirs.clone_from(&self.exclude_dirs);
        corpus.mtimes.clone_from(&self.mtimes);
        corpus
    }

    fn assemble(
        root: PathBuf,
        documents: Vec<Document>,
        assets: Vec<PathBuf>,
        mode: ParseMode,
    ) -> Self {
        let documents: BTreeMap<PathBuf, Document> = documents
            .into_iter()
            .map(|doc| (doc.path.clone(), doc))
            .collect();
        let assets: BTreeSet<PathBuf> = assets.into_iter().collect();

        let mut stems: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for path in documents.keys().chain(assets.iter()) {
            stems.entry(file_stem_lower(path)).or_default().push(path.clone());
        }

        let mut hasher = Xxh3::new();
        for (path, doc) in &documents {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(&[0]);
            hasher.update(doc.content.as_bytes());
            hasher.update(&[0]);
        }
        for path in &assets {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(&[1]);
        }

        Self {
            root,
            documents,
            assets,
            mtimes: HashMap::new(),
            stems,
            exclude_dirs: Vec::new(),
            mode,
            fingerprint: hasher.digest(),
        }
    }

    /// Corpus root (canonical for loaded corpora).
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Link families the documents were parsed with.
    #[must_use]
    pub const fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Content fingerprint of the snapshot.
    #[must_use]
    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Parsed document at `path`.
    #[must_use]
    pub fn document(&self, path: &Path) -> Option<&Document> {
        self.documents.get(path)
    }

    /// All documents in path order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the snapshot has no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All non-markdown files.
    #[must_use]
    pub const fn assets(&self) -> &BTreeSet<PathBuf> {
        &self.assets
    }

    /// Whether `path` is a known asset.
    #[must_use]
    pub fn is_asset(&self, path: &Path) -> bool {
        self.assets.contains(path)
    }

    /// Whether `path` is a known document or asset.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path) || self.assets.contains(path)
    }

    /// Whether any known file lives below `path`.
    #[must_use]
    pub fn is_directory(&self, path: &Path) -> bool {
        self.documents
            .keys()
            .chain(self.assets.iter())
            .any(|known| known != path && known.starts_with(path))
    }

    /// Documents and assets whose lowercase file stem is `stem`.
    #[must_use]
    pub fn stem_matches(&self, stem: &str) -> &[PathBuf] {
        self.stems
            .get(&stem.to_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Creation time: frontmatter first, then file mtime.
    #[must_use]
    pub fn timestamp(&self, path: &Path) -> Option<i64> {
        self.documents
            .get(path)
            .and_then(|doc| doc.created_ts)
            .or_else(|| self.mtimes.get(path).copied())
    }

    /// Absolute, lexically normalized form of `path`; relative paths are
    /// taken relative to the root.
    #[must_use]
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            lexical_normalize(path)
        } else {
            lexical_normalize(&self.root.join(path))
        }
    }

    /// Whether `path` lies under the root.
    #[must_use]
    pub fn in_scope(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Whether `path` sits in a directory that is never walked.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        relative.components().any(|component| match component {
            Component::Normal(name) => self
                .exclude_dirs
                .iter()
                .any(|excluded| name.to_string_lossy() == excluded.as_str()),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_documents_joins_root() {
        let corpus = Corpus::from_documents("/c", [("docs/a.md", "# A\n"), ("b.md", "# B\n")]);
        assert!(corpus.document(Path::new("/c/docs/a.md")).is_some());
        assert!(corpus.is_directory(Path::new("/c/docs")));
        assert_eq!(corpus.stem_matches("A"), &[PathBuf::from("/c/docs/a.md")]);
        assert_eq!(corpus.absolute(Path::new("docs/../b.md")), PathBuf::from("/c/b.md"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let first = Corpus::from_documents("/c", [("a.md", "one")]);
        let same = Corpus::from_documents("/c", [("a.md", "one")]);
        let other = Corpus::from_documents("/c", [("a.md", "two")]);
        assert_eq!(first.fingerprint(), same.fingerprint());
        assert_ne!(first.fingerprint(), other.fingerprint());
    }
}
