//! Where applied changes land: the real file system or an in-memory map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use omni_io::IoError;

use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::corpus::Corpus;
use crate::document::paths::is_markdown_path;

/// File operations the executor needs.
pub trait ChangeSink {
    /// Read a file as checked UTF-8 text.
    ///
    /// # Errors
    /// Missing, oversized, binary or non-UTF-8 files.
    fn read_text(&self, path: &Path) -> Result<String, IoError>;

    /// Read a file's raw bytes.
    ///
    /// # Errors
    /// Missing or unreadable files.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, IoError>;

    /// Replace or create a file with `content`.
    ///
    /// # Errors
    /// Any write failure.
    fn write_bytes(&mut self, path: &Path, content: &[u8]) -> Result<(), IoError>;

    /// Text form of [`Self::write_bytes`].
    ///
    /// # Errors
    /// Any write failure.
    fn write_text(&mut self, path: &Path, content: &str) -> Result<(), IoError> {
        self.write_bytes(path, content.as_bytes())
    }

    /// Remove a file.
    ///
    /// # Errors
    /// Missing file or removal failure.
    fn remove_file(&mut self, path: &Path) -> Result<(), IoError>;
}

/// The real file system below a corpus root, through `omni-io`.
#[derive(Debug, Clone)]
pub struct DiskSink {
    root: PathBuf,
    max_file_size: u64,
}

impl DiskSink {
    /// Sink rooted at `root`; directories emptied by removals are pruned up
    /// to it.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Override the size limit for text reads.
    #[must_use]
    pub const fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }
}

impl ChangeSink for DiskSink {
    fn read_text(&self, path: &Path) -> Result<String, IoError> {
        omni_io::read_text(path, self.max_file_size)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, IoError> {
        omni_io::read_bytes(path)
    }

    fn write_bytes(&mut self, path: &Path, content: &[u8]) -> Result<(), IoError> {
        omni_io::write_bytes_staged(path, content)
    }

    fn write_text(&mut self, path: &Path, content: &str) -> Result<(), IoError> {
        omni_io::write_text_staged(path, content)
    }

    fn remove_file(&mut self, path: &Path) -> Result<(), IoError> {
        omni_io::remove_file_pruning(path, &self.root)
    }
}

/// In-memory file map, for simulating a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemorySink {
    /// Every document of `corpus` with its text; assets as empty files.
    #[must_use]
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let mut files: BTreeMap<PathBuf, Vec<u8>> = corpus
            .documents()
            .map(|doc| (doc.path.clone(), doc.content.clone().into_bytes()))
            .collect();
        for asset in corpus.assets() {
            files.insert(asset.clone(), Vec::new());
        }
        Self { files }
    }

    /// Whether `path` exists.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Text of `path` if it exists and is UTF-8.
    #[must_use]
    pub fn text(&self, path: &Path) -> Option<&str> {
        self.files
            .get(path)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// All paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Snapshot of the map with `base`'s root, mode and exclusions; markdown
    /// paths become documents, the rest assets.
    #[must_use]
    pub fn to_corpus(&self, base: &Corpus) -> Corpus {
        let mut documents = Vec::new();
        let mut assets = Vec::new();
        for (path, bytes) in &self.files {
            match std::str::from_utf8(bytes) {
                Ok(text) if is_markdown_path(path) || base.document(path).is_some() => {
                    documents.push((path.clone(), text.to_string()));
                }
                _ => assets.push(path.clone()),
            }
        }
        base.derive(documents, assets)
    }
}

fn missing(path: &Path) -> IoError {
    IoError::NotFound(path.to_string_lossy().to_string())
}

impl ChangeSink for MemorySink {
    fn read_text(&self, path: &Path) -> Result<String, IoError> {
        let bytes = self.files.get(path).ok_or_else(|| missing(path))?;
        omni_io::decode_text(&path.to_string_lossy(), bytes.clone())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, IoError> {
        self.files.get(path).cloned().ok_or_else(|| missing(path))
    }

    fn write_bytes(&mut self, path: &Path, content: &[u8]) -> Result<(), IoError> {
        self.files.insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn remove_file(&mut self, path: &Path) -> Result<(), IoError> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| IoError::Remove {
                path: path.to_string_lossy().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}
