//! Error types for planning, execution and configuration.
//!
//! Library errors are `thiserror` enums; the `relink` binary wraps them in
//! `anyhow`. Validation findings are not errors and live in
//! [`crate::validate::ValidationReport`].

use std::path::PathBuf;

use omni_io::IoError;
use thiserror::Error;

use crate::document::Span;
use crate::strategy::HeadingConflict;

/// A document could not be read or the corpus could not be walked.
///
/// Aborts the whole operation: a partial link graph cannot be trusted.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Corpus root missing or not a directory.
    #[error("Corpus root not found: {0}")]
    RootNotFound(PathBuf),

    /// A markdown file failed the checked read.
    #[error("Unreadable document {path}: {source}")]
    Unreadable {
        /// Offending file.
        path: PathBuf,
        /// Underlying read failure.
        source: IoError,
    },

    /// Walking the corpus failed.
    #[error("Failed to walk corpus: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Structural planning failure; nothing has touched disk.
#[derive(Error, Debug)]
pub enum PlanError {
    /// A requested input is not part of the corpus snapshot.
    #[error("Unknown source: {0}")]
    UnknownSource(PathBuf),

    /// Operation needs a markdown document, got an asset.
    #[error("Not a markdown document: {0}")]
    NotADocument(PathBuf),

    /// Two sources map to the same destination.
    #[error("Duplicate destination {destination}: {first} and {second}")]
    DuplicateDestination {
        /// Shared destination.
        destination: PathBuf,
        /// First source.
        first: PathBuf,
        /// Second source.
        second: PathBuf,
    },

    /// Destination exists and is not itself being moved away.
    #[error("Destination already exists: {0}")]
    DestinationCollision(PathBuf),

    /// A path escapes the corpus root.
    #[error("Path is outside the corpus root: {0}")]
    OutsideCorpus(PathBuf),

    /// Dependency ordering found a cycle among the join set.
    #[error("Dependency cycle among: {}", display_paths(.files))]
    DependencyCycle {
        /// Files participating in (or blocked by) the cycle.
        files: Vec<PathBuf>,
    },

    /// Interactive merge needs heading resolutions that were not supplied.
    #[error("{} heading conflict(s) need resolution", .0.len())]
    UnresolvedConflicts(Vec<HeadingConflict>),

    /// Strategy parameters are unsupported or inconsistent.
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    /// Two edits target overlapping spans of one file.
    #[error("Overlapping edits in {path} at {first:?} and {second:?}")]
    OverlappingEdits {
        /// File being edited.
        path: PathBuf,
        /// Earlier span.
        first: Span,
        /// Conflicting span.
        second: Span,
    },

    /// One path would be both written and deleted, or written twice.
    #[error("Conflicting changes for {0}")]
    ConflictingChanges(PathBuf),

    /// Loading the snapshot failed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Failure while applying a change set.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Disk operation failed.
    #[error("Failed to {action} {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Operation attempted (`read`, `write`, `copy`, `remove`).
        action: &'static str,
        /// Underlying failure.
        source: IoError,
    },

    /// The bytes at a link span no longer match the planned old value.
    #[error("Stale content in {path} at {span:?}: expected {expected:?}, found {found:?}")]
    StaleContent {
        /// File being edited.
        path: PathBuf,
        /// Planned span.
        span: Span,
        /// Planned old value.
        expected: String,
        /// Actual bytes (lossy).
        found: String,
    },

    /// A link update targets a file with no base content.
    #[error("No base content for {0}")]
    MissingBase(PathBuf),
}

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying failure.
        source: IoError,
    },

    /// YAML was malformed or had unknown values.
    #[error("Invalid config {path}: {source}")]
    Yaml {
        /// Config path.
        path: PathBuf,
        /// Underlying failure.
        source: serde_yaml::Error,
    },
}

fn display_paths(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
