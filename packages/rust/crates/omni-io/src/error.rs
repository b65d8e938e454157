//! Error types for corpus file I/O.
//!
//! Follows ODF-REP: Library crates use `thiserror` for explicit error enums.

use thiserror::Error;

/// Error types for reading and writing corpus files.
#[derive(Error, Debug)]
pub enum IoError {
    /// File does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    /// File exceeds size limit.
    #[error("File too large: {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Offending file.
        path: String,
        /// Actual size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },

    /// File contains binary content (NULL bytes detected).
    #[error("Binary file detected: {0}")]
    BinaryFile(String),

    /// File is not valid UTF-8. Lossy decoding would corrupt it on write-back.
    #[error("Invalid UTF-8 in {path} at byte {offset}")]
    Encoding {
        /// Offending file.
        path: String,
        /// Byte offset of the first invalid sequence.
        offset: usize,
    },

    /// Writing (or staging) a file failed.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Destination path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Removing a file failed.
    #[error("Failed to remove {path}: {source}")]
    Remove {
        /// Path being removed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Low-level I/O error from std::io.
    #[error("IO error: {0}")]
    System(#[from] std::io::Error),
}
