#![allow(clippy::doc_markdown)]

//! omni-io - Safe file I/O for corpus refactoring
//!
//! Reading and writing primitives used by the markdown refactoring engine.
//!
//! # Features
//!
//! - **Strict reads**: size limits, binary detection, and UTF-8 validation
//!   (a file that cannot round-trip is refused instead of decoded lossily)
//! - **Staged writes**: text or bytes go to a temporary sibling, then are renamed
//! - **Pruning removes**: deleting the last file of a directory removes the
//!   directory, up to a caller-supplied root
//!
//! # Architecture (ODF-REP Compliant)
//!
//! ```text
//! omni-io/src/
//! ├── lib.rs      # Re-exports (this file)
//! ├── error.rs    # IoError enum
//! ├── detect.rs   # Binary detection & strict decoding
//! ├── read.rs     # Checked reads
//! └── write.rs    # Staged writes & pruning removes
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use omni_io::{read_text, write_text_staged};
//!
//! let content = read_text("docs/guide.md", 1024 * 1024)?;
//! write_text_staged("docs/moved/guide.md", &content)?;
//! ```

// ============================================================================
// Module Declarations (ODF-REP: Atomic Structure)
// ============================================================================

mod detect;
mod error;
mod read;
mod write;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use detect::{decode_text, is_binary};
pub use error::IoError;
pub use read::{read_bytes, read_text};
pub use write::{remove_file_pruning, write_bytes_staged, write_text_staged};
