#![allow(clippy::doc_markdown)]

//! omni-relink - Link-preserving refactoring for markdown corpora
//!
//! Moves, splits, joins, merges and restyles markdown files while keeping
//! every internal link pointing at the same content.
//!
//! # Features
//!
//! - **Document model**: inline, reference-style, image, `[[wikilink]]` and
//!   `@mention` links with byte-exact spans (fenced code and inline code are
//!   masked)
//! - **Link graph**: forward resolutions plus a reverse index keyed by
//!   `(target, fragment)`
//! - **Planner**: move/split/join/merge/convert as pure functions from a
//!   corpus snapshot to an ordered `ChangeSet`
//! - **Executor**: one staged write per file, deletions last, halts on the
//!   first failure; dry-run never touches disk
//! - **Validator**: re-resolves the affected slice after every run
//!
//! # Architecture (ODF-REP Compliant)
//!
//! ```text
//! omni-relink/src/
//! ├── lib.rs          # Re-exports (this file)
//! ├── error.rs        # ParseError, PlanError, ExecutionError, ConfigError
//! ├── config.rs       # RelinkConfig (YAML)
//! ├── corpus.rs       # Corpus snapshot (walkdir, xxh3 fingerprint)
//! ├── document/       # Document, Link, Heading parsing
//! ├── graph/          # Link resolution & reverse index
//! ├── strategy/       # Partitioning, ordering, conflicts, restyling
//! ├── plan/           # Planner and ChangeSet
//! ├── execute/        # Executor, sinks, diff previews
//! ├── validate/       # Post-operation validation
//! └── bin/relink.rs   # CLI
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use omni_relink::{Corpus, MoveOptions, Planner, RelinkConfig, execute, validate};
//!
//! let corpus = Corpus::load("docs", &RelinkConfig::default())?;
//! let planner = Planner::new(Arc::new(corpus));
//! let set = planner.plan_move(&[("guide.md".into(), "manual/guide.md".into())], &MoveOptions::default())?;
//! let result = execute(&set, false);
//! let report = validate(&result);
//! assert!(report.valid);
//! ```

// ============================================================================
// Module Declarations (ODF-REP: Atomic Structure)
// ============================================================================

pub mod config;
pub mod corpus;
pub mod document;
pub mod error;
pub mod execute;
pub mod graph;
pub mod plan;
pub mod strategy;
pub mod validate;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use config::RelinkConfig;
pub use corpus::Corpus;
pub use document::{Document, Heading, Link, LinkStyle, ParseMode, Span};
pub use error::{ConfigError, ExecutionError, ParseError, PlanError};
pub use execute::{
    ChangeSink, DiskSink, Executor, FilePreview, FileStatus, MemorySink, OperationResult,
    OperationSummary, execute,
};
pub use graph::{BrokenKind, BrokenLink, LinkGraph, Resolution};
pub use plan::{
    Change, ChangeSet, ContentSource, MergeOutcome, MoveOptions, OperationKind, Planner,
    SplitOptions,
};
pub use strategy::{
    ConflictResolutions, HeadingConflict, LinkStyleTarget, MergeStrategy, OrderStrategy,
    PathResolution, SplitKind, SplitStrategy,
};
pub use validate::{ValidationReport, Validator, validate};
