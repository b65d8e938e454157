//! Pluggable policies used by the planner.
//!
//! Every strategy here is a pure function of parsed documents (plus plain
//! data the planner derives from the link graph); none of them touch disk.

mod conflict;
mod convert;
mod order;
mod split;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use self::conflict::{
    ConflictOccurrence, ConflictResolutions, HeadingConflict, HeadingRename, detect_conflicts,
    resolve_conflicts,
};
pub use self::convert::{restyle, target_style};
pub use self::order::order_sources;
pub use self::split::{Partition, SplitPart, partition};

/// Default marker for manual splits.
pub const DEFAULT_SPLIT_MARKER: &str = "<!-- split -->";

/// Split strategy selector (without parameters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    /// Partition at heading boundaries.
    #[default]
    Headers,
    /// Partition at block boundaries under a byte/line budget.
    Size,
    /// Partition at marker lines.
    Manual,
    /// Partition at explicit line numbers.
    Lines,
}

/// Split strategy with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Each heading at `level` (or shallower) starts a part. Without a level,
    /// the shallowest level that occurs at least twice is used.
    Headers {
        /// Split depth.
        level: Option<usize>,
    },
    /// Greedy parts bounded by bytes and/or lines.
    Size {
        /// Byte budget per part.
        max_bytes: Option<usize>,
        /// Line budget per part.
        max_lines: Option<usize>,
    },
    /// Marker lines separate parts and are dropped.
    Manual {
        /// Marker text, matched against a whole trimmed line.
        marker: String,
    },
    /// 1-based line numbers where new parts begin.
    Lines {
        /// Part starting lines.
        starts: Vec<usize>,
    },
}

impl SplitStrategy {
    /// Selector of this strategy.
    #[must_use]
    pub const fn kind(&self) -> SplitKind {
        match self {
            Self::Headers { .. } => SplitKind::Headers,
            Self::Size { .. } => SplitKind::Size,
            Self::Manual { .. } => SplitKind::Manual,
            Self::Lines { .. } => SplitKind::Lines,
        }
    }
}

/// How heading-slug collisions across merged sources are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Later sources get a disambiguating suffix.
    Append,
    /// Earlier sources get the suffix instead.
    Prepend,
    /// Collisions need externally supplied resolutions.
    #[default]
    Interactive,
}

/// Order in which sources are concatenated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderStrategy {
    /// By path.
    Alphabetical,
    /// As given.
    Manual,
    /// Linked-to files first; cycles are an error.
    #[default]
    Dependency,
    /// Oldest first, by frontmatter `created` or file mtime.
    Chronological,
}

/// Link style requested by a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyleTarget {
    /// Inline markdown links and image embeds.
    Markdown,
    /// `@path` mentions.
    Claude,
    /// Keep each link's style.
    Combined,
    /// `[[wikilinks]]`.
    Wikilink,
}

/// Path form requested by a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PathResolution {
    /// Rooted at the corpus root (`/docs/a.md`).
    Absolute,
    /// Relative to the referring file.
    Relative,
}
