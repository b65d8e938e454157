//! Relink settings.
//!
//! Loads, in order of precedence:
//! - An explicit file passed by the caller (`relink --conf FILE`)
//! - Corpus overrides: `<root>/.config/omni-dev-fusion/relink.yaml`
//! - Built-in defaults
//!
//! Command-line flags override whatever the file provides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::ParseMode;
use crate::error::ConfigError;
use crate::strategy::{
    DEFAULT_SPLIT_MARKER, LinkStyleTarget, MergeStrategy, OrderStrategy, PathResolution,
    SplitKind, SplitStrategy,
};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".config/omni-dev-fusion/relink.yaml";
pub(crate) const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    ".venv",
    "__pycache__",
    ".cache",
];

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelinkConfig {
    /// Directory names never walked.
    pub exclude_dirs: Vec<String>,
    /// Largest markdown file read, in bytes.
    pub max_file_size: u64,
    /// Extensions parsed as documents; everything else is an asset.
    pub markdown_extensions: Vec<String>,
    /// Link families recognized while parsing.
    pub parse_mode: ParseMode,
    /// Split defaults.
    pub split: SplitSettings,
    /// Join and merge defaults.
    pub merge: MergeSettings,
    /// Convert defaults.
    pub convert: ConvertSettings,
}

impl Default for RelinkConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(ToString::to_string).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            markdown_extensions: crate::document::paths::MARKDOWN_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            parse_mode: ParseMode::default(),
            split: SplitSettings::default(),
            merge: MergeSettings::default(),
            convert: ConvertSettings::default(),
        }
    }
}

/// Split defaults; the strategy is independent of the merge strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    /// Strategy selector.
    pub strategy: SplitKind,
    /// Heading depth for `headers`.
    pub level: Option<usize>,
    /// Byte budget for `size`.
    pub max_bytes: Option<usize>,
    /// Line budget for `size`.
    pub max_lines: Option<usize>,
    /// Marker for `manual`.
    pub marker: String,
    /// Keep the source as an index with a table of contents.
    pub toc: bool,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            strategy: SplitKind::Headers,
            level: None,
            max_bytes: None,
            max_lines: None,
            marker: DEFAULT_SPLIT_MARKER.to_string(),
            toc: true,
        }
    }
}

impl SplitSettings {
    /// Strategy for `kind` with these parameters; `lines` feeds the lines strategy.
    #[must_use]
    pub fn strategy_for(&self, kind: SplitKind, lines: Vec<usize>) -> SplitStrategy {
        match kind {
            SplitKind::Headers => SplitStrategy::Headers { level: self.level },
            SplitKind::Size => SplitStrategy::Size {
                max_bytes: self.max_bytes,
                max_lines: self.max_lines,
            },
            SplitKind::Manual => SplitStrategy::Manual {
                marker: self.marker.clone(),
            },
            SplitKind::Lines => SplitStrategy::Lines { starts: lines },
        }
    }
}

/// Join and merge defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Heading collision strategy.
    pub strategy: MergeStrategy,
    /// Source order.
    pub order: OrderStrategy,
}

/// Convert defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertSettings {
    /// Target link style.
    pub link_style: Option<LinkStyleTarget>,
    /// Target path form.
    pub path_resolution: Option<PathResolution>,
}

impl RelinkConfig {
    /// Parse YAML; missing keys take defaults.
    ///
    /// # Errors
    /// `ConfigError::Yaml` on malformed input or unknown enum values.
    pub fn from_yaml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, else the corpus override file if present, else defaults.
    ///
    /// # Errors
    /// Read or parse failures of whichever file is chosen.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(DEFAULT_CONFIG_RELATIVE_PATH);
                if !candidate.is_file() {
                    tracing::debug!(root = %root.display(), "no relink config; using defaults");
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let raw = omni_io::read_text(&path, DEFAULT_MAX_FILE_SIZE).map_err(|source| {
            ConfigError::Read {
                path: path.clone(),
                source,
            }
        })?;
        let config = Self::from_yaml_str(&raw, &path)?;
        tracing::debug!(path = %path.display(), "loaded relink config");
        Ok(config)
    }

    /// Whether `ext` (without dot) is a document extension.
    #[must_use]
    pub fn is_markdown_extension(&self, ext: &str) -> bool {
        self.markdown_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}
