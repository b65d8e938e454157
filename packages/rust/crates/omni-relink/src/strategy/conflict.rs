use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::document::{Document, slugify};

use super::MergeStrategy;

/// One heading taking part in a collision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictOccurrence {
    /// Source document.
    pub source: PathBuf,
    /// Heading text as it would be merged.
    pub heading: String,
    /// Slug of the heading inside its source (resolution key).
    pub slug: String,
    /// 1-based line inside the source.
    pub line: usize,
}

/// Headings from different sources that would share a slug once merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingConflict {
    /// Shared slug.
    pub slug: String,
    /// Every heading producing it, in merge order.
    pub occurrences: Vec<ConflictOccurrence>,
}

/// New heading text for one source heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRename {
    /// Index of the source in merge order.
    pub doc: usize,
    /// Index of the heading inside that source.
    pub heading: usize,
    /// Replacement heading text.
    pub text: String,
}

/// Externally supplied answers for interactive merges, keyed by
/// `(source path, original slug)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictResolutions {
    renames: BTreeMap<(PathBuf, String), String>,
}

impl ConflictResolutions {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename the heading `slug` of `source` to `text`.
    #[must_use]
    pub fn rename(
        mut self,
        source: impl Into<PathBuf>,
        slug: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.insert(source, slug, text);
        self
    }

    /// In-place form of [`Self::rename`].
    pub fn insert(
        &mut self,
        source: impl Into<PathBuf>,
        slug: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.renames
            .insert((source.into(), slug.into()), text.into());
    }

    /// Parse `path#slug=New heading text`.
    ///
    /// # Errors
    /// Returns a message when the entry lacks `#` or `=`.
    pub fn parse_entry(entry: &str) -> Result<(PathBuf, String, String), String> {
        let (key, text) = entry
            .split_once('=')
            .ok_or_else(|| format!("expected path#slug=text, got `{entry}`"))?;
        let (path, slug) = key
            .rsplit_once('#')
            .ok_or_else(|| format!("expected path#slug=text, got `{entry}`"))?;
        if path.is_empty() || slug.is_empty() || text.trim().is_empty() {
            return Err(format!("empty path, slug or text in `{entry}`"));
        }
        Ok((PathBuf::from(path), slug.to_string(), text.trim().to_string()))
    }

    /// Number of renames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.renames.len()
    }

    /// Whether no renames are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Same renames with every source path mapped through `canonical`.
    #[must_use]
    pub fn map_paths(&self, canonical: impl Fn(&Path) -> PathBuf) -> Self {
        Self {
            renames: self
                .renames
                .iter()
                .map(|((path, slug), text)| ((canonical(path), slug.clone()), text.clone()))
                .collect(),
        }
    }

    fn get(&self, source: &Path, slug: &str) -> Option<&str> {
        self.renames
            .get(&(source.to_path_buf(), slug.to_string()))
            .map(String::as_str)
    }
}

/// Effective heading texts per document after explicit renames.
fn effective_texts(docs: &[&Document], resolutions: &ConflictResolutions) -> Vec<Vec<String>> {
    docs.iter()
        .map(|doc| {
            doc.headings
                .iter()
                .map(|heading| {
                    resolutions
                        .get(&doc.path, &heading.slug)
                        .map_or_else(|| heading.text.clone(), str::to_string)
                })
                .collect()
        })
        .collect()
}

fn conflicts_in(docs: &[&Document], texts: &[Vec<String>]) -> Vec<HeadingConflict> {
    let mut by_slug: BTreeMap<String, Vec<(usize, usize)>> = BTreeMap::new();
    for (doc_idx, doc_texts) in texts.iter().enumerate() {
        for (heading_idx, text) in doc_texts.iter().enumerate() {
            by_slug
                .entry(slugify(text))
                .or_default()
                .push((doc_idx, heading_idx));
        }
    }

    by_slug
        .into_iter()
        .filter(|(_, hits)| {
            hits.iter()
                .map(|(doc_idx, _)| *doc_idx)
                .collect::<BTreeSet<_>>()
                .len()
                > 1
        })
        .map(|(slug, hits)| HeadingConflict {
            slug,
            occurrences: hits
                .into_iter()
                .map(|(doc_idx, heading_idx)| {
                    let heading = &docs[doc_idx].headings[heading_idx];
                    ConflictOccurrence {
                        source: docs[doc_idx].path.clone(),
                        heading: texts[doc_idx][heading_idx].clone(),
                        slug: heading.slug.clone(),
                        line: heading.line,
                    }
                })
                .collect(),
        })
        .collect()
}

/// Cross-source heading collisions for `docs` in merge order.
#[must_use]
pub fn detect_conflicts(docs: &[&Document]) -> Vec<HeadingConflict> {
    let texts = effective_texts(docs, &ConflictResolutions::default());
    conflicts_in(docs, &texts)
}

/// Settle collisions for `docs` (in merge order).
///
/// Explicit `resolutions` always apply first. `Append` suffixes every source
/// after the first owner of a slug, `Prepend` every source before the last
/// owner; the suffix is ` (<stem>)`, numbered when still taken.
///
/// # Errors
/// Under `Interactive`, the collisions left after applying `resolutions`.
pub fn resolve_conflicts(
    docs: &[&Document],
    strategy: MergeStrategy,
    resolutions: &ConflictResolutions,
) -> Result<Vec<HeadingRename>, Vec<HeadingConflict>> {
    let mut texts = effective_texts(docs, resolutions);
    let remaining = conflicts_in(docs, &texts);

    if !remaining.is_empty() {
        if strategy == MergeStrategy::Interactive {
            return Err(remaining);
        }
        let mut claimed: BTreeSet<String> = texts.iter().flatten().map(|t| slugify(t)).collect();
        for conflict in &remaining {
            let owners: BTreeSet<usize> = conflict
                .occurrences
                .iter()
                .filter_map(|occ| docs.iter().position(|doc| doc.path == occ.source))
                .collect();
            let keeper = match strategy {
                MergeStrategy::Prepend => owners.last().copied(),
                _ => owners.first().copied(),
            };
            for (doc_idx, doc) in docs.iter().enumerate() {
                if Some(doc_idx) == keeper || !owners.contains(&doc_idx) {
                    continue;
                }
                let stem = doc
                    .path
                    .file_stem()
                    .map_or_else(String::new, |s| s.to_string_lossy().to_string());
                for heading_idx in 0..texts[doc_idx].len() {
                    if slugify(&texts[doc_idx][heading_idx]) != conflict.slug {
                        continue;
                    }
                    let base = texts[doc_idx][heading_idx].clone();
                    let mut candidate = format!("{base} ({stem})");
                    let mut counter = 2;
                    while claimed.contains(&slugify(&candidate)) {
                        candidate = format!("{base} ({stem} {counter})");
                        counter += 1;
                    }
                    claimed.insert(slugify(&candidate));
                    texts[doc_idx][heading_idx] = candidate;
                }
            }
        }
    }

    let mut renames = Vec::new();
    for (doc_idx, doc) in docs.iter().enumerate() {
        for (heading_idx, heading) in doc.headings.iter().enumerate() {
            let text = &texts[doc_idx][heading_idx];
            if *text != heading.text {
                renames.push(HeadingRename {
                    doc: doc_idx,
                    heading: heading_idx,
                    text: text.clone(),
                });
            }
        }
    }
    Ok(renames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> (Document, Document) {
        (
            Document::parse("/c/a.md", "# Setup\n\n## Usage\n"),
            Document::parse("/c/b.md", "# Setup\n\n## Notes\n"),
        )
    }

    #[test]
    fn test_detect_cross_source_only() {
        let (a, b) = docs();
        let conflicts = detect_conflicts(&[&a, &b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].slug, "setup");
        assert_eq!(conflicts[0].occurrences.len(), 2);
    }

    #[test]
    fn test_append_suffixes_later_source() {
        let (a, b) = docs();
        let renames = resolve_conflicts(&[&a, &b], MergeStrategy::Append, &ConflictResolutions::new())
            .unwrap_or_default();
        assert_eq!(
            renames,
            vec![HeadingRename {
                doc: 1,
                heading: 0,
                text: "Setup (b)".to_string()
            }]
        );
    }

    #[test]
    fn test_prepend_suffixes_earlier_source() {
        let (a, b) = docs();
        let renames = resolve_conflicts(&[&a, &b], MergeStrategy::Prepend, &ConflictResolutions::new())
            .unwrap_or_default();
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].doc, 0);
        assert_eq!(renames[0].text, "Setup (a)");
    }

    #[test]
    fn test_interactive_needs_resolutions() {
        let (a, b) = docs();
        let pending = resolve_conflicts(&[&a, &b], MergeStrategy::Interactive, &ConflictResolutions::new());
        assert!(matches!(pending, Err(ref conflicts) if conflicts.len() == 1));

        let answers = ConflictResolutions::new().rename("/c/b.md", "setup", "Setup for B");
        let renames = resolve_conflicts(&[&a, &b], MergeStrategy::Interactive, &answers)
            .unwrap_or_default();
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].text, "Setup for B");
    }

    #[test]
    fn test_parse_entry() {
        let parsed = ConflictResolutions::parse_entry("docs/b.md#setup=Setup for B");
        assert_eq!(
            parsed,
            Ok((PathBuf::from("docs/b.md"), "setup".to_string(), "Setup for B".to_string()))
        );
        assert!(ConflictResolutions::parse_entry("docs/b.md=oops").is_err());
    }
}
