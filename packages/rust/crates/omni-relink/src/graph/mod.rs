//! Link graph over a corpus snapshot.
//!
//! The incoming index is derived from the documents once, at build time,
//! and never edited afterwards.

mod resolve;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::document::Link;

pub use self::resolve::{BrokenKind, Resolution, ResolveVia, resolve};

/// One link occurrence, addressed by its document and position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkRef {
    /// Referring document.
    pub source: PathBuf,
    /// Index into the referring document's `links`.
    pub index: usize,
}

/// A link that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    /// Referring document.
    pub source: PathBuf,
    /// 1-based line of the link.
    pub line: usize,
    /// The occurrence.
    pub link: Link,
    /// Missing file or dangling fragment.
    pub kind: BrokenKind,
    /// File the link was resolved to.
    pub target: PathBuf,
}

type FragmentIndex = BTreeMap<Option<String>, Vec<LinkRef>>;

/// Resolved links of a corpus plus the reverse index
/// `(target path, fragment) -> referring occurrences`.
#[derive(Debug, Clone)]
pub struct LinkGraph {
    corpus: Arc<Corpus>,
    resolutions: BTreeMap<PathBuf, Vec<Resolution>>,
    incoming: BTreeMap<PathBuf, FragmentIndex>,
}

impl LinkGraph {
    /// Resolve every link of every document.
    #[must_use]
    pub fn build(corpus: Arc<Corpus>) -> Self {
        let mut resolutions = BTreeMap::new();
        let mut incoming: BTreeMap<PathBuf, FragmentIndex> = BTreeMap::new();
        for doc in corpus.documents() {
            let resolved: Vec<Resolution> = doc
                .links
                .iter()
                .map(|link| resolve(&corpus, &doc.path, link))
                .collect();
            for (index, resolution) in resolved.iter().enumerate() {
                let (path, fragment) = match resolution {
                    Resolution::Document { path, fragment, .. } => (path, fragment.clone()),
                    Resolution::Asset { path, .. } | Resolution::Missing { path, .. } => {
                        (path, None)
                    }
                    _ => continue,
                };
                incoming
                    .entry(path.clone())
                    .or_default()
                    .entry(fragment)
                    .or_default()
                    .push(LinkRef {
                        source: doc.path.clone(),
                        index,
                    });
            }
            resolutions.insert(doc.path.clone(), resolved);
        }
        tracing::debug!(
            documents = resolutions.len(),
            targets = incoming.len(),
            "built link graph"
        );
        Self {
            corpus,
            resolutions,
            incoming,
        }
    }

    /// Snapshot the graph was built from.
    #[must_use]
    pub const fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Resolutions of `source`'s links, parallel to its `links`.
    #[must_use]
    pub fn resolutions(&self, source: &Path) -> &[Resolution] {
        self.resolutions.get(source).map_or(&[], Vec::as_slice)
    }

    /// Every occurrence resolving to `target`, any fragment.
    pub fn referrers(&self, target: &Path) -> impl Iterator<Item = &LinkRef> {
        self.incoming
            .get(target)
            .into_iter()
            .flat_map(|by_fragment| by_fragment.values().flatten())
    }

    /// Occurrences resolving to `target` with exactly `fragment`.
    #[must_use]
    pub fn referrers_to(&self, target: &Path, fragment: Option<&str>) -> &[LinkRef] {
        self.incoming
            .get(target)
            .and_then(|by_fragment| by_fragment.get(&fragment.map(str::to_string)))
            .map_or(&[], Vec::as_slice)
    }

    /// Documents that link to any of `targets`, excluding the targets themselves.
    #[must_use]
    pub fn referring_documents(&self, targets: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
        targets
            .iter()
            .flat_map(|target| self.referrers(target))
            .map(|link_ref| link_ref.source.clone())
            .filter(|source| !targets.contains(source))
            .collect()
    }

    /// Documents `source` links to (resolved documents only, self excluded).
    #[must_use]
    pub fn outgoing_documents(&self, source: &Path) -> BTreeSet<PathBuf> {
        self.resolutions(source)
            .iter()
            .filter_map(|resolution| match resolution {
                Resolution::Document { path, .. } if path != source => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Broken links written in `source`.
    #[must_use]
    pub fn broken_links_in(&self, source: &Path) -> Vec<BrokenLink> {
        let Some(doc) = self.corpus.document(source) else {
            return Vec::new();
        };
        self.resolutions(source)
            .iter()
            .zip(&doc.links)
            .filter_map(|(resolution, link)| {
                let kind = resolution.broken()?;
                let target = match resolution {
                    Resolution::Document { path, .. } | Resolution::Missing { path, .. } => {
                        path.clone()
                    }
                    _ => return None,
                };
                Some(BrokenLink {
                    source: source.to_path_buf(),
                    line: doc.line_of(link.span.start),
                    link: link.clone(),
                    kind,
                    target,
                })
            })
            .collect()
    }

    /// Every broken link in the corpus.
    #[must_use]
    pub fn broken_links(&self) -> Vec<BrokenLink> {
        self.resolutions
            .keys()
            .flat_map(|source| self.broken_links_in(source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_index_by_fragment() {
        let corpus = Arc::new(Corpus::from_documents(
            "/c",
            [
                ("a.md", "[b](b.md) and [b sec](b.md#sec)\n"),
                ("b.md", "# Sec\n[self](#sec)\n"),
                ("c.md", "[[b#sec]] [gone](gone.md)\n"),
            ],
        ));
        let graph = LinkGraph::build(corpus);
        let b = Path::new("/c/b.md");
        assert_eq!(graph.referrers(b).count(), 4);
        assert_eq!(graph.referrers_to(b, None).len(), 1);
        assert_eq!(graph.referrers_to(b, Some("sec")).len(), 3);
        assert_eq!(
            graph.outgoing_documents(Path::new("/c/a.md")),
            BTreeSet::from([PathBuf::from("/c/b.md")])
        );

        let broken = graph.broken_links();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].kind, BrokenKind::MissingFile);
        assert_eq!(broken[0].source, PathBuf::from("/c/c.md"));
    }
}
