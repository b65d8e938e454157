//! Operation planning: move, split, join, merge and convert.
//!
//! Planners only read the snapshot and its link graph. Every operation ends
//! in a [`ChangeSet`] or a [`PlanError`]; nothing here touches disk.

mod change;
mod convert;
mod join;
mod move_op;
mod rewrite;
mod split;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::document::{Document, LinkStyle, parse_line_anchor};
use crate::error::PlanError;
use crate::graph::{LinkGraph, Resolution, ResolveVia};

pub use self::change::{Change, ChangeSet, ContentSource, OperationKind};
pub use self::join::MergeOutcome;
pub use self::move_op::MoveOptions;
pub use self::split::SplitOptions;

pub(crate) use self::change::ChangeSetBuilder;
use self::rewrite::{Layout, TargetForm, retarget};

/// Maps an old `(file, fragment)` to its new location, `None` when it stays put.
type Relocate<'a> = dyn Fn(&Path, Option<&str>) -> Option<(PathBuf, Option<String>)> + 'a;

/// Plans operations against one corpus snapshot.
#[derive(Debug, Clone)]
pub struct Planner {
    graph: LinkGraph,
}

impl Planner {
    /// Build the link graph of `corpus` and plan against it.
    #[must_use]
    pub fn new(corpus: Arc<Corpus>) -> Self {
        Self {
            graph: LinkGraph::build(corpus),
        }
    }

    /// Link graph of the snapshot.
    #[must_use]
    pub const fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    /// The snapshot.
    #[must_use]
    pub const fn corpus(&self) -> &Arc<Corpus> {
        self.graph.corpus()
    }

    fn document(&self, path: &Path) -> Result<&Document, PlanError> {
        let path = self.corpus().absolute(path);
        if let Some(doc) = self.corpus().document(&path) {
            return Ok(doc);
        }
        if self.corpus().is_asset(&path) {
            Err(PlanError::NotADocument(path))
        } else {
            Err(PlanError::UnknownSource(path))
        }
    }

    fn scoped(&self, path: &Path) -> Result<PathBuf, PlanError> {
        let path = self.corpus().absolute(path);
        if !self.corpus().in_scope(&path) || self.corpus().is_excluded(&path) {
            return Err(PlanError::OutsideCorpus(path));
        }
        Ok(path)
    }

    /// New raw syntax for link `index` of `doc` once `doc` lives at
    /// `new_source` and targets have moved per `relocate`; `None` when the
    /// written text can stay.
    fn relink(
        &self,
        doc: &Document,
        index: usize,
        new_source: &Path,
        relocate: &Relocate<'_>,
        layout: &Layout,
    ) -> Option<String> {
        let link = doc.links.get(index)?;
        let resolution = self.graph.resolutions(&doc.path).get(index)?;
        let root = self.corpus().root();
        let source_moved = new_source != doc.path;

        let raw = match resolution {
            Resolution::External => return None,
            Resolution::OutOfScope { path } => {
                if !source_moved || !written_relative(link.style, &link.target) {
                    return None;
                }
                retarget(
                    link,
                    TargetForm::Relative,
                    new_source,
                    path,
                    link.fragment.as_deref(),
                    root,
                    layout,
                )
            }
            Resolution::Document {
                path, fragment, via, ..
            } => {
                let relocated = relocate(path, fragment.as_deref());
                if !source_moved
                    && relocated.is_none()
                    && (*via != ResolveVia::Stem || layout.stem_unique(path))
                {
                    return None;
                }
                let (target, new_fragment) =
                    relocated.unwrap_or_else(|| (path.clone(), fragment.clone()));
                let was_other_file = *path != doc.path;
                let collapse = target == new_source
                    && new_fragment.is_some()
                    && link.style != LinkStyle::ClaudeMention
                    && (*via == ResolveVia::SameDocument || was_other_file);
                if collapse {
                    Some(link.with_destination("", new_fragment.as_deref()).raw)
                } else if *via == ResolveVia::SameDocument && target == new_source {
                    return (new_fragment != *fragment)
                        .then(|| link.with_destination("", new_fragment.as_deref()).raw);
                } else {
                    retarget(
                        link,
                        TargetForm::from_via(*via),
                        new_source,
                        &target,
                        new_fragment.as_deref(),
                        root,
                        layout,
                    )
                }
            }
            Resolution::Asset { path, via } | Resolution::Missing { path, via } => {
                let relocated = relocate(path, None).map(|(moved, _)| moved);
                if !source_moved && relocated.is_none() {
                    return None;
                }
                let target = relocated.unwrap_or_else(|| path.clone());
                retarget(
                    link,
                    TargetForm::from_via(*via),
                    new_source,
                    &target,
                    link.fragment.as_deref(),
                    root,
                    layout,
                )
            }
        };
        let Some(raw) = raw else {
            tracing::warn!(
                source = %doc.path.display(),
                link = %link.raw,
                "new target cannot be written in this link's syntax; left unchanged"
            );
            return None;
        };
        if raw == link.raw {
            return None;
        }
        tracing::debug!(
            source = %doc.path.display(),
            old = %link.raw,
            new = %raw,
            "relinked"
        );
        Some(raw)
    }

    /// Link updates for every document outside `skip` that stays where it is.
    fn relink_referrers(
        &self,
        skip: &BTreeSet<PathBuf>,
        relocate: &Relocate<'_>,
        layout: &Layout,
        builder: &mut ChangeSetBuilder,
    ) {
        for doc in self.corpus().documents() {
            if skip.contains(&doc.path) {
                continue;
            }
            for (index, link) in doc.links.iter().enumerate() {
                if let Some(raw) = self.relink(doc, index, &doc.path, relocate, layout) {
                    builder.update_link(&doc.path, link.span, &link.raw, &raw);
                }
            }
        }
    }
}

/// Whether a target is written relative to the referring file.
fn written_relative(style: LinkStyle, target: &str) -> bool {
    match style {
        LinkStyle::InlineMarkdown | LinkStyle::EmbedImage | LinkStyle::ReferenceMarkdown => {
            !target.starts_with('/') && !Path::new(target).is_absolute()
        }
        LinkStyle::ClaudeMention => target.starts_with("./") || target.starts_with("../"),
        LinkStyle::Wikilink => false,
    }
}

/// Map a line anchor through `line_map` (old line to new line); `None` for
/// fragments that are not line anchors.
fn remap_line_anchor(fragment: &str, line_map: impl Fn(usize) -> usize) -> Option<String> {
    let (first, last) = parse_line_anchor(fragment)?;
    let first = line_map(first);
    let last = line_map(last).max(first);
    Some(if first == last {
        format!("L{first}")
    } else {
        format!("L{first}-L{last}")
    })
}
