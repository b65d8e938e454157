use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::document::paths::is_markdown_path;
use crate::document::{Document, SlugRegistry, Span, slugify};
use crate::error::PlanError;
use crate::strategy::{
    ConflictResolutions, HeadingConflict, HeadingRename, MergeStrategy, OrderStrategy,
    order_sources, resolve_conflicts,
};

use super::rewrite::{Layout, splice};
use super::{ChangeSet, ChangeSetBuilder, ContentSource, OperationKind, Planner, remap_line_anchor};

/// Result of planning a merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Every heading collision is settled.
    Ready(ChangeSet),
    /// Interactive merge: these collisions need explicit heading texts
    /// before the merge can be planned again.
    NeedsResolution(Vec<HeadingConflict>),
}

impl MergeOutcome {
    /// The change set, failing fast when resolutions are still missing.
    ///
    /// # Errors
    /// `PlanError::UnresolvedConflicts` for `NeedsResolution`.
    pub fn into_change_set(self) -> Result<ChangeSet, PlanError> {
        match self {
            Self::Ready(set) => Ok(set),
            Self::NeedsResolution(conflicts) => Err(PlanError::UnresolvedConflicts(conflicts)),
        }
    }
}

/// Concatenate pieces with one blank line between them; returns the text
/// and each piece's start offset.
fn concatenate(pieces: &[String]) -> (String, Vec<usize>) {
    let mut text = String::with_capacity(pieces.iter().map(|piece| piece.len() + 2).sum());
    let mut starts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if !text.is_empty() {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            if !text.ends_with("\n\n") {
                text.push('\n');
            }
        }
        starts.push(text.len());
        text.push_str(piece);
    }
    (text, starts)
}

/// Part of a source that lands in the joined file: everything for the
/// first source, the body after frontmatter for the rest.
fn segment_of(doc: &Document, position: usize) -> Span {
    let start = if position == 0 { 0 } else { doc.frontmatter_end };
    Span::new(start, doc.content.len())
}

impl Planner {
    /// Plan joining `sources` into `destination`.
    ///
    /// Repeated slugs across sources follow the per-document `-n` rule and
    /// every fragment pointing into a source is remapped to the joined slug.
    ///
    /// # Errors
    /// Input errors (unknown, duplicate or non-document sources, destination
    /// collisions), `DependencyCycle` under dependency order, and
    /// `InvalidStrategy` when the joined text would not re-parse into the
    /// same headings and links.
    pub fn plan_join(
        &self,
        sources: &[PathBuf],
        destination: &Path,
        order: OrderStrategy,
    ) -> Result<ChangeSet, PlanError> {
        let (docs, destination) = self.combine_inputs(sources, destination, order)?;
        self.combine(&docs, &destination, &[], OperationKind::Join)
    }

    /// Plan merging `sources` into `destination`, settling heading
    /// collisions with `strategy`.
    ///
    /// `resolutions` apply first under every strategy. `Interactive` returns
    /// [`MergeOutcome::NeedsResolution`] for whatever they leave open.
    ///
    /// # Errors
    /// Same as [`Self::plan_join`].
    pub fn plan_merge(
        &self,
        sources: &[PathBuf],
        destination: &Path,
        strategy: MergeStrategy,
        order: OrderStrategy,
        resolutions: &ConflictResolutions,
    ) -> Result<MergeOutcome, PlanError> {
        let (docs, destination) = self.combine_inputs(sources, destination, order)?;
        let resolutions = resolutions.map_paths(|path| self.corpus().absolute(path));
        match resolve_conflicts(&docs, strategy, &resolutions) {
            Ok(renames) => self
                .combine(&docs, &destination, &renames, OperationKind::Merge)
                .map(MergeOutcome::Ready),
            Err(conflicts) => {
                tracing::info!(
                    conflicts = conflicts.len(),
                    destination = %destination.display(),
                    "merge needs heading resolutions"
                );
                Ok(MergeOutcome::NeedsResolution(conflicts))
            }
        }
    }

    fn combine_inputs(
        &self,
        sources: &[PathBuf],
        destination: &Path,
        order: OrderStrategy,
    ) -> Result<(Vec<&Document>, PathBuf), PlanError> {
        let corpus = self.corpus();
        if sources.len() < 2 {
            return Err(PlanError::InvalidStrategy(
                "joining needs at least two sources".to_string(),
            ));
        }
        let mut docs = Vec::with_capacity(sources.len());
        let mut seen = BTreeSet::new();
        for source in sources {
            let doc = self.document(source)?;
            if !seen.insert(doc.path.clone()) {
                return Err(PlanError::InvalidStrategy(format!(
                    "{} is listed twice",
                    doc.path.display()
                )));
            }
            docs.push(doc);
        }

        let destination = self.scoped(destination)?;
        if !is_markdown_path(&destination) {
            return Err(PlanError::InvalidStrategy(format!(
                "destination {} is not a markdown file",
                destination.display()
            )));
        }
        if !seen.contains(&destination)
            && (corpus.contains(&destination) || corpus.is_directory(&destination))
        {
            return Err(PlanError::DestinationCollision(destination));
        }

        let paths: Vec<PathBuf> = docs.iter().map(|doc| doc.path.clone()).collect();
        let timestamps: Vec<Option<i64>> =
            paths.iter().map(|path| corpus.timestamp(path)).collect();
        let mut depends_on = BTreeSet::new();
        for (from, path) in paths.iter().enumerate() {
            for target in self.graph.outgoing_documents(path) {
                if let Some(to) = paths.iter().position(|candidate| *candidate == target) {
                    depends_on.insert((from, to));
                }
            }
        }
        let ordered = order_sources(order, &paths, &timestamps, &depends_on)?;
        Ok((ordered.into_iter().map(|idx| docs[idx]).collect(), destination))
    }

    fn combine(
        &self,
        docs: &[&Document],
        destination: &Path,
        renames: &[HeadingRename],
        operation: OperationKind,
    ) -> Result<ChangeSet, PlanError> {
        let corpus = self.corpus();
        let segments: Vec<Span> = docs
            .iter()
            .enumerate()
            .map(|(position, doc)| segment_of(doc, position))
            .collect();

        let mut registry = SlugRegistry::new();
        let mut slugs: Vec<Vec<String>> = Vec::with_capacity(docs.len());
        for (position, doc) in docs.iter().enumerate() {
            let mut doc_slugs = Vec::with_capacity(doc.headings.len());
            for (idx, heading) in doc.headings.iter().enumerate() {
                let text = renames
                    .iter()
                    .find(|rename| rename.doc == position && rename.heading == idx)
                    .map_or(heading.text.as_str(), |rename| rename.text.as_str());
                doc_slugs.push(registry.claim(&slugify(text)));
            }
            slugs.push(doc_slugs);
        }

        // Edits never add or remove newlines, so line numbers can be taken
        // from the unedited concatenation.
        let unedited: Vec<String> = docs
            .iter()
            .zip(&segments)
            .map(|(doc, segment)| doc.content[segment.start..segment.end].to_string())
            .collect();
        let (plain, starts) = concatenate(&unedited);
        let first_lines: Vec<usize> = starts
            .iter()
            .map(|start| plain[..*start].matches('\n').count() + 1)
            .collect();

        let relocate = |path: &Path, fragment: Option<&str>| {
            let position = docs.iter().position(|doc| doc.path == path)?;
            let doc = docs[position];
            let Some(fragment) = fragment.filter(|fragment| !fragment.is_empty()) else {
                return Some((destination.to_path_buf(), fragment.map(str::to_string)));
            };
            if let Some(idx) = doc.headings.iter().position(|heading| heading.slug == fragment) {
                return Some((destination.to_path_buf(), Some(slugs[position][idx].clone())));
            }
            let segment_line = doc.line_of(segments[position].start);
            let remapped = remap_line_anchor(fragment, |line| {
                first_lines[position] + line.saturating_sub(segment_line)
            });
            Some((
                destination.to_path_buf(),
                remapped.or_else(|| Some(fragment.to_string())),
            ))
        };

        let vacated: BTreeSet<PathBuf> = docs.iter().map(|doc| doc.path.clone()).collect();
        let layout = Layout::after(corpus, &vacated, [destination.to_path_buf()]);

        let mut pieces = Vec::with_capacity(docs.len());
        for (position, doc) in docs.iter().enumerate() {
            let segment = segments[position];
            // A bare link to another joined source lands on its first heading.
            let internal = |path: &Path, fragment: Option<&str>| {
                if fragment.is_none()
                    && doc.path != path
                    && let Some(other) = docs.iter().position(|other| other.path == path)
                    && let Some(first) = slugs[other].first()
                {
                    return Some((destination.to_path_buf(), Some(first.clone())));
                }
                relocate(path, fragment)
            };
            let mut edits: Vec<(Span, String)> = Vec::new();
            let mut replaced: Vec<Span> = Vec::new();
            for rename in renames.iter().filter(|rename| rename.doc == position) {
                let Some(heading) = doc.headings.get(rename.heading) else {
                    continue;
                };
                let span = heading.text_span;
                if let Some(suffix) = rename.text.strip_prefix(heading.text.as_str()) {
                    edits.push((Span::new(span.end, span.end), suffix.to_string()));
                } else {
                    edits.push((span, rename.text.clone()));
                    replaced.push(span);
                }
            }
            for (index, link) in doc.links.iter().enumerate() {
                if !segment.contains(link.span)
                    || replaced.iter().any(|span| span.contains(link.span))
                {
                    continue;
                }
                if let Some(raw) = self.relink(doc, index, destination, &internal, &layout) {
                    edits.push((link.span, raw));
                }
            }
            edits.sort_by_key(|(span, _)| (span.start, span.end));
            pieces.push(splice(&doc.content, &[segment], &edits));
        }
        let (joined, _) = concatenate(&pieces);

        let parsed = Document::parse_with_mode(destination, joined.as_str(), corpus.mode());
        let expected_links: usize = docs
            .iter()
            .zip(&segments)
            .map(|(doc, segment)| {
                doc.links
                    .iter()
                    .filter(|link| segment.contains(link.span))
                    .count()
            })
            .sum();
        let expected_slugs: Vec<&String> = slugs.iter().flatten().collect();
        let parsed_slugs: Vec<&String> = parsed.headings.iter().map(|heading| &heading.slug).collect();
        if parsed.links.len() != expected_links || parsed_slugs != expected_slugs {
            return Err(PlanError::InvalidStrategy(format!(
                "joined text for {} does not re-parse into the source headings and links \
                 (unclosed code fence?)",
                destination.display()
            )));
        }

        let mut builder = ChangeSetBuilder::new();
        if vacated.contains(destination) {
            builder.modify(destination, ContentSource::Text(joined))?;
        } else {
            builder.create(destination, ContentSource::Text(joined))?;
        }
        for doc in docs {
            if doc.path != destination {
                builder.delete(&doc.path);
            }
        }
        self.relink_referrers(&vacated, &relocate, &layout, &mut builder);

        let set = builder.build(operation, corpus.clone())?;
        tracing::info!(
            ?operation,
            sources = docs.len(),
            destination = %destination.display(),
            renamed_headings = renames.len(),
            changes = set.len(),
            "planned combine"
        );
        Ok(set)
    }
}
