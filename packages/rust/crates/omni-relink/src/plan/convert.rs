use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::document::{Document, Link, LinkStyle};
use crate::error::PlanError;
use crate::graph::{Resolution, ResolveVia, resolve};
use crate::strategy::{LinkStyleTarget, PathResolution, restyle, target_style};

use super::rewrite::{Layout, PathStyle, TargetForm, render_target};
use super::{ChangeSet, ChangeSetBuilder, OperationKind, Planner};

/// Characters a mention may directly follow.
fn mention_boundary_ok(content: &str, offset: usize) -> bool {
    content[..offset]
        .chars()
        .next_back()
        .is_none_or(|prev| prev.is_whitespace() || prev == '(' || prev == '[')
}

impl Planner {
    /// Plan rewriting link syntax in `files` (every document when empty)
    /// without changing what any link resolves to.
    ///
    /// `style` restyles links (`Combined` keeps each link's style);
    /// `resolution` re-paths them as root-absolute or relative. External,
    /// missing and out-of-scope links are left alone, as is any rewrite that
    /// would not re-parse to the same target. Planning the same conversion
    /// on the result yields nothing.
    ///
    /// # Errors
    /// `InvalidStrategy` when neither a style nor a resolution is requested,
    /// plus the usual source errors.
    pub fn plan_convert(
        &self,
        files: &[PathBuf],
        style: Option<LinkStyleTarget>,
        resolution: Option<PathResolution>,
    ) -> Result<ChangeSet, PlanError> {
        let corpus = self.corpus();
        let restyling = style.filter(|style| *style != LinkStyleTarget::Combined);
        if restyling.is_none() && resolution.is_none() {
            return Err(PlanError::InvalidStrategy(
                "convert needs a link style other than combined or a path resolution".to_string(),
            ));
        }

        let docs: Vec<&Document> = if files.is_empty() {
            corpus.documents().collect()
        } else {
            let mut seen = BTreeSet::new();
            let mut docs = Vec::with_capacity(files.len());
            for file in files {
                let doc = self.document(file)?;
                if seen.insert(doc.path.clone()) {
                    docs.push(doc);
                }
            }
            docs
        };

        let layout = Layout::after(corpus, &BTreeSet::new(), Vec::new());
        let mut builder = ChangeSetBuilder::new();
        let mut skipped = 0usize;
        for doc in docs {
            let resolutions = self.graph.resolutions(&doc.path);
            for (link, resolved) in doc.links.iter().zip(resolutions) {
                let Some(raw) =
                    self.converted(doc, link, resolved, restyling, resolution, &layout)
                else {
                    continue;
                };
                if self.round_trips(doc, link, resolved, &raw) {
                    builder.update_link(&doc.path, link.span, &link.raw, &raw);
                } else {
                    skipped += 1;
                    tracing::warn!(
                        source = %doc.path.display(),
                        link = %link.raw,
                        attempted = %raw,
                        "conversion skipped: result would not resolve the same way"
                    );
                }
            }
        }

        let set = builder.build(OperationKind::Convert, corpus.clone())?;
        tracing::info!(
            style = ?style,
            resolution = ?resolution,
            updates = set.len(),
            skipped,
            "planned convert"
        );
        Ok(set)
    }

    fn converted(
        &self,
        doc: &Document,
        link: &Link,
        resolved: &Resolution,
        style: Option<LinkStyleTarget>,
        resolution: Option<PathResolution>,
        layout: &Layout,
    ) -> Option<String> {
        let (target, via, is_document) = match resolved {
            Resolution::Document { path, via, .. } => (path, *via, true),
            Resolution::Asset { path, via } => (path, *via, false),
            _ => return None,
        };
        let next_style = style
            .and_then(|style| target_style(link, style, is_document))
            .unwrap_or(link.style);
        let restyled = next_style != link.style;
        if !restyled && resolution.is_none() {
            return None;
        }
        if next_style == LinkStyle::ClaudeMention && !mention_boundary_ok(&doc.content, link.span.start)
        {
            return None;
        }

        let text = if via == ResolveVia::SameDocument {
            String::new()
        } else {
            let form = match resolution {
                Some(PathResolution::Absolute) => TargetForm::RootAbsolute,
                Some(PathResolution::Relative) => TargetForm::Relative,
                None if via == ResolveVia::FsAbsolute => TargetForm::FsAbsolute,
                None => TargetForm::from_via(via),
            };
            let path_style = if restyled {
                PathStyle::restyled(link, next_style)
            } else {
                PathStyle::of(link)
            };
            render_target(path_style, form, &doc.path, target, self.corpus().root(), layout)
        };
        let raw = if restyled {
            restyle(link, next_style, &text, link.fragment.as_deref()).raw
        } else {
            link.with_destination(&text, link.fragment.as_deref()).raw
        };
        (raw != link.raw).then_some(raw)
    }

    /// Whether `raw`, put in place of `link`, parses as one link of the same
    /// resolved file and fragment.
    fn round_trips(&self, doc: &Document, link: &Link, resolved: &Resolution, raw: &str) -> bool {
        let mut content = doc.content.clone();
        content.replace_range(link.span.start..link.span.end, raw);
        let reparsed = doc.reparse(content);
        let Some(candidate) = reparsed
            .links
            .iter()
            .find(|candidate| candidate.span.start == link.span.start)
        else {
            return false;
        };
        if candidate.raw != raw || reparsed.links.len() != doc.links.len() {
            return false;
        }
        let again = resolve(self.corpus(), &doc.path, candidate);
        again.path() == resolved.path() && candidate.fragment == link.fragment
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::corpus::Corpus;
    use crate::plan::Change;

    fn planner() -> Planner {
        Planner::new(Arc::new(Corpus::from_documents(
            "/c",
            [
                (
                    "docs/a.md",
                    "# A\n\n[[b#usage|usage]] and [b](./b.md) and @docs/b.md and [web](https://x.io)\n",
                ),
                ("docs/b.md", "# B\n\n## Usage\n"),
            ],
        )))
    }

    fn new_values(set: &ChangeSet) -> Vec<String> {
        let mut values: Vec<String> = set
            .link_updates()
            .filter_map(|change| match change {
                Change::LinkUpdated { new_value, .. } => Some(new_value.clone()),
                _ => None,
            })
            .collect();
        values.sort();
        values
    }

    #[test]
    fn test_convert_to_markdown() -> Result<(), PlanError> {
        let planner = planner();
        let set = planner.plan_convert(&[], Some(LinkStyleTarget::Markdown), None)?;
        assert_eq!(
            new_values(&set),
            vec!["[docs/b.md](b.md)".to_string(), "[usage](b.md#usage)".to_string()]
        );
        assert_eq!(set.touched_paths().len(), 1);
        Ok(())
    }

    #[test]
    fn test_convert_to_absolute_paths() -> Result<(), PlanError> {
        let planner = planner();
        let set = planner.plan_convert(
            &[PathBuf::from("docs/a.md")],
            None,
            Some(PathResolution::Absolute),
        )?;
        assert_eq!(
            new_values(&set),
            vec![
                "@/docs/b.md".to_string(),
                "[[/docs/b#usage|usage]]".to_string(),
                "[b](/docs/b.md)".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_nothing_requested_is_invalid() {
        let planner = planner();
        let result = planner.plan_convert(&[], Some(LinkStyleTarget::Combined), None);
        assert!(matches!(result, Err(PlanError::InvalidStrategy(_))));
    }
}
