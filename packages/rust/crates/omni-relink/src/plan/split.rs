use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::document::paths::{encode_destination, relative_path, trim_md_extension};
use crate::document::{Document, ParseMode, Span, parse_line_anchor};
use crate::error::PlanError;
use crate::strategy::{SplitStrategy, partition};

use super::rewrite::{Layout, splice};
use super::{ChangeSet, ChangeSetBuilder, ContentSource, OperationKind, Planner, remap_line_anchor};

/// Split output switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Keep the source path as an index: its preamble plus a table of
    /// contents. When off the source is deleted and the preamble opens the
    /// first part.
    pub toc: bool,
    /// Directory for the parts; the source's directory when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            toc: true,
            output_dir: None,
        }
    }
}

/// One file written by the split, built from source byte ranges.
struct Output {
    path: PathBuf,
    title: String,
    segments: Vec<Span>,
    /// Parse of the unedited segment text, for slug and line lookups.
    parsed: Document,
}

impl Output {
    fn new(doc: &Document, path: PathBuf, title: String, segments: Vec<Span>) -> Self {
        let text = splice(&doc.content, &segments, &[]);
        let parsed = Document::parse_with_mode(path.clone(), text, doc.mode());
        Self {
            path,
            title,
            segments,
            parsed,
        }
    }

    fn holds(&self, span: Span) -> bool {
        self.segments.iter().any(|segment| segment.contains(span))
    }
}

/// Where each byte of the source ends up.
struct SplitMap<'a> {
    doc: &'a Document,
    outputs: Vec<Output>,
}

impl SplitMap<'_> {
    /// Output index and offset inside it for a source offset.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        for (idx, output) in self.outputs.iter().enumerate() {
            let mut base = 0;
            for segment in &output.segments {
                if segment.start <= offset && offset < segment.end {
                    return Some((idx, base + offset - segment.start));
                }
                base += segment.end - segment.start;
            }
        }
        None
    }

    /// New home of `source#fragment`; bare links go to the first output.
    fn relocate(&self, fragment: Option<&str>) -> (PathBuf, Option<String>) {
        let fallback = || (self.outputs[0].path.clone(), fragment.map(str::to_string));
        let Some(fragment) = fragment.filter(|fragment| !fragment.is_empty()) else {
            return fallback();
        };
        if let Some(heading) = self.doc.heading(fragment)
            && let Some((out, offset)) = self.locate(heading.offset)
        {
            let output = &self.outputs[out];
            let slug = output
                .parsed
                .headings
                .iter()
                .find(|heading| heading.offset == offset)
                .map_or_else(|| fragment.to_string(), |heading| heading.slug.clone());
            return (output.path.clone(), Some(slug));
        }
        if let Some((first, _)) = parse_line_anchor(fragment)
            && let Some((out, _)) = self.locate(self.doc.line_offset(first))
        {
            let output = &self.outputs[out];
            let remapped = remap_line_anchor(fragment, |line| {
                match self.locate(self.doc.line_offset(line)) {
                    Some((owner, offset)) if owner == out => output.parsed.line_of(offset),
                    _ => output.parsed.line_count.max(1),
                }
            });
            return (output.path.clone(), remapped.or_else(|| Some(fragment.to_string())));
        }
        fallback()
    }
}

impl Planner {
    /// Plan splitting `source` into parts chosen by `strategy`.
    ///
    /// Links between parts become cross-file links with their fragments
    /// remapped to the part-local slugs; links from elsewhere to
    /// `source#fragment` follow the part that owns the fragment.
    ///
    /// # Errors
    /// `UnknownSource`/`NotADocument` for a bad source, `InvalidStrategy`
    /// when the strategy yields fewer than two parts, `OutsideCorpus` for an
    /// output directory outside the root.
    pub fn plan_split(
        &self,
        source: &Path,
        strategy: &SplitStrategy,
        options: &SplitOptions,
    ) -> Result<ChangeSet, PlanError> {
        let corpus = self.corpus();
        let doc = self.document(source)?;
        let partition = partition(doc, strategy)?;

        let dir = match &options.output_dir {
            Some(dir) => self.scoped(dir)?,
            None => doc
                .path
                .parent()
                .map_or_else(|| corpus.root().to_path_buf(), Path::to_path_buf),
        };
        let stem = doc
            .path
            .file_stem()
            .map_or_else(|| "part".to_string(), |stem| stem.to_string_lossy().to_string());
        let ext = doc
            .path
            .extension()
            .map_or_else(|| "md".to_string(), |ext| ext.to_string_lossy().to_string());

        let mut outputs = Vec::with_capacity(partition.parts.len() + 1);
        if options.toc {
            outputs.push(Output::new(
                doc,
                doc.path.clone(),
                stem.clone(),
                vec![partition.preamble],
            ));
        }
        let mut taken = BTreeSet::new();
        for (idx, part) in partition.parts.iter().enumerate() {
            let name = part
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("{stem}-{}", idx + 1));
            let path = self.free_part_path(&dir, &name, &ext, &mut taken)?;
            let mut segments = vec![part.range];
            if idx == 0 && !options.toc && partition.preamble.start < partition.preamble.end {
                segments.insert(0, partition.preamble);
            }
            let title = part.title.clone().unwrap_or(name);
            outputs.push(Output::new(doc, path, title, segments));
        }

        let map = SplitMap { doc, outputs };
        let removed: BTreeSet<PathBuf> = if options.toc {
            BTreeSet::new()
        } else {
            BTreeSet::from([doc.path.clone()])
        };
        let layout = Layout::after(
            corpus,
            &removed,
            map.outputs.iter().map(|output| output.path.clone()),
        );
        let relocate = |path: &Path, fragment: Option<&str>| {
            if path != doc.path {
                return None;
            }
            let moved = map.relocate(fragment);
            (moved.0 != path || moved.1.as_deref() != fragment).then_some(moved)
        };

        let mut builder = ChangeSetBuilder::new();
        for output in &map.outputs {
            let edits: Vec<(Span, String)> = doc
                .links
                .iter()
                .enumerate()
                .filter(|(_, link)| output.holds(link.span))
                .filter_map(|(index, link)| {
                    self.relink(doc, index, &output.path, &relocate, &layout)
                        .map(|raw| (link.span, raw))
                })
                .collect();
            let text = splice(&doc.content, &output.segments, &edits);
            if output.path == doc.path {
                let index = with_table_of_contents(text, &doc.path, &map.outputs[1..], doc.mode());
                builder.modify(&doc.path, ContentSource::Text(index))?;
            } else {
                builder.create(&output.path, ContentSource::Text(text))?;
            }
        }
        if !options.toc {
            builder.delete(&doc.path);
        }
        self.relink_referrers(
            &BTreeSet::from([doc.path.clone()]),
            &relocate,
            &layout,
            &mut builder,
        );

        let set = builder.build(OperationKind::Split, corpus.clone())?;
        tracing::info!(
            source = %doc.path.display(),
            strategy = ?strategy.kind(),
            parts = partition.parts.len(),
            changes = set.len(),
            "planned split"
        );
        Ok(set)
    }

    /// `dir/name.ext`, numbered until it is free in the snapshot and among
    /// the parts already named.
    fn free_part_path(
        &self,
        dir: &Path,
        name: &str,
        ext: &str,
        taken: &mut BTreeSet<PathBuf>,
    ) -> Result<PathBuf, PlanError> {
        let corpus = self.corpus();
        let mut candidate = self.scoped(&dir.join(format!("{name}.{ext}")))?;
        let mut counter = 2;
        while taken.contains(&candidate)
            || corpus.contains(&candidate)
            || corpus.is_directory(&candidate)
        {
            candidate = dir.join(format!("{name}-{counter}.{ext}"));
            counter += 1;
        }
        if candidate.file_stem().is_some_and(|stem| stem.to_string_lossy() != name) {
            tracing::warn!(name, path = %candidate.display(), "split part renamed to stay unique");
        }
        taken.insert(candidate.clone());
        Ok(candidate)
    }
}

/// `preamble` followed by a list linking every part, in the link family
/// the corpus is parsed with.
fn with_table_of_contents(
    preamble: String,
    source: &Path,
    parts: &[Output],
    mode: ParseMode,
) -> String {
    let mut text = preamble;
    if !text.is_empty() {
        if !text.ends_with('\n') {
            text.push('\n');
        }
        if !text.ends_with("\n\n") {
            text.push('\n');
        }
    }
    let from = source.parent().unwrap_or(source);
    for part in parts {
        let rel = relative_path(from, &part.path);
        let title = part.title.replace(['[', ']'], "");
        let entry = match mode {
            ParseMode::Wikilink => format!("- [[{}|{title}]]", trim_md_extension(&rel)),
            ParseMode::Claude => {
                let rel = if rel.starts_with("../") { rel } else { format!("./{rel}") };
                format!("- {title}: @{rel}")
            }
            ParseMode::Markdown | ParseMode::Combined => {
                format!("- [{title}]({})", encode_destination(&rel))
            }
        };
        text.push_str(&entry);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::corpus::Corpus;
    use crate::plan::Change;

    const GUIDE: &str = "# Intro\n\nWelcome, see [details](#details).\n\n# Details\n\nBack to [intro](#intro) or [line](#L3).\n";

    fn planner() -> Planner {
        Planner::new(Arc::new(Corpus::from_documents(
            "/c",
            [("guide.md", GUIDE), ("other.md", "[d](guide.md#details) [g](guide.md)\n")],
        )))
    }

    fn content_of(set: &ChangeSet, path: &str) -> Option<String> {
        set.changes().iter().find_map(|change| match change {
            Change::FileCreated {
                path: p,
                content: ContentSource::Text(text),
            }
            | Change::FileModified {
                path: p,
                content: ContentSource::Text(text),
            } if p == Path::new(path) => Some(text.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_split_by_headers_with_toc() -> Result<(), PlanError> {
        let planner = planner();
        let set = planner.plan_split(
            Path::new("guide.md"),
            &SplitStrategy::Headers { level: None },
            &SplitOptions::default(),
        )?;
        assert_eq!(
            content_of(&set, "/c/intro.md").as_deref(),
            Some("# Intro\n\nWelcome, see [details](details.md#details).\n\n")
        );
        assert_eq!(
            content_of(&set, "/c/details.md").as_deref(),
            Some("# Details\n\nBack to [intro](intro.md#intro) or [line](intro.md#L3).\n")
        );
        assert_eq!(
            content_of(&set, "/c/guide.md").as_deref(),
            Some("- [Intro](intro.md)\n- [Details](details.md)\n")
        );
        let updates: Vec<&str> = set
            .link_updates()
            .filter_map(|change| match change {
                Change::LinkUpdated { new_value, .. } => Some(new_value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["[d](details.md#details)"]);
        Ok(())
    }

    #[test]
    fn test_split_without_toc_deletes_source() -> Result<(), PlanError> {
        let planner = planner();
        let set = planner.plan_split(
            Path::new("guide.md"),
            &SplitStrategy::Headers { level: None },
            &SplitOptions {
                toc: false,
                output_dir: Some(PathBuf::from("parts")),
            },
        )?;
        assert!(content_of(&set, "/c/parts/intro.md").is_some());
        assert!(matches!(
            set.changes().last(),
            Some(Change::FileDeleted { path }) if path == Path::new("/c/guide.md")
        ));
        let updates: Vec<&str> = set
            .link_updates()
            .filter_map(|change| match change {
                Change::LinkUpdated { new_value, .. } => Some(new_value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            updates,
            vec!["[g](parts/intro.md)", "[d](parts/details.md#details)"]
        );
        Ok(())
    }

    #[test]
    fn test_single_part_is_rejected() {
        let planner = Planner::new(Arc::new(Corpus::from_documents("/c", [("a.md", "# Only\n")])));
        let result = planner.plan_split(
            Path::new("a.md"),
            &SplitStrategy::Headers { level: Some(1) },
            &SplitOptions::default(),
        );
        assert!(matches!(result, Err(PlanError::InvalidStrategy(_))));
    }
}
