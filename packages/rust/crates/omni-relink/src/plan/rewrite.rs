//! Target-text rendering that preserves how a link was written.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::corpus::Corpus;
use crate::document::paths::{
    encode_destination, file_stem_lower, has_md_extension, is_markdown_path, relative_path,
    root_relative, to_slash, trim_md_extension,
};
use crate::document::{Document, Link, LinkStyle, ParseMode, Span};
use crate::graph::ResolveVia;
use crate::strategy::restyle;

/// File layout after an operation, for stem-uniqueness checks.
#[derive(Debug, Default)]
pub(crate) struct Layout {
    stems: HashMap<String, usize>,
    mode: ParseMode,
}

impl Layout {
    /// Corpus files minus `removed`, plus `added`.
    pub(crate) fn after(
        corpus: &Corpus,
        removed: &BTreeSet<PathBuf>,
        added: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        let mut files: BTreeSet<PathBuf> = corpus
            .documents()
            .map(|doc| doc.path.clone())
            .chain(corpus.assets().iter().cloned())
            .filter(|path| !removed.contains(path))
            .collect();
        files.extend(added);
        let mut stems: HashMap<String, usize> = HashMap::new();
        for path in &files {
            *stems.entry(file_stem_lower(path)).or_default() += 1;
        }
        Self {
            stems,
            mode: corpus.mode(),
        }
    }

    pub(crate) fn stem_unique(&self, path: &Path) -> bool {
        self.stems.get(&file_stem_lower(path)).copied() == Some(1)
    }
}

/// Path form of a rendered target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetForm {
    Relative,
    RootAbsolute,
    FsAbsolute,
    RootRelative,
    Stem,
}

impl TargetForm {
    pub(crate) const fn from_via(via: ResolveVia) -> Self {
        match via {
            ResolveVia::SameDocument | ResolveVia::Relative => Self::Relative,
            ResolveVia::RootAbsolute => Self::RootAbsolute,
            ResolveVia::FsAbsolute => Self::FsAbsolute,
            ResolveVia::RootRelative => Self::RootRelative,
            ResolveVia::Stem => Self::Stem,
        }
    }
}

/// Surface conventions carried from the original link text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathStyle {
    pub style: LinkStyle,
    pub angle: bool,
    pub dot_slash: bool,
    pub keep_ext: bool,
}

impl PathStyle {
    pub(crate) fn of(link: &Link) -> Self {
        Self {
            style: link.style,
            angle: link.shape.angle,
            dot_slash: link.target.starts_with("./"),
            keep_ext: link.style != LinkStyle::Wikilink || has_md_extension(&link.target),
        }
    }

    pub(crate) fn restyled(link: &Link, style: LinkStyle) -> Self {
        if style == link.style {
            return Self::of(link);
        }
        Self {
            style,
            angle: false,
            dot_slash: link.target.starts_with("./"),
            keep_ext: style != LinkStyle::Wikilink,
        }
    }

    const fn is_markdown(self) -> bool {
        matches!(
            self.style,
            LinkStyle::InlineMarkdown | LinkStyle::EmbedImage | LinkStyle::ReferenceMarkdown
        )
    }
}

fn relative_text(style: PathStyle, source: &Path, target: &Path) -> String {
    let from = source.parent().unwrap_or(source);
    let rel = relative_path(from, target);
    let explicit = style.style == LinkStyle::ClaudeMention || style.dot_slash;
    if explicit && !rel.starts_with("../") {
        format!("./{rel}")
    } else {
        rel
    }
}

/// Target text for a link written in `source` pointing at `target`.
pub(crate) fn render_target(
    style: PathStyle,
    form: TargetForm,
    source: &Path,
    target: &Path,
    root: &Path,
    layout: &Layout,
) -> String {
    let form = match form {
        // Bare paths mean "relative" in markdown.
        TargetForm::RootRelative if style.is_markdown() => TargetForm::Relative,
        TargetForm::Stem if style.style != LinkStyle::Wikilink => TargetForm::Relative,
        TargetForm::Stem if !layout.stem_unique(target) => TargetForm::Relative,
        other => other,
    };
    let mut text = match form {
        TargetForm::Relative => relative_text(style, source, target),
        TargetForm::RootAbsolute => format!("/{}", root_relative(root, target)),
        TargetForm::FsAbsolute => to_slash(target),
        TargetForm::RootRelative => root_relative(root, target),
        TargetForm::Stem => target
            .file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().to_string()),
    };
    if style.style == LinkStyle::Wikilink && !style.keep_ext && is_markdown_path(target) {
        text = trim_md_extension(&text).to_string();
    }
    if style.is_markdown() && !style.angle {
        text = encode_destination(&text);
    }
    text
}

fn target_text(
    style: PathStyle,
    link: &Link,
    form: TargetForm,
    source: &Path,
    target: &Path,
    root: &Path,
    layout: &Layout,
) -> String {
    let mut text = render_target(style, form, source, target, root, layout);
    if style.is_markdown()
        && let Some((_, query)) = link.target.split_once('?')
    {
        text.push('?');
        text.push_str(query);
    }
    if link.target.ends_with('/') && !text.ends_with('/') {
        text.push('/');
    }
    text
}

/// Whether `raw` scans on its own as exactly one `style` link to
/// `target#fragment`.
fn parses_as(raw: &str, style: LinkStyle, target: &str, fragment: Option<&str>) -> bool {
    let doc = Document::parse_with_mode("", raw, ParseMode::Combined);
    matches!(
        doc.links.as_slice(),
        [only] if only.span == Span::new(0, raw.len())
            && only.style == style
            && only.target == target
            && only.fragment.as_deref() == fragment
    )
}

/// Raw syntax of `link` re-pointed at `target#fragment` as seen from `source`,
/// keeping its style, path form and any `?query` or trailing `/`.
///
/// Wikilinks and mentions that cannot spell the new path fall back to an
/// inline link when the corpus parses markdown. `None` when no form that
/// scans back to the same target exists.
pub(crate) fn retarget(
    link: &Link,
    form: TargetForm,
    source: &Path,
    target: &Path,
    fragment: Option<&str>,
    root: &Path,
    layout: &Layout,
) -> Option<String> {
    let style = PathStyle::of(link);
    let text = target_text(style, link, form, source, target, root, layout);
    let raw = link.with_destination(&text, fragment).raw;
    if parses_as(&raw, link.style, &text, fragment) {
        return Some(raw);
    }
    if !matches!(link.style, LinkStyle::Wikilink | LinkStyle::ClaudeMention)
        || !layout.mode.markdown()
    {
        return None;
    }
    let inline = if link.is_embed() {
        LinkStyle::EmbedImage
    } else {
        LinkStyle::InlineMarkdown
    };
    let style = PathStyle::restyled(link, inline);
    let text = target_text(style, link, form, source, target, root, layout);
    let raw = restyle(link, inline, &text, fragment).raw;
    parses_as(&raw, inline, &text, fragment).then_some(raw)
}

/// Copy `segments` of `content` in order, replacing each edit span.
///
/// `edits` must be sorted by span; an edit overlapping an earlier one is dropped.
pub(crate) fn splice(content: &str, segments: &[Span], edits: &[(Span, String)]) -> String {
    let mut out = String::with_capacity(content.len());
    for segment in segments {
        let mut cursor = segment.start;
        for (span, text) in edits.iter().filter(|(span, _)| segment.contains(*span)) {
            if span.start < cursor {
                continue;
            }
            out.push_str(&content[cursor..span.start]);
            out.push_str(text);
            cursor = span.end;
        }
        out.push_str(&content[cursor..segment.end]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn link(content: &str) -> Link {
        Document::parse("/c/docs/a.md", content)
            .links
            .into_iter()
            .next()
            .unwrap_or_else(|| panic!("no link in {content}"))
    }

    #[test]
    fn test_relative_keeps_dot_slash() {
        let original = link("[x](./b.md)");
        let text = render_target(
            PathStyle::of(&original),
            TargetForm::Relative,
            Path::new("/c/docs/a.md"),
            Path::new("/c/docs/renamed b.md"),
            Path::new("/c"),
            &Layout::default(),
        );
        assert_eq!(text, "./renamed%20b.md");
    }

    #[test]
    fn test_wikilink_keeps_missing_extension() {
        let original = link("[[b]]");
        let text = render_target(
            PathStyle::of(&original),
            TargetForm::Relative,
            Path::new("/c/docs/a.md"),
            Path::new("/c/notes/b.md"),
            Path::new("/c"),
            &Layout::default(),
        );
        assert_eq!(text, "../notes/b");
    }

    #[test]
    fn test_mention_relative_needs_prefix() {
        let original = link("@./b.md");
        let text = render_target(
            PathStyle::of(&original),
            TargetForm::Relative,
            Path::new("/c/docs/a.md"),
            Path::new("/c/docs/sub/b.md"),
            Path::new("/c"),
            &Layout::default(),
        );
        assert_eq!(text, "./sub/b.md");
    }

    #[test]
    fn test_retarget_keeps_query_and_title() {
        let original = link("[x](b.md?plain=1#top \"Title\")");
        let raw = retarget(
            &original,
            TargetForm::Relative,
            Path::new("/c/docs/a.md"),
            Path::new("/c/moved/b.md"),
            Some("top"),
            Path::new("/c"),
            &Layout::default(),
        );
        assert_eq!(raw.as_deref(), Some("[x](../moved/b.md?plain=1#top \"Title\")"));
    }

    #[test]
    fn test_retarget_encodes_parentheses() {
        let original = link("[x](b.md)");
        let raw = retarget(
            &original,
            TargetForm::Relative,
            Path::new("/c/docs/a.md"),
            Path::new("/c/docs/b (1).md"),
            None,
            Path::new("/c"),
            &Layout::default(),
        );
        assert_eq!(raw.as_deref(), Some("[x](b%20%281%29.md)"));
    }

    #[test]
    fn test_mention_falls_back_to_inline() {
        let original = link("@b.md#usage");
        let raw = retarget(
            &original,
            TargetForm::Relative,
            Path::new("/c/docs/a.md"),
            Path::new("/c/docs/my notes/b.md"),
            Some("usage"),
            Path::new("/c"),
            &Layout::default(),
        );
        assert_eq!(raw.as_deref(), Some("[b.md](my%20notes/b.md#usage)"));
    }

    #[test]
    fn test_unrepresentable_without_markdown_is_none() {
        let original = link("@b.md");
        let layout = Layout {
            mode: ParseMode::Claude,
            ..Layout::default()
        };
        let raw = retarget(
            &original,
            TargetForm::Relative,
            Path::new("/c/docs/a.md"),
            Path::new("/c/docs/my notes/b.md"),
            None,
            Path::new("/c"),
            &layout,
        );
        assert_eq!(raw, None);
    }

    #[test]
    fn test_splice_segments() {
        let content = "keep [a](a.md) drop [b](b.md) tail";
        let edits = vec![(Span::new(5, 14), "[a](z.md)".to_string())];
        let out = splice(content, &[Span::new(0, 15), Span::new(29, 34)], &edits);
        assert_eq!(out, "keep [a](z.md)  tail");
    }
}
