//! Markdown document parsing: headings, link occurrences and code regions.

mod code;
mod frontmatter;
mod headings;
mod links;
pub mod paths;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use self::headings::{Heading, slugify};
pub use self::links::{Link, LinkShape, LinkStyle};

pub(crate) use self::code::lines_with_offsets;
pub(crate) use self::headings::SlugRegistry;

pub(crate) fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(fallback) => fallback,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// First byte.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
}

impl Span {
    /// Create a span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether `other` lies entirely inside this span.
    #[must_use]
    pub const fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Link families recognized while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Inline, reference-style and image links.
    Markdown,
    /// `[[wikilinks]]` only.
    Wikilink,
    /// `@file.md` mentions only.
    Claude,
    /// Everything at once.
    #[default]
    Combined,
}

impl ParseMode {
    pub(crate) const fn markdown(self) -> bool {
        matches!(self, Self::Markdown | Self::Combined)
    }

    pub(crate) const fn wikilinks(self) -> bool {
        matches!(self, Self::Wikilink | Self::Combined)
    }

    pub(crate) const fn mentions(self) -> bool {
        matches!(self, Self::Claude | Self::Combined)
    }
}

/// Immutable parse of one markdown file.
#[derive(Debug, Clone)]
pub struct Document {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Full text.
    pub content: String,
    /// ATX headings in document order.
    pub headings: Vec<Heading>,
    /// Link occurrences ordered by offset.
    pub links: Vec<Link>,
    /// Byte offset where the body starts after YAML frontmatter.
    pub frontmatter_end: usize,
    /// Number of lines, for `#L<n>` anchors.
    pub line_count: usize,
    /// Creation time declared in frontmatter (unix seconds).
    pub created_ts: Option<i64>,
    mode: ParseMode,
    masked: Vec<Span>,
}

impl Document {
    /// Parse `content` recognizing every link family.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self::parse_with_mode(path, content, ParseMode::Combined)
    }

    /// Parse `content` recognizing only the families enabled by `mode`.
    #[must_use]
    pub fn parse_with_mode(
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        mode: ParseMode,
    ) -> Self {
        let path = path.into();
        let content = content.into();
        let fm = frontmatter::parse_frontmatter(&content);
        let masked = code::masked_regions(&content, fm.end);
        let headings = headings::extract_headings(&content, &masked);
        let links = links::extract_links(&content, &masked, mode);
        let line_count = content.lines().count();
        tracing::trace!(
            path = %path.display(),
            headings = headings.len(),
            links = links.len(),
            "parsed document"
        );
        Self {
            path,
            created_ts: frontmatter::created_timestamp(fm.value.as_ref()),
            frontmatter_end: fm.end,
            content,
            headings,
            links,
            line_count,
            mode,
            masked,
        }
    }

    /// Re-parse new text for the same path and mode.
    #[must_use]
    pub fn reparse(&self, content: impl Into<String>) -> Self {
        Self::parse_with_mode(self.path.clone(), content, self.mode)
    }

    /// Families this document was parsed with.
    #[must_use]
    pub const fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Text after the frontmatter.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.content[self.frontmatter_end..]
    }

    /// Heading owning `slug`.
    #[must_use]
    pub fn heading(&self, slug: &str) -> Option<&Heading> {
        self.headings.iter().find(|heading| heading.slug == slug)
    }

    /// Whether `fragment` names a heading slug or a line anchor in range.
    #[must_use]
    pub fn has_fragment(&self, fragment: &str) -> bool {
        fragment.is_empty()
            || self.heading(fragment).is_some()
            || parse_line_anchor(fragment)
                .is_some_and(|(first, last)| first >= 1 && last <= self.line_count.max(1))
    }

    /// Whether `offset` lies in frontmatter or code.
    #[must_use]
    pub fn is_masked(&self, offset: usize) -> bool {
        code::is_masked(&self.masked, offset)
    }

    /// 1-based line containing byte `offset`.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        let clamped = offset.min(self.content.len());
        self.content.as_bytes()[..clamped]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1
    }

    /// Byte offset of the start of 1-based `line`; past the end yields the content length.
    #[must_use]
    pub fn line_offset(&self, line: usize) -> usize {
        if line <= 1 {
            return 0;
        }
        lines_with_offsets(&self.content)
            .nth(line - 1)
            .map_or(self.content.len(), |(start, _)| start)
    }
}

/// Parse `L12` or `L12-L20` (also `L12-20`) into an inclusive line range.
#[must_use]
pub fn parse_line_anchor(fragment: &str) -> Option<(usize, usize)> {
    let rest = fragment.strip_prefix('L')?;
    let (first, last) = match rest.split_once('-') {
        Some((first, last)) => (first, last.strip_prefix('L').unwrap_or(last)),
        None => (rest, rest),
    };
    let first = first.parse::<usize>().ok()?;
    let last = last.parse::<usize>().ok()?;
    (first <= last).then_some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_fence_hides_links_and_headings() {
        let doc = Document::parse(
            "/c/a.md",
            "# Real\n\n```md\n# Fake\n[x](y.md)\n```\n[z](z.md)\n",
        );
        assert_eq!(doc.headings.len(), 1);
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.links[0].target, "z.md");
    }

    #[test]
    fn test_frontmatter_is_masked() {
        let doc = Document::parse("/c/a.md", "---\nsee: \"[x](y.md)\"\n---\n# A\n");
        assert!(doc.links.is_empty());
        assert_eq!(doc.body(), "# A\n");
    }

    #[test]
    fn test_line_anchors() {
        let doc = Document::parse("/c/a.md", "one\ntwo\nthree\n");
        assert!(doc.has_fragment("L2"));
        assert!(doc.has_fragment("L1-L3"));
        assert!(!doc.has_fragment("L4"));
        assert_eq!(doc.line_offset(3), 8);
        assert_eq!(doc.line_of(9), 3);
    }
}
