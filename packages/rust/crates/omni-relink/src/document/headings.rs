use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use super::code::{is_masked, lines_with_offsets};
use super::{Span, compile_regex};

static INLINE_LINK_TEXT: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"!?\[([^\[\]\n]*)\]\([^)\n]*\)"));
static WIKILINK_TEXT: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"!?\[\[([^\[\]|\n]*)(?:\|([^\[\]\n]*))?\]\]"));

/// ATX heading of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading depth (1-6).
    pub level: usize,
    /// Heading text with surrounding whitespace and closing `#`s removed.
    pub text: String,
    /// Anchor identifier, unique within the document.
    pub slug: String,
    /// Byte offset of the heading line.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// Byte range of `text` inside the document.
    pub text_span: Span,
}

/// Heading slug: lowercase, whitespace becomes `-`, other punctuation is dropped.
///
/// Link markup is reduced to its visible text first.
#[must_use]
pub fn slugify(text: &str) -> String {
    let visible = WIKILINK_TEXT.replace_all(text, |caps: &regex::Captures<'_>| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map_or_else(String::new, |m| m.as_str().to_string())
    });
    let visible = INLINE_LINK_TEXT.replace_all(&visible, "$1");

    let mut slug = String::with_capacity(visible.len());
    for ch in visible.trim().chars() {
        if ch.is_whitespace() {
            slug.push('-');
        } else if ch.is_alphanumeric() || ch == '-' || ch == '_' {
            slug.extend(ch.to_lowercase());
        }
    }
    slug
}

/// Assign document-unique slugs: repeats get `-1`, `-2`, ...
pub(crate) struct SlugRegistry {
    seen: HashMap<String, usize>,
}

impl SlugRegistry {
    pub(crate) fn new() -> Self {
        Self {
            seen: HashMap::new(),
        }
    }

    pub(crate) fn claim(&mut self, base: &str) -> String {
        let mut count = self.seen.get(base).copied().unwrap_or(0);
        let mut candidate = if count == 0 {
            base.to_string()
        } else {
            format!("{base}-{count}")
        };
        while count > 0 && self.seen.contains_key(&candidate) {
            count += 1;
            candidate = format!("{base}-{count}");
        }
        self.seen.insert(base.to_string(), count + 1);
        if candidate != base {
            self.seen.insert(candidate.clone(), 1);
        }
        candidate
    }
}

/// Parse an ATX heading line into `(level, text start, text end)` relative to the line.
fn parse_atx(line: &str) -> Option<(usize, usize, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let level = rest.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let after = &rest[level..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }
    let text_start = indent + level + (after.len() - after.trim_start().len());
    let mut text = line[text_start..].trim_end();
    // Closing sequence: `#`s preceded by whitespace (or the whole remainder).
    let without_hashes = text.trim_end_matches('#');
    if without_hashes.len() != text.len()
        && (without_hashes.is_empty() || without_hashes.ends_with([' ', '\t']))
    {
        text = without_hashes.trim_end();
    }
    if text.is_empty() {
        return None;
    }
    Some((level, text_start, text_start + text.len()))
}

pub(crate) fn extract_headings(content: &str, masked: &[Span]) -> Vec<Heading> {
    let mut registry = SlugRegistry::new();
    let mut headings = Vec::new();
    for (line_idx, (start, line)) in lines_with_offsets(content).enumerate() {
        if is_masked(masked, start) {
            continue;
        }
        let Some((level, text_start, text_end)) = parse_atx(line) else {
            continue;
        };
        let text = line[text_start..text_end].to_string();
        let slug = registry.claim(&slugify(&text));
        headings.push(Heading {
            level,
            text,
            slug,
            offset: start,
            line: line_idx + 1,
            text_span: Span::new(start + text_start, start + text_end),
        });
    }
    headings
}
