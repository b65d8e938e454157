use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::code::is_masked;
use super::{ParseMode, Span, compile_regex};

static WIKILINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(!?)\[\[([^\[\]\n]+?)\]\]"));
static INLINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(
        r#"(!?)\[([^\[\]\n]*)\]\((?:<([^<>\n]*)>|([^\s()<>]*))((?:[ \t]+(?:"[^"\n]*"|'[^'\n]*'))?[ \t]*)\)"#,
    )
});
static REFERENCE_DEF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"(?m)^( {0,3})\[([^\]\n]+)\]:([ \t]+)(?:<([^<>\n]*)>|(\S+))([^\n]*)$")
});
static MENTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(
        r"(?m)(^|[\s(\[])@((?:\.{1,2}/|/)?[A-Za-z0-9_\-./]*[A-Za-z0-9_\-]\.(?:markdown|mdx|md))(?:#([A-Za-z0-9_\-]+))?",
    )
});

/// Syntactic family of a link occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStyle {
    /// `[text](target#frag)`
    InlineMarkdown,
    /// `[label]: target#frag` definition used by `[text][label]`.
    ReferenceMarkdown,
    /// `[[target#frag|alias]]`, optionally embedded as `![[...]]`.
    Wikilink,
    /// `![alt](target)`
    EmbedImage,
    /// Claude-style `@path/to/file.md#frag` mention.
    ClaudeMention,
}

/// Surface details needed to reproduce a link byte-for-byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkShape {
    /// Wikilink written as `![[...]]`.
    pub embed: bool,
    /// Destination written inside `<...>`.
    pub angle: bool,
    /// Text after the destination: inline title plus padding, or the rest of
    /// a reference definition line.
    pub suffix: String,
    /// Whitespace between `]:` and the destination of a reference definition.
    pub separator: String,
}

/// One link occurrence inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Exact source text of the occurrence.
    pub raw: String,
    /// Syntactic family.
    pub style: LinkStyle,
    /// Visible text: link text, image alt, wikilink alias or reference label.
    pub text: Option<String>,
    /// Target path as written, without the fragment. Empty for pure anchors.
    pub target: String,
    /// Heading slug or line anchor after `#`.
    pub fragment: Option<String>,
    /// Byte range of `raw` inside the owning document.
    pub span: Span,
    /// Surface details for re-rendering.
    pub shape: LinkShape,
}

fn split_fragment(dest: &str) -> (String, Option<String>) {
    match dest.split_once('#') {
        Some((target, fragment)) => (target.to_string(), Some(fragment.to_string())),
        None => (dest.to_string(), None),
    }
}

impl Link {
    /// Destination text: target plus `#fragment`.
    #[must_use]
    pub fn destination(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{fragment}", self.target),
            None => self.target.clone(),
        }
    }

    /// Render the link from its fields.
    ///
    /// For a freshly parsed link this reproduces `raw` exactly.
    #[must_use]
    pub fn render(&self) -> String {
        let dest = if self.shape.angle {
            format!("<{}>", self.destination())
        } else {
            self.destination()
        };
        let text = self.text.as_deref().unwrap_or_default();
        match self.style {
            LinkStyle::InlineMarkdown => format!("[{text}]({dest}{})", self.shape.suffix),
            LinkStyle::EmbedImage => format!("![{text}]({dest}{})", self.shape.suffix),
            LinkStyle::ReferenceMarkdown => {
                format!("[{text}]:{}{dest}{}", self.shape.separator, self.shape.suffix)
            }
            LinkStyle::Wikilink => {
                let bang = if self.shape.embed { "!" } else { "" };
                match &self.text {
                    Some(alias) => format!("{bang}[[{}|{alias}]]", self.destination()),
                    None => format!("{bang}[[{}]]", self.destination()),
                }
            }
            LinkStyle::ClaudeMention => format!("@{}", self.destination()),
        }
    }

    /// Same link pointing somewhere else; `raw` is re-rendered, `span` kept.
    #[must_use]
    pub fn with_destination(&self, target: &str, fragment: Option<&str>) -> Self {
        let mut next = self.clone();
        next.target = target.to_string();
        next.fragment = fragment.map(str::to_string);
        next.raw = next.render();
        next
    }

    /// Whether the link embeds its target rather than navigating to it.
    #[must_use]
    pub fn is_embed(&self) -> bool {
        self.style == LinkStyle::EmbedImage || self.shape.embed
    }
}

/// Occupied byte ranges; later families never overlap earlier ones.
struct Occupied(Vec<Span>);

impl Occupied {
    fn overlaps(&self, span: Span) -> bool {
        self.0
            .iter()
            .any(|taken| taken.start < span.end && span.start < taken.end)
    }
}

fn is_escaped(content: &str, offset: usize) -> bool {
    let backslashes = content[..offset]
        .bytes()
        .rev()
        .take_while(|b| *b == b'\\')
        .count();
    backslashes % 2 == 1
}

fn accept(content: &str, masked: &[Span], occupied: &Occupied, span: Span) -> bool {
    !is_masked(masked, span.start) && !is_escaped(content, span.start) && !occupied.overlaps(span)
}

fn scan_reference_definitions(content: &str, masked: &[Span], occupied: &Occupied) -> Vec<Link> {
    let mut links = Vec::new();
    for caps in REFERENCE_DEF_REGEX.captures_iter(content) {
        let (Some(indent), Some(label)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if label.as_str().starts_with('^') {
            continue;
        }
        let (angle, dest) = match (caps.get(4), caps.get(5)) {
            (Some(angled), _) => (true, angled.as_str()),
            (None, Some(bare)) => (false, bare.as_str()),
            (None, None) => continue,
        };
        let end = caps.get(0).map_or(indent.end(), |m| m.end());
        let raw_end = content[..end].trim_end_matches('\r').len();
        let span = Span::new(indent.end(), raw_end);
        if !accept(content, masked, occupied, span) {
            continue;
        }
        let (target, fragment) = split_fragment(dest);
        let suffix_start = caps.get(6).map_or(raw_end, |m| m.start());
        links.push(Link {
            raw: content[span.start..span.end].to_string(),
            style: LinkStyle::ReferenceMarkdown,
            text: Some(label.as_str().to_string()),
            target,
            fragment,
            span,
            shape: LinkShape {
                embed: false,
                angle,
                suffix: content[suffix_start.min(raw_end)..raw_end].to_string(),
                separator: caps
                    .get(3)
                    .map_or_else(String::new, |m| m.as_str().to_string()),
            },
        });
    }
    links
}

fn scan_wikilinks(content: &str, masked: &[Span], occupied: &Occupied) -> Vec<Link> {
    let mut links = Vec::new();
    for caps in WIKILINK_REGEX.captures_iter(content) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let span = Span::new(whole.start(), whole.end());
        if !accept(content, masked, occupied, span) {
            continue;
        }
        let (dest, alias) = match inner.as_str().split_once('|') {
            Some((dest, alias)) => (dest, Some(alias.to_string())),
            None => (inner.as_str(), None),
        };
        let (target, fragment) = split_fragment(dest);
        links.push(Link {
            raw: whole.as_str().to_string(),
            style: LinkStyle::Wikilink,
            text: alias,
            target,
            fragment,
            span,
            shape: LinkShape {
                embed: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
                ..LinkShape::default()
            },
        });
    }
    links
}

fn scan_inline(content: &str, masked: &[Span], occupied: &Occupied) -> Vec<Link> {
    let mut links = Vec::new();
    for caps in INLINE_REGEX.captures_iter(content) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let span = Span::new(whole.start(), whole.end());
        if !accept(content, masked, occupied, span) {
            continue;
        }
        let image = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let (angle, dest) = match (caps.get(3), caps.get(4)) {
            (Some(angled), _) => (true, angled.as_str()),
            (None, Some(bare)) => (false, bare.as_str()),
            (None, None) => (false, ""),
        };
        let (target, fragment) = split_fragment(dest);
        links.push(Link {
            raw: whole.as_str().to_string(),
            style: if image {
                LinkStyle::EmbedImage
            } else {
                LinkStyle::InlineMarkdown
            },
            text: caps.get(2).map(|m| m.as_str().to_string()),
            target,
            fragment,
            span,
            shape: LinkShape {
                angle,
                suffix: caps
                    .get(5)
                    .map_or_else(String::new, |m| m.as_str().to_string()),
                ..LinkShape::default()
            },
        });
    }
    links
}

fn mention_boundary_ok(content: &str, end: usize) -> bool {
    let mut rest = content[end..].chars();
    match rest.next() {
        None => true,
        Some(ch) if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '/') => false,
        Some('.') => !rest.next().is_some_and(char::is_alphanumeric),
        Some(_) => true,
    }
}

fn scan_mentions(content: &str, masked: &[Span], occupied: &Occupied) -> Vec<Link> {
    let mut links = Vec::new();
    for caps in MENTION_REGEX.captures_iter(content) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let span = Span::new(path.start() - 1, whole.end());
        if !mention_boundary_ok(content, span.end) || !accept(content, masked, occupied, span) {
            continue;
        }
        links.push(Link {
            raw: content[span.start..span.end].to_string(),
            style: LinkStyle::ClaudeMention,
            text: None,
            target: path.as_str().to_string(),
            fragment: caps.get(3).map(|m| m.as_str().to_string()),
            span,
            shape: LinkShape::default(),
        });
    }
    links
}

/// Scan `content` for links of the families enabled by `mode`, ordered by offset.
pub(crate) fn extract_links(content: &str, masked: &[Span], mode: ParseMode) -> Vec<Link> {
    let mut occupied = Occupied(Vec::new());
    let mut links: Vec<Link> = Vec::new();

    let mut take = |found: Vec<Link>, occupied: &mut Occupied| {
        occupied.0.extend(found.iter().map(|link| link.span));
        links.extend(found);
    };

    if mode.markdown() {
        let found = scan_reference_definitions(content, masked, &occupied);
        take(found, &mut occupied);
    }
    if mode.wikilinks() {
        let found = scan_wikilinks(content, masked, &occupied);
        take(found, &mut occupied);
    }
    if mode.markdown() {
        let found = scan_inline(content, masked, &occupied);
        take(found, &mut occupied);
    }
    if mode.mentions() {
        let found = scan_mentions(content, masked, &occupied);
        take(found, &mut occupied);
    }

    links.sort_by_key(|link| link.span.start);
    links
}
