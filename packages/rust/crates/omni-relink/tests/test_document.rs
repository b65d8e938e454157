//! Tests for the document model through the public API.

use omni_relink::{Document, LinkStyle, ParseMode};

const SAMPLE: &str = r#"---
title: Sample
created: 2024-01-02T03:04:05Z
---
# Sample

Inline [guide](docs/guide.md#setup "Guide") and <https://example.com>.
An image ![logo](<img/my logo.png>) and a [ref link][r].
Wiki [[notes/todo#next|todo]] and embed ![[diagram.png]].
Mention @docs/guide.md#usage, but not an email a@b.md.

```md
[hidden](nowhere.md) and [[nowhere]]
```

Inline `[code](skip.md)` is masked too.

[r]: docs/ref.md  "Ref title"

## Sample
"#;

#[test]
fn test_raw_syntax_round_trips() {
    let doc = Document::parse("/c/sample.md", SAMPLE);
    assert!(!doc.links.is_empty());
    for link in &doc.links {
        assert_eq!(&SAMPLE[link.span.start..link.span.end], link.raw);
    }
    assert!(doc.links.iter().all(|link| !link.raw.contains("nowhere") && !link.raw.contains("skip")));
}

#[test]
fn test_styles_and_fragments() {
    let doc = Document::parse("/c/sample.md", SAMPLE);
    let styles: Vec<LinkStyle> = doc.links.iter().map(|link| link.style).collect();
    assert_eq!(
        styles,
        vec![
            LinkStyle::InlineMarkdown,
            LinkStyle::EmbedImage,
            LinkStyle::Wikilink,
            LinkStyle::Wikilink,
            LinkStyle::ClaudeMention,
            LinkStyle::ReferenceMarkdown,
        ]
    );
    assert_eq!(doc.links[0].target, "docs/guide.md");
    assert_eq!(doc.links[0].fragment.as_deref(), Some("setup"));
    assert_eq!(doc.links[1].target, "img/my logo.png");
    assert_eq!(doc.links[2].text.as_deref(), Some("todo"));
    assert!(doc.links[3].shape.embed);
    assert_eq!(doc.links[4].fragment.as_deref(), Some("usage"));
    assert_eq!(doc.links[5].target, "docs/ref.md");
}

#[test]
fn test_headings_frontmatter_and_modes() {
    let doc = Document::parse("/c/sample.md", SAMPLE);
    let slugs: Vec<&str> = doc.headings.iter().map(|h| h.slug.as_str()).collect();
    assert_eq!(slugs, vec!["sample", "sample-1"]);
    assert!(doc.created_ts.is_some());
    assert!(doc.frontmatter_end > 0);
    assert!(doc.has_fragment("sample-1"));
    assert!(doc.has_fragment("L3"));

    let wiki_only = Document::parse_with_mode("/c/sample.md", SAMPLE, ParseMode::Wikilink);
    assert!(wiki_only.links.iter().all(|link| link.style == LinkStyle::Wikilink));
    assert_eq!(wiki_only.links.len(), 2);
}
