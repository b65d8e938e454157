use crate::document::paths::trim_md_extension;
use crate::document::{Link, LinkShape, LinkStyle};

use super::LinkStyleTarget;

/// Style `link` should take under `target`, or `None` to keep its style.
///
/// Reference definitions keep their style; embeds never become mentions and
/// mentions only point at markdown documents.
#[must_use]
pub fn target_style(
    link: &Link,
    target: LinkStyleTarget,
    target_is_document: bool,
) -> Option<LinkStyle> {
    let next = match (target, link.style) {
        (_, LinkStyle::ReferenceMarkdown) | (LinkStyleTarget::Combined, _) => return None,
        (LinkStyleTarget::Markdown, LinkStyle::Wikilink) if link.shape.embed => {
            LinkStyle::EmbedImage
        }
        (LinkStyleTarget::Markdown, LinkStyle::Wikilink | LinkStyle::ClaudeMention) => {
            LinkStyle::InlineMarkdown
        }
        (LinkStyleTarget::Wikilink, _) => LinkStyle::Wikilink,
        (LinkStyleTarget::Claude, LinkStyle::InlineMarkdown | LinkStyle::Wikilink)
            if target_is_document && !link.is_embed() && !link.target.is_empty() =>
        {
            LinkStyle::ClaudeMention
        }
        _ => return None,
    };
    (next != link.style).then_some(next)
}

fn visible_text(link: &Link) -> String {
    if let Some(text) = &link.text {
        return text.clone();
    }
    if link.target.is_empty() {
        return link.fragment.clone().unwrap_or_default();
    }
    match link.style {
        LinkStyle::Wikilink => trim_md_extension(&link.target).to_string(),
        _ => link.target.clone(),
    }
}

/// Rebuild `link` in `style` pointing at `target#fragment`; the span is kept.
#[must_use]
pub fn restyle(link: &Link, style: LinkStyle, target: &str, fragment: Option<&str>) -> Link {
    let text = match style {
        LinkStyle::InlineMarkdown => Some(visible_text(link)),
        LinkStyle::EmbedImage => Some(link.text.clone().unwrap_or_default()),
        LinkStyle::Wikilink => link
            .text
            .clone()
            .filter(|text| !text.is_empty() && text != trim_md_extension(target)),
        LinkStyle::ClaudeMention | LinkStyle::ReferenceMarkdown => None,
    };
    let shape = LinkShape {
        embed: style == LinkStyle::Wikilink && link.is_embed(),
        ..LinkShape::default()
    };
    let mut next = Link {
        raw: String::new(),
        style,
        text,
        target: target.to_string(),
        fragment: fragment.map(str::to_string),
        span: link.span,
        shape,
    };
    next.raw = next.render();
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn first_link(content: &str) -> Link {
        Document::parse("/c/a.md", content)
            .links
            .into_iter()
            .next()
            .unwrap_or_else(|| panic!("no link in {content}"))
    }

    #[test]
    fn test_wikilink_to_markdown() {
        let link = first_link("[[Other Note#part]]");
        assert_eq!(
            target_style(&link, LinkStyleTarget::Markdown, true),
            Some(LinkStyle::InlineMarkdown)
        );
        let next = restyle(&link, LinkStyle::InlineMarkdown, "Other%20Note.md", Some("part"));
        assert_eq!(next.raw, "[Other Note](Other%20Note.md#part)");
    }

    #[test]
    fn test_markdown_to_wikilink_keeps_alias() {
        let link = first_link("[the guide](guide.md)");
        let next = restyle(&link, LinkStyle::Wikilink, "guide", None);
        assert_eq!(next.raw, "[[guide|the guide]]");
        let link = first_link("[guide](guide.md)");
        assert_eq!(restyle(&link, LinkStyle::Wikilink, "guide", None).raw, "[[guide]]");
    }

    #[test]
    fn test_claude_skips_embeds_and_assets() {
        let image = first_link("![x](img.png)");
        assert_eq!(target_style(&image, LinkStyleTarget::Claude, false), None);
        let link = first_link("[a](a.md)");
        assert_eq!(target_style(&link, LinkStyleTarget::Claude, false), None);
        assert_eq!(
            target_style(&link, LinkStyleTarget::Claude, true),
            Some(LinkStyle::ClaudeMention)
        );
    }

    #[test]
    fn test_reference_definitions_keep_style() {
        let link = first_link("[ref]: a.md");
        assert_eq!(target_style(&link, LinkStyleTarget::Wikilink, true), None);
    }
}
