//! Code regions excluded from link and heading scanning.

use super::Span;

#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
}

fn fence_open(line: &str) -> Option<Fence> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = *rest.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let len = rest.bytes().take_while(|b| *b == marker).count();
    if len < 3 {
        return None;
    }
    // A backtick fence's info string may not contain backticks.
    if marker == b'`' && rest[len..].contains('`') {
        return None;
    }
    Some(Fence { marker, len })
}

fn fence_closes(line: &str, open: Fence) -> bool {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return false;
    }
    let rest = &line[indent..];
    let len = rest.bytes().take_while(|b| *b == open.marker).count();
    len >= open.len && rest[len..].trim().is_empty()
}

/// Iterate `(line_start, line_text)` pairs; `line_text` excludes `\n` and a trailing `\r`.
pub(crate) fn lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0usize;
    content.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        (start, line.strip_suffix('\r').unwrap_or(line))
    })
}

/// Byte ranges of fenced code blocks (fence lines included) starting at `from`.
///
/// An unclosed fence runs to the end of the content.
pub(crate) fn fenced_blocks(content: &str, from: usize) -> Vec<Span> {
    let mut blocks = Vec::new();
    let mut open: Option<(Fence, usize)> = None;
    for (start, line) in lines_with_offsets(content) {
        if start < from {
            continue;
        }
        match open {
            None => {
                if let Some(fence) = fence_open(line) {
                    open = Some((fence, start));
                }
            }
            Some((fence, block_start)) => {
                if fence_closes(line, fence) {
                    let end = (start + line.len()).min(content.len());
                    blocks.push(Span::new(block_start, end));
                    open = None;
                }
            }
        }
    }
    if let Some((_, block_start)) = open {
        blocks.push(Span::new(block_start, content.len()));
    }
    blocks
}

/// Inline code spans inside `[start, end)`; a span never crosses a blank line.
fn code_spans(content: &str, start: usize, end: usize, out: &mut Vec<Span>) {
    let bytes = content.as_bytes();
    let mut idx = start;
    while idx < end {
        if bytes[idx] != b'`' || (idx > 0 && bytes[idx - 1] == b'\\') {
            idx += 1;
            continue;
        }
        let run = bytes[idx..end].iter().take_while(|b| **b == b'`').count();
        let mut scan = idx + run;
        let mut closed = None;
        while scan < end {
            if bytes[scan] == b'\n'
                && content[scan + 1..end]
                    .trim_start_matches([' ', '\t', '\r'])
                    .starts_with('\n')
            {
                break;
            }
            if bytes[scan] == b'`' {
                let close = bytes[scan..end].iter().take_while(|b| **b == b'`').count();
                if close == run {
                    closed = Some(scan + close);
                    break;
                }
                scan += close;
                continue;
            }
            scan += 1;
        }
        match closed {
            Some(close_end) => {
                out.push(Span::new(idx, close_end));
                idx = close_end;
            }
            None => idx += run,
        }
    }
}

/// All masked regions: frontmatter, fenced blocks and inline code spans, sorted.
pub(crate) fn masked_regions(content: &str, frontmatter_end: usize) -> Vec<Span> {
    let mut regions = Vec::new();
    if frontmatter_end > 0 {
        regions.push(Span::new(0, frontmatter_end));
    }
    let mut cursor = frontmatter_end;
    for block in fenced_blocks(content, frontmatter_end) {
        code_spans(content, cursor, block.start, &mut regions);
        regions.push(block);
        cursor = block.end;
    }
    code_spans(content, cursor, content.len(), &mut regions);
    regions.sort_by_key(|span| span.start);
    regions
}

/// Whether `offset` falls inside any of the sorted `regions`.
pub(crate) fn is_masked(regions: &[Span], offset: usize) -> bool {
    let idx = regions.partition_point(|span| span.start <= offset);
    idx > 0 && regions[idx - 1].end > offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_with_longer_closer() {
        let content = "a\n````md\n```\n[x](y.md)\n`````\nb\n";
        let blocks = fenced_blocks(content, 0);
        assert_eq!(blocks.len(), 1);
        let block = &content[blocks[0].start..blocks[0].end];
        assert!(block.starts_with("````md"));
        assert!(block.ends_with("`````"));
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let content = "~~~\n[x](y.md)\n";
        assert_eq!(fenced_blocks(content, 0), vec![Span::new(0, content.len())]);
    }

    #[test]
    fn test_inline_code_masks() {
        let content = "see `[x](y.md)` and ``a ` b`` here";
        let regions = masked_regions(content, 0);
        assert_eq!(regions.len(), 2);
        assert!(is_masked(&regions, content.find("[x]").unwrap_or_default()));
        assert!(!is_masked(&regions, content.find("here").unwrap_or_default()));
    }
}
