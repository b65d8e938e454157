use std::collections::BTreeMap;

use crate::document::{Document, Span, lines_with_offsets, slugify};
use crate::error::PlanError;

use super::{DEFAULT_SPLIT_MARKER, SplitStrategy};

/// One output part of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPart {
    /// Byte range of the source that becomes this part.
    pub range: Span,
    /// Human title (heading text or marker name).
    pub title: Option<String>,
    /// Suggested file stem.
    pub name: Option<String>,
}

/// Source text divided into a preamble and ordered parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Text kept with the source (frontmatter, title, intro).
    pub preamble: Span,
    /// Parts in source order.
    pub parts: Vec<SplitPart>,
}

/// Partition `doc` according to `strategy`.
///
/// # Errors
/// `PlanError::InvalidStrategy` when parameters are inconsistent with the
/// document or the split would produce fewer than two parts.
pub fn partition(doc: &Document, strategy: &SplitStrategy) -> Result<Partition, PlanError> {
    let partition = match strategy {
        SplitStrategy::Headers { level } => by_headers(doc, *level)?,
        SplitStrategy::Size {
            max_bytes,
            max_lines,
        } => by_size(doc, *max_bytes, *max_lines)?,
        SplitStrategy::Manual { marker } => by_marker(doc, marker)?,
        SplitStrategy::Lines { starts } => by_lines(doc, starts)?,
    };
    if partition.parts.len() < 2 {
        return Err(PlanError::InvalidStrategy(format!(
            "{} split of {} yields fewer than two parts",
            strategy_name(strategy),
            doc.path.display()
        )));
    }
    tracing::debug!(
        path = %doc.path.display(),
        parts = partition.parts.len(),
        preamble_bytes = partition.preamble.end,
        "partitioned document"
    );
    Ok(partition)
}

const fn strategy_name(strategy: &SplitStrategy) -> &'static str {
    match strategy {
        SplitStrategy::Headers { .. } => "headers",
        SplitStrategy::Size { .. } => "size",
        SplitStrategy::Manual { .. } => "manual",
        SplitStrategy::Lines { .. } => "lines",
    }
}

fn heading_at(doc: &Document, offset: usize) -> Option<String> {
    doc.headings
        .iter()
        .find(|heading| heading.offset == offset)
        .map(|heading| heading.text.clone())
}

/// Turn sorted part starts into contiguous parts; blank leading text joins the preamble.
fn from_starts(doc: &Document, starts: &[(usize, Option<String>)]) -> Partition {
    let body_start = doc.frontmatter_end;
    let mut bounds: Vec<(usize, Option<String>)> = Vec::new();
    let leading = starts.first().map_or(doc.content.len(), |(start, _)| *start);
    if doc.content[body_start..leading].trim().is_empty() {
        bounds.extend(starts.iter().cloned());
    } else {
        bounds.push((body_start, None));
        bounds.extend(starts.iter().cloned());
    }
    let preamble_end = bounds.first().map_or(body_start, |(start, _)| *start);

    let mut parts = Vec::with_capacity(bounds.len());
    for (idx, (start, name)) in bounds.iter().enumerate() {
        let end = bounds
            .get(idx + 1)
            .map_or(doc.content.len(), |(next, _)| *next);
        let title = name.clone().or_else(|| heading_at(doc, *start));
        parts.push(SplitPart {
            range: Span::new(*start, end),
            title,
            name: name.clone(),
        });
    }
    Partition {
        preamble: Span::new(0, preamble_end),
        parts,
    }
}

fn by_headers(doc: &Document, level: Option<usize>) -> Result<Partition, PlanError> {
    let level = match level {
        Some(level) if (1..=6).contains(&level) => level,
        Some(level) => {
            return Err(PlanError::InvalidStrategy(format!(
                "heading level {level} is outside 1-6"
            )));
        }
        None => {
            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for heading in &doc.headings {
                *counts.entry(heading.level).or_default() += 1;
            }
            counts
                .into_iter()
                .find(|(_, count)| *count >= 2)
                .map(|(level, _)| level)
                .ok_or_else(|| {
                    PlanError::InvalidStrategy(format!(
                        "no heading level repeats in {}",
                        doc.path.display()
                    ))
                })?
        }
    };

    // Shallower headings before the first split heading stay in the preamble.
    let boundaries: Vec<_> = doc
        .headings
        .iter()
        .skip_while(|heading| heading.level != level)
        .filter(|heading| heading.level <= level)
        .collect();
    let Some(first) = boundaries.first() else {
        return Ok(Partition {
            preamble: Span::new(0, doc.content.len()),
            parts: Vec::new(),
        });
    };

    let mut parts = Vec::with_capacity(boundaries.len());
    for (idx, heading) in boundaries.iter().enumerate() {
        let end = boundaries
            .get(idx + 1)
            .map_or(doc.content.len(), |next| next.offset);
        let slug = slugify(&heading.text);
        parts.push(SplitPart {
            range: Span::new(heading.offset, end),
            title: Some(heading.text.clone()),
            name: (!slug.is_empty()).then_some(slug),
        });
    }
    Ok(Partition {
        preamble: Span::new(0, first.offset),
        parts,
    })
}

fn by_size(
    doc: &Document,
    max_bytes: Option<usize>,
    max_lines: Option<usize>,
) -> Result<Partition, PlanError> {
    if max_bytes.is_none() && max_lines.is_none() {
        return Err(PlanError::InvalidStrategy(
            "size split needs max_bytes or max_lines".to_string(),
        ));
    }
    if max_bytes == Some(0) || max_lines == Some(0) {
        return Err(PlanError::InvalidStrategy(
            "size budgets must be positive".to_string(),
        ));
    }

    // Block starts: headings and lines following a blank line, outside code.
    let body_start = doc.frontmatter_end;
    let mut candidates = Vec::new();
    let mut previous_blank = false;
    for (start, line) in lines_with_offsets(&doc.content) {
        let blank = line.trim().is_empty();
        if start > body_start
            && !blank
            && !doc.is_masked(start)
            && (previous_blank || heading_at(doc, start).is_some())
        {
            candidates.push(start);
        }
        previous_blank = blank;
    }

    let fits = |start: usize, end: usize| {
        let slice = &doc.content[start..end];
        let lines = slice.bytes().filter(|b| *b == b'\n').count();
        max_bytes.is_none_or(|limit| slice.len() <= limit)
            && max_lines.is_none_or(|limit| lines <= limit)
    };

    let mut starts: Vec<(usize, Option<String>)> = vec![(body_start, None)];
    let mut current = body_start;
    let mut idx = 0;
    while idx < candidates.len() {
        if fits(current, doc.content.len()) {
            break;
        }
        // Largest candidate that keeps [current, candidate) in budget, else
        // the nearest one so an oversized block still becomes its own part.
        let mut chosen = None;
        let mut scan = idx;
        while scan < candidates.len() && fits(current, candidates[scan]) {
            chosen = Some(scan);
            scan += 1;
        }
        let pick = chosen.unwrap_or(idx);
        current = candidates[pick];
        starts.push((current, None));
        idx = pick + 1;
    }
    starts.remove(0);
    Ok(from_starts(doc, &starts))
}

fn marker_name(line: &str, marker: &str) -> Option<Option<String>> {
    let trimmed = line.trim();
    if trimmed == marker {
        return Some(None);
    }
    let open = marker.strip_suffix("-->")?.trim_end();
    let inner = trimmed.strip_prefix(open)?.strip_prefix(':')?;
    let name = inner.strip_suffix("-->")?.trim();
    (!name.is_empty()).then(|| Some(name.to_string()))
}

fn by_marker(doc: &Document, marker: &str) -> Result<Partition, PlanError> {
    let marker = if marker.trim().is_empty() {
        DEFAULT_SPLIT_MARKER
    } else {
        marker.trim()
    };
    let mut markers: Vec<(Span, Option<String>)> = Vec::new();
    for (start, line) in lines_with_offsets(&doc.content) {
        if start < doc.frontmatter_end || doc.is_masked(start) {
            continue;
        }
        if let Some(name) = marker_name(line, marker) {
            let end = doc.content[start..]
                .find('\n')
                .map_or(doc.content.len(), |nl| start + nl + 1);
            markers.push((Span::new(start, end), name));
        }
    }
    if markers.is_empty() {
        return Err(PlanError::InvalidStrategy(format!(
            "no `{marker}` markers in {}",
            doc.path.display()
        )));
    }

    // Segments between markers; marker lines themselves are dropped.
    let mut segments: Vec<(Span, Option<String>)> = Vec::new();
    let mut cursor = doc.frontmatter_end;
    let mut pending_name = None;
    for (span, name) in markers {
        segments.push((Span::new(cursor, span.start), pending_name.take()));
        cursor = span.end;
        pending_name = name;
    }
    segments.push((Span::new(cursor, doc.content.len()), pending_name));

    let mut preamble_end = doc.frontmatter_end;
    let mut parts = Vec::new();
    for (idx, (range, name)) in segments.into_iter().enumerate() {
        let blank = doc.content[range.start..range.end].trim().is_empty();
        if blank {
            if idx == 0 {
                preamble_end = range.end;
            }
            continue;
        }
        let title = name.clone().or_else(|| {
            doc.headings
                .iter()
                .find(|heading| range.start <= heading.offset && heading.offset < range.end)
                .map(|heading| heading.text.clone())
        });
        parts.push(SplitPart { range, title, name });
    }
    Ok(Partition {
        preamble: Span::new(0, preamble_end),
        parts,
    })
}

fn by_lines(doc: &Document, starts: &[usize]) -> Result<Partition, PlanError> {
    if starts.is_empty() {
        return Err(PlanError::InvalidStrategy(
            "lines split needs at least one starting line".to_string(),
        ));
    }
    let mut offsets = Vec::with_capacity(starts.len());
    let mut previous = 1;
    for &line in starts {
        if line <= previous || line > doc.line_count {
            return Err(PlanError::InvalidStrategy(format!(
                "line {line} is out of order or outside 2-{}",
                doc.line_count
            )));
        }
        let offset = doc.line_offset(line);
        if offset < doc.frontmatter_end || doc.is_masked(offset) {
            return Err(PlanError::InvalidStrategy(format!(
                "line {line} is inside frontmatter or a code block"
            )));
        }
        offsets.push((offset, None));
        previous = line;
    }
    Ok(from_starts(doc, &offsets))
}
