//! Path helpers shared by parsing, resolution and rewriting.
//!
//! Link text always uses `/` separators regardless of platform.

use std::path::{Component, Path, PathBuf};

/// Markdown extensions recognized as documents.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdx"];

pub(crate) fn normalize_slashes(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// Whether `path` carries one of the markdown extensions.
#[must_use]
pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|v| v.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_lowercase();
            MARKDOWN_EXTENSIONS.contains(&lower.as_str())
        })
}

pub(crate) fn trim_md_extension(raw: &str) -> &str {
    let lower = raw.to_lowercase();
    for ext in [".markdown", ".mdx", ".md"] {
        if lower.ends_with(ext) {
            return &raw[..raw.len() - ext.len()];
        }
    }
    raw
}

pub(crate) fn has_md_extension(raw: &str) -> bool {
    trim_md_extension(raw).len() != raw.len()
}

/// URL-scheme and protocol-relative targets are never internal links.
#[must_use]
pub fn is_external_target(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.starts_with("//") {
        return true;
    }
    let Some((scheme, _)) = trimmed.split_once(':') else {
        return false;
    };
    // Single letters are drive prefixes (`C:`), not schemes.
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim.
#[must_use]
pub fn percent_decode(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%'
            && idx + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[idx + 1]), hex_value(bytes[idx + 2]))
        {
            out.push(hi * 16 + lo);
            idx += 3;
            continue;
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| raw.to_string())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Percent-encode the characters that end a bare markdown destination.
pub(crate) fn encode_destination(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            ' ' => out.push_str("%20"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            other => out.push(other),
        }
    }
    out
}

/// Collapse `.` and `..` lexically without touching the file system.
#[must_use]
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render `path` with `/` separators.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    let joined = parts.join("/");
    if path.has_root() {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Relative `/`-separated path from directory `from_dir` to file `to`.
#[must_use]
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let target: Vec<Component<'_>> = to.components().collect();
    let common = from
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &target[common..] {
        parts.push(component.as_os_str().to_string_lossy().to_string());
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Path of `path` below `root`, `/`-separated, without a leading slash.
pub(crate) fn root_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map_or_else(|_| to_slash(path), to_slash)
}

pub(crate) fn file_stem_lower(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
