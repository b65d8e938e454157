//! The single link-resolution function used for planning and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::corpus::Corpus;
use crate::document::paths::{
    has_md_extension, is_external_target, is_markdown_path, lexical_normalize, normalize_slashes,
    percent_decode,
};
use crate::document::{Link, LinkStyle};

/// How a target path was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveVia {
    /// Pure `#fragment`.
    SameDocument,
    /// Relative to the referring file's directory.
    Relative,
    /// `/path` from the corpus root.
    RootAbsolute,
    /// Absolute file-system path below the root.
    FsAbsolute,
    /// Bare path from the corpus root (wikilinks, mentions).
    RootRelative,
    /// Wikilink matched by unique file stem.
    Stem,
}

/// Outcome of resolving one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Resolution {
    /// URL-scheme target; never an internal link.
    External,
    /// Points outside the corpus root or into an excluded directory.
    OutOfScope {
        /// Normalized target.
        path: PathBuf,
    },
    /// A markdown document of the corpus.
    Document {
        /// Target document.
        path: PathBuf,
        /// Fragment as written.
        fragment: Option<String>,
        /// Interpretation used.
        via: ResolveVia,
        /// Whether the fragment names a heading or line of the target.
        fragment_ok: bool,
    },
    /// A non-markdown file of the corpus.
    Asset {
        /// Target file.
        path: PathBuf,
        /// Interpretation used.
        via: ResolveVia,
    },
    /// Inside the corpus but no such file.
    Missing {
        /// Normalized target.
        path: PathBuf,
        /// Interpretation used.
        via: ResolveVia,
    },
}

/// Broken-link subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrokenKind {
    /// Target path matches no file.
    MissingFile,
    /// Target file exists, fragment matches no heading or line.
    DanglingFragment,
}

impl Resolution {
    /// Resolved file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Document { path, .. } | Self::Asset { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Interpretation used, for path-bearing outcomes.
    #[must_use]
    pub const fn via(&self) -> Option<ResolveVia> {
        match self {
            Self::Document { via, .. } | Self::Asset { via, .. } | Self::Missing { via, .. } => {
                Some(*via)
            }
            _ => None,
        }
    }

    /// Broken-link subtype, `None` when resolved or out of scope.
    #[must_use]
    pub const fn broken(&self) -> Option<BrokenKind> {
        match self {
            Self::Missing { .. } => Some(BrokenKind::MissingFile),
            Self::Document {
                fragment_ok: false, ..
            } => Some(BrokenKind::DanglingFragment),
            _ => None,
        }
    }
}

/// Path part of a link target, decoded for markdown styles.
fn target_text(link: &Link) -> String {
    let raw = normalize_slashes(link.target.trim());
    match link.style {
        LinkStyle::InlineMarkdown | LinkStyle::EmbedImage | LinkStyle::ReferenceMarkdown => {
            let without_query = raw.split_once('?').map_or(raw.as_str(), |(path, _)| path);
            percent_decode(without_query)
        }
        LinkStyle::Wikilink | LinkStyle::ClaudeMention => raw,
    }
}

fn classify(corpus: &Corpus, path: PathBuf, fragment: Option<&String>, via: ResolveVia) -> Resolution {
    if !corpus.in_scope(&path) || corpus.is_excluded(&path) {
        return Resolution::OutOfScope { path };
    }
    if let Some(doc) = corpus.document(&path) {
        let fragment_ok = fragment.is_none_or(|frag| doc.has_fragment(frag));
        return Resolution::Document {
            path,
            fragment: fragment.cloned(),
            via,
            fragment_ok,
        };
    }
    if corpus.is_asset(&path) {
        return Resolution::Asset { path, via };
    }
    if corpus.is_directory(&path) {
        return Resolution::OutOfScope { path };
    }
    Resolution::Missing { path, via }
}

/// Candidate paths for a wikilink target, with and without an implied `.md`.
fn wikilink_candidates(base: &Path, target: &str) -> Vec<PathBuf> {
    let exact = lexical_normalize(&base.join(target));
    if has_md_extension(target) {
        return vec![exact];
    }
    let mut with_ext = exact.clone().into_os_string();
    with_ext.push(".md");
    vec![PathBuf::from(with_ext), exact]
}

fn resolve_wikilink(corpus: &Corpus, source_dir: &Path, target: &str, fragment: Option<&String>) -> Resolution {
    if let Some(rooted) = target.strip_prefix('/') {
        let candidates = wikilink_candidates(corpus.root(), rooted);
        let hit = candidates.iter().find(|path| corpus.contains(path));
        let path = hit.unwrap_or(&candidates[0]).clone();
        return classify(corpus, path, fragment, ResolveVia::RootAbsolute);
    }
    for (base, via) in [
        (source_dir, ResolveVia::Relative),
        (corpus.root(), ResolveVia::RootRelative),
    ] {
        for path in wikilink_candidates(base, target) {
            if corpus.contains(&path) {
                return classify(corpus, path, fragment, via);
            }
        }
    }
    if !target.contains('/') {
        let mut matches: Vec<&PathBuf> = corpus
            .stem_matches(target)
            .iter()
            .filter(|path| is_markdown_path(path))
            .collect();
        if let Some(stem) = Path::new(target).file_stem() {
            matches.extend(corpus.stem_matches(&stem.to_string_lossy()).iter().filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(target))
            }));
        }
        matches.sort();
        matches.dedup();
        if let [only] = matches.as_slice() {
            return classify(corpus, (*only).clone(), fragment, ResolveVia::Stem);
        }
    }
    let candidates = wikilink_candidates(source_dir, target);
    classify(corpus, candidates[0].clone(), fragment, ResolveVia::Relative)
}

/// Resolve `link`, written in `source`, against `corpus`.
#[must_use]
pub fn resolve(corpus: &Corpus, source: &Path, link: &Link) -> Resolution {
    if is_external_target(&link.target) {
        return Resolution::External;
    }
    let target = target_text(link);
    let fragment = link.fragment.as_ref();
    if target.is_empty() {
        let fragment_ok = fragment.is_none_or(|frag| {
            corpus
                .document(source)
                .is_some_and(|doc| doc.has_fragment(frag))
        });
        return Resolution::Document {
            path: source.to_path_buf(),
            fragment: fragment.cloned(),
            via: ResolveVia::SameDocument,
            fragment_ok,
        };
    }

    let source_dir = source.parent().unwrap_or_else(|| corpus.root());
    match link.style {
        LinkStyle::Wikilink => resolve_wikilink(corpus, source_dir, &target, fragment),
        LinkStyle::ClaudeMention => {
            if target.starts_with("./") || target.starts_with("../") {
                let path = lexical_normalize(&source_dir.join(&target));
                classify(corpus, path, fragment, ResolveVia::Relative)
            } else if let Some(rooted) = target.strip_prefix('/') {
                let path = lexical_normalize(&corpus.root().join(rooted));
                classify(corpus, path, fragment, ResolveVia::RootAbsolute)
            } else {
                let path = lexical_normalize(&corpus.root().join(&target));
                classify(corpus, path, fragment, ResolveVia::RootRelative)
            }
        }
        LinkStyle::InlineMarkdown | LinkStyle::EmbedImage | LinkStyle::ReferenceMarkdown => {
            let as_path = Path::new(&target);
            if as_path.is_absolute() || target.starts_with('/') {
                let fs_path = lexical_normalize(as_path);
                if fs_path.starts_with(corpus.root()) && corpus.contains(&fs_path) {
                    return classify(corpus, fs_path, fragment, ResolveVia::FsAbsolute);
                }
                let rooted = target.trim_start_matches('/');
                let path = lexical_normalize(&corpus.root().join(rooted));
                return classify(corpus, path, fragment, ResolveVia::RootAbsolute);
            }
            let path = lexical_normalize(&source_dir.join(&target));
            classify(corpus, path, fragment, ResolveVia::Relative)
        }
    }
}
