//! Tests for loading a corpus from disk and building its link graph.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use omni_relink::{Corpus, LinkGraph, RelinkConfig, Resolution};

fn write_file(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

#[test]
fn test_load_skips_excluded_dirs_and_indexes_referrers() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let root = tmp.path().canonicalize()?;
    write_file(&root.join("index.md"), "[a](docs/a.md#usage) [[a]] @docs/a.md\n")?;
    write_file(&root.join("docs/a.md"), "# A\n\n## Usage\n\n![img](pic.png)\n")?;
    write_file(&root.join("docs/pic.png"), "png")?;
    write_file(&root.join("node_modules/pkg/readme.md"), "# Vendored\n")?;

    let corpus = Corpus::load(&root, &RelinkConfig::default())?;
    assert_eq!(corpus.len(), 2);
    assert!(corpus.is_asset(&root.join("docs/pic.png")));
    assert!(corpus.document(&root.join("node_modules/pkg/readme.md")).is_none());

    let graph = LinkGraph::build(Arc::new(corpus));
    let target = root.join("docs/a.md");
    assert_eq!(graph.referrers(&target).count(), 3);
    assert_eq!(graph.referrers_to(&target, Some("usage")).len(), 1);
    assert!(graph
        .resolutions(&root.join("docs/a.md"))
        .iter()
        .all(|resolution| matches!(resolution, Resolution::Asset { .. })));

    let touched: BTreeSet<_> = [target].into_iter().collect();
    assert_eq!(
        graph.referring_documents(&touched),
        [root.join("index.md")].into_iter().collect()
    );
    assert!(graph.broken_links().is_empty());
    Ok(())
}

#[test]
fn test_unreadable_document_aborts_load() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    write_file(&tmp.path().join("ok.md"), "# Ok\n")?;
    fs::write(tmp.path().join("bad.md"), [0xff, 0xfe, 0x00, 0x41])?;

    let result = Corpus::load(tmp.path(), &RelinkConfig::default());
    assert!(matches!(result, Err(omni_relink::ParseError::Unreadable { .. })));
    Ok(())
}

#[test]
fn test_fingerprint_changes_with_content() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    write_file(&tmp.path().join("a.md"), "# A\n")?;
    let before = Corpus::load(tmp.path(), &RelinkConfig::default())?.fingerprint();
    write_file(&tmp.path().join("a.md"), "# A changed\n")?;
    let after = Corpus::load(tmp.path(), &RelinkConfig::default())?.fingerprint();
    assert_ne!(before, after);
    Ok(())
}
