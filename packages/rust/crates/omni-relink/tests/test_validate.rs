//! Tests for post-operation validation and whole-corpus checks.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use omni_relink::{
    BrokenKind, Corpus, MoveOptions, Planner, RelinkConfig, Validator, execute, validate,
};

fn setup() -> Result<(TempDir, PathBuf), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    fs::write(root.join("a.md"), "# A\n\nSee [b](b.md) and [usage](b.md#usage).\n")?;
    fs::write(root.join("b.md"), "# B\n\n## Usage\n")?;
    Ok((dir, root))
}

#[test]
fn test_manual_move_breaks_referrer() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root) = setup()?;
    fs::rename(root.join("b.md"), root.join("moved.md"))?;

    let corpus = Corpus::load(&root, &RelinkConfig::default())?;
    let report = Validator::check_corpus(&corpus);
    assert!(!report.valid);
    assert_eq!(report.broken_count(), 2);
    assert!(report
        .broken_links
        .iter()
        .all(|broken| broken.source == root.join("a.md") && broken.kind == BrokenKind::MissingFile));
    assert_eq!(report.broken_links[0].line, 3);
    Ok(())
}

#[test]
fn test_dangling_fragment_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root) = setup()?;
    fs::write(root.join("b.md"), "# B\n\n## Install\n")?;

    let corpus = Corpus::load(&root, &RelinkConfig::default())?;
    let report = Validator::check_corpus(&corpus);
    assert_eq!(report.broken_count(), 1);
    assert_eq!(report.broken_links[0].kind, BrokenKind::DanglingFragment);
    assert_eq!(report.broken_links[0].link.raw, "[usage](b.md#usage)");
    Ok(())
}

#[test]
fn test_validation_after_real_move_rereads_disk() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root) = setup()?;
    let planner = Planner::new(Arc::new(Corpus::load(&root, &RelinkConfig::default())?));
    let set = planner.plan_move(
        &[(PathBuf::from("b.md"), PathBuf::from("docs/b.md"))],
        &MoveOptions::default(),
    )?;
    let result = execute(&set, false);
    assert!(result.success);
    assert!(validate(&result).valid);

    // Someone edits a referrer between execution and validation.
    fs::write(root.join("a.md"), "[gone](b.md)\n")?;
    let report = validate(&result);
    assert!(!report.valid);
    assert_eq!(report.broken_count(), 1);
    Ok(())
}
