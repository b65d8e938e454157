//! Tests for joining and merging documents on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use omni_relink::{
    ConflictResolutions, Corpus, MergeOutcome, MergeStrategy, OrderStrategy, PlanError, Planner,
    RelinkConfig, execute, validate,
};

fn setup(files: &[(&str, &str)]) -> Result<(TempDir, PathBuf, Planner), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    for (path, content) in files {
        fs::write(root.join(path), content)?;
    }
    let corpus = Corpus::load(&root, &RelinkConfig::default())?;
    Ok((dir, root, Planner::new(Arc::new(corpus))))
}

fn sources() -> Vec<PathBuf> {
    vec![PathBuf::from("a.md"), PathBuf::from("b.md")]
}

const A: &str = "# Setup\n\nSee [b](b.md#setup).\n";
const B: &str = "# Setup\n\nBack to [a](a.md#setup).\n";
const C: &str = "[x](b.md#setup) [y](a.md)\n";

#[test]
fn test_join_writes_destination_and_relinks() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root, planner) = setup(&[("a.md", A), ("b.md", B), ("c.md", C)])?;
    let set = planner.plan_join(&sources(), Path::new("all.md"), OrderStrategy::Alphabetical)?;
    let result = execute(&set, false);
    assert!(result.success);

    assert_eq!(
        fs::read_to_string(root.join("all.md"))?,
        "# Setup\n\nSee [b](#setup-1).\n\n# Setup\n\nBack to [a](#setup).\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("c.md"))?,
        "[x](all.md#setup-1) [y](all.md)\n"
    );
    assert!(!root.join("a.md").exists());
    assert!(!root.join("b.md").exists());

    let report = validate(&result);
    assert!(report.valid, "{report:?}");
    Ok(())
}

#[test]
fn test_join_rejects_dependency_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root, planner) = setup(&[("a.md", A), ("b.md", B)])?;
    let result = planner.plan_join(&sources(), Path::new("all.md"), OrderStrategy::Dependency);
    assert!(matches!(result, Err(PlanError::DependencyCycle { .. })));
    assert!(root.join("a.md").exists());
    Ok(())
}

#[test]
fn test_join_dependency_order_puts_targets_first() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root, planner) = setup(&[
        ("intro.md", "# Intro\n\nRead [usage](usage.md).\n"),
        ("usage.md", "# Usage\n"),
    ])?;
    let set = planner.plan_join(
        &[PathBuf::from("intro.md"), PathBuf::from("usage.md")],
        Path::new("book.md"),
        OrderStrategy::Dependency,
    )?;
    assert!(execute(&set, false).success);
    let book = fs::read_to_string(root.join("book.md"))?;
    assert!(book.starts_with("# Usage\n"));
    assert!(book.contains("Read [usage](#usage)."));
    Ok(())
}

#[test]
fn test_interactive_merge_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root, planner) = setup(&[("a.md", A), ("b.md", B), ("c.md", C)])?;
    let outcome = planner.plan_merge(
        &sources(),
        Path::new("all.md"),
        MergeStrategy::Interactive,
        OrderStrategy::Manual,
        &ConflictResolutions::new(),
    )?;
    let MergeOutcome::NeedsResolution(conflicts) = outcome else {
        return Err("expected pending conflicts".into());
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].slug, "setup");
    assert_eq!(conflicts[0].occurrences.len(), 2);

    let answers = ConflictResolutions::new().rename("b.md", "setup", "Setup Again");
    let set = planner
        .plan_merge(
            &sources(),
            Path::new("all.md"),
            MergeStrategy::Interactive,
            OrderStrategy::Manual,
            &answers,
        )?
        .into_change_set()?;
    let result = execute(&set, false);
    assert!(result.success);
    assert_eq!(
        fs::read_to_string(root.join("c.md"))?,
        "[x](all.md#setup-again) [y](all.md)\n"
    );
    assert!(validate(&result).valid);
    Ok(())
}

#[test]
fn test_append_merge_suffixes_later_heading() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root, planner) = setup(&[("a.md", A), ("b.md", B)])?;
    let set = planner
        .plan_merge(
            &sources(),
            Path::new("all.md"),
            MergeStrategy::Append,
            OrderStrategy::Manual,
            &ConflictResolutions::new(),
        )?
        .into_change_set()?;
    let result = execute(&set, false);
    assert!(result.success);
    let merged = fs::read_to_string(root.join("all.md"))?;
    assert!(merged.contains("# Setup (b)\n"));
    assert!(merged.contains("See [b](#setup-b)."));
    assert!(validate(&result).valid);
    Ok(())
}
