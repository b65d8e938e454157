//! Tests for splitting a document on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use omni_relink::{
    Corpus, PlanError, Planner, RelinkConfig, SplitOptions, SplitStrategy, execute, validate,
};

const GUIDE: &str = "# Intro\n\nWelcome, see [details](#details).\n\n# Details\n\nBack to [intro](#intro).\n";

fn setup() -> Result<(TempDir, PathBuf, Planner), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    fs::write(root.join("guide.md"), GUIDE)?;
    fs::write(root.join("other.md"), "Read [the details](guide.md#details).\n")?;
    let corpus = Corpus::load(&root, &RelinkConfig::default())?;
    Ok((dir, root, Planner::new(Arc::new(corpus))))
}

#[test]
fn test_split_by_headers_keeps_external_fragment() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root, planner) = setup()?;
    let set = planner.plan_split(
        Path::new("guide.md"),
        &SplitStrategy::Headers { level: None },
        &SplitOptions::default(),
    )?;
    let result = execute(&set, false);
    assert!(result.success);

    assert_eq!(
        fs::read_to_string(root.join("other.md"))?,
        "Read [the details](details.md#details).\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("guide.md"))?,
        "- [Intro](intro.md)\n- [Details](details.md)\n"
    );
    assert!(
        fs::read_to_string(root.join("intro.md"))?.contains("[details](details.md#details)")
    );
    assert!(fs::read_to_string(root.join("details.md"))?.contains("[intro](intro.md#intro)"));

    let report = validate(&result);
    assert!(report.valid, "{report:?}");
    Ok(())
}

#[test]
fn test_split_without_toc_removes_source() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root, planner) = setup()?;
    let set = planner.plan_split(
        Path::new("guide.md"),
        &SplitStrategy::Headers { level: None },
        &SplitOptions {
            toc: false,
            output_dir: Some(PathBuf::from("parts")),
        },
    )?;
    let result = execute(&set, false);
    assert!(result.success);
    assert!(!root.join("guide.md").exists());
    assert!(root.join("parts/intro.md").is_file());
    assert!(root.join("parts/details.md").is_file());
    assert_eq!(
        fs::read_to_string(root.join("other.md"))?,
        "Read [the details](parts/details.md#details).\n"
    );
    assert!(validate(&result).valid);
    Ok(())
}

#[test]
fn test_manual_split_needs_a_marker() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, _root, planner) = setup()?;
    let result = planner.plan_split(
        Path::new("guide.md"),
        &SplitStrategy::Manual {
            marker: "<!-- split -->".to_string(),
        },
        &SplitOptions::default(),
    );
    assert!(matches!(result, Err(PlanError::InvalidStrategy(_))));
    Ok(())
}
