//! Tests for converting link syntax on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use omni_relink::{
    Corpus, LinkStyleTarget, PathResolution, Planner, RelinkConfig, execute, validate,
};

fn load(root: &Path) -> Result<Planner, Box<dyn std::error::Error>> {
    Ok(Planner::new(Arc::new(Corpus::load(root, &RelinkConfig::default())?)))
}

fn setup() -> Result<(TempDir, PathBuf), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    fs::create_dir_all(root.join("docs"))?;
    fs::write(
        root.join("docs/a.md"),
        "# A\n\n[[b#usage|usage]] and @docs/b.md and [web](https://example.com)\n\n```\n[[b]]\n```\n",
    )?;
    fs::write(root.join("docs/b.md"), "# B\n\n## Usage\n")?;
    Ok((dir, root))
}

#[test]
fn test_convert_to_markdown_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root) = setup()?;
    let set = load(&root)?.plan_convert(&[], Some(LinkStyleTarget::Markdown), None)?;
    let result = execute(&set, false);
    assert!(result.success);
    assert_eq!(
        fs::read_to_string(root.join("docs/a.md"))?,
        "# A\n\n[usage](b.md#usage) and [docs/b.md](b.md) and [web](https://example.com)\n\n```\n[[b]]\n```\n"
    );
    assert!(validate(&result).valid);

    let again = load(&root)?.plan_convert(&[], Some(LinkStyleTarget::Markdown), None)?;
    assert!(again.is_empty());
    Ok(())
}

#[test]
fn test_convert_paths_to_absolute_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root) = setup()?;
    let set = load(&root)?.plan_convert(&[], None, Some(PathResolution::Absolute))?;
    assert!(execute(&set, false).success);
    assert_eq!(
        fs::read_to_string(root.join("docs/a.md"))?,
        "# A\n\n[[/docs/b#usage|usage]] and @/docs/b.md and [web](https://example.com)\n\n```\n[[b]]\n```\n"
    );

    let again = load(&root)?.plan_convert(&[], None, Some(PathResolution::Absolute))?;
    assert!(again.is_empty());
    Ok(())
}

#[test]
fn test_dry_run_convert_leaves_disk_alone() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, root) = setup()?;
    let before = fs::read_to_string(root.join("docs/a.md"))?;
    let set = load(&root)?.plan_convert(&[], Some(LinkStyleTarget::Wikilink), None)?;
    let result = execute(&set, true);
    assert!(result.dry_run);
    assert_eq!(fs::read_to_string(root.join("docs/a.md"))?, before);
    assert!(validate(&result).valid);
    Ok(())
}
