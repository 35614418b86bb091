//! Files command: list what a plugin's view would expose.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use plugscout::plugins::{build_view, PluginFs};

/// Files visible through the view discovery would build for `dir`.
pub(crate) fn visible_files(dir: &Path, dev: bool) -> Result<Vec<PathBuf>> {
    let dir = std::path::absolute(dir)
        .with_context(|| format!("Failed to resolve directory: {:?}", dir))?;
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {:?}", dir);
    }

    let view = build_view(dir.clone(), !dev)
        .with_context(|| format!("Failed to build view for {:?}", dir))?;
    view.files()
        .with_context(|| format!("Failed to list files in {:?}", view.base()))
}

pub(crate) fn cmd_files(dir: PathBuf, dev: bool) -> Result<()> {
    let files = visible_files(&dir, dev)?;
    for file in &files {
        println!("{}", file.display());
    }
    eprintln!(
        "{} files ({} view)",
        files.len(),
        if dev { "live" } else { "frozen" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_visible_files_relative_and_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("plugin.json"), "{}").unwrap();
        fs::create_dir(tmp.path().join("img")).unwrap();
        fs::write(tmp.path().join("img").join("logo.svg"), "<svg/>").unwrap();

        for dev in [true, false] {
            let files = visible_files(tmp.path(), dev).unwrap();
            assert_eq!(
                files,
                vec![PathBuf::from("img/logo.svg"), PathBuf::from("plugin.json")]
            );
        }
    }

    #[test]
    fn test_visible_files_rejects_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(visible_files(&tmp.path().join("nope"), false).is_err());
    }
}
