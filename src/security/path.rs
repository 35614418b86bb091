//! Path confinement for plugin views
//!
//! Every file a plugin view hands out must live inside the plugin's base
//! directory. This module resolves a caller-supplied path against that base
//! and refuses anything that would leave it, whether through `..` segments,
//! percent-encoded traversal, or a symlink pointing outside.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ScoutError};

/// A path that has been verified to be within a plugin directory.
///
/// This struct can only be created through [`resolve_in_dir`], so holding
/// one means the confinement check already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePath {
    path: PathBuf,
}

impl SafePath {
    /// Returns a reference to the underlying path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for SafePath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Resolves `path` inside the plugin directory `base`.
///
/// Relative paths are joined onto `base`; absolute paths are accepted only
/// when they already point inside it. The result is normalized and, when it
/// exists on disk, canonicalized so a symlink cannot smuggle the target out.
///
/// # Errors
///
/// Returns [`ScoutError::SecurityViolation`] if the path contains a
/// traversal segment or resolves outside `base`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use plugscout::security::resolve_in_dir;
///
/// assert!(resolve_in_dir(Path::new("img/logo.svg"), Path::new("/plugins/a")).is_ok());
/// assert!(resolve_in_dir(Path::new("../b/plugin.json"), Path::new("/plugins/a")).is_err());
/// ```
pub fn resolve_in_dir(path: &Path, base: &Path) -> Result<SafePath> {
    if has_traversal(path) {
        return Err(ScoutError::SecurityViolation(format!(
            "Path contains suspicious traversal pattern: {}",
            path.display()
        )));
    }

    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let normalized = normalize_path(&resolved);
    let canonical_base = normalize_path(base);

    if !normalized.starts_with(&canonical_base) {
        return Err(ScoutError::SecurityViolation(format!(
            "Path escapes plugin directory: {} is not within {}",
            path.display(),
            base.display()
        )));
    }

    Ok(SafePath { path: normalized })
}

/// Normalizes a path by dropping `.` segments and popping on `..`.
///
/// The longest existing prefix of the result is canonicalized, so a missing
/// file below a symlinked directory still compares equal to its base.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let normalized = lexical_normalize(path);

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    normalized
}

/// Drops `.` segments and pops on `..` without touching the filesystem.
pub(crate) fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            _ => normalized.push(component),
        }
    }

    normalized
}

/// Detects `..` segments and their encoded spellings before any resolution.
fn has_traversal(path: &Path) -> bool {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return true;
    }

    let encoded = ["%2e%2e", "%252e%252e", "..\\", "\\..\\"];
    let lower = path.to_string_lossy().to_lowercase();
    encoded.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_relative_path_inside_plugin() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("img")).unwrap();
        std::fs::write(temp.path().join("img/logo.svg"), "<svg/>").unwrap();

        let safe = resolve_in_dir(Path::new("img/logo.svg"), temp.path()).unwrap();
        assert!(safe.as_path().ends_with("img/logo.svg"));
    }

    #[test]
    fn test_absolute_path_inside_plugin() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("module.js"), "").unwrap();

        let abs = temp.path().join("module.js");
        assert!(resolve_in_dir(&abs, temp.path()).is_ok());
    }

    #[test]
    fn test_parent_segment_rejected() {
        let temp = tempdir().unwrap();

        let result = resolve_in_dir(Path::new("../other/plugin.json"), temp.path());
        match result {
            Err(ScoutError::SecurityViolation(msg)) => assert!(msg.contains("traversal")),
            other => panic!("Expected SecurityViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_encoded_traversal_rejected() {
        let temp = tempdir().unwrap();
        assert!(resolve_in_dir(Path::new("%2e%2e/etc/passwd"), temp.path()).is_err());
        assert!(resolve_in_dir(Path::new("..\\..\\etc\\passwd"), temp.path()).is_err());
    }

    #[test]
    fn test_absolute_path_outside_plugin() {
        let temp = tempdir().unwrap();

        match resolve_in_dir(Path::new("/etc/passwd"), temp.path()) {
            Err(ScoutError::SecurityViolation(msg)) => assert!(msg.contains("escapes")),
            other => panic!("Expected SecurityViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_double_dots_inside_file_name_allowed() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("vendor..min.js"), "").unwrap();

        assert!(resolve_in_dir(Path::new("vendor..min.js"), temp.path()).is_ok());
    }

    #[test]
    fn test_current_directory_reference() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("README.md"), "# hi").unwrap();

        assert!(resolve_in_dir(Path::new("./README.md"), temp.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escaping_plugin_rejected() {
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();

        let plugin = tempdir().unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            plugin.path().join("link.txt"),
        )
        .unwrap();

        assert!(resolve_in_dir(Path::new("link.txt"), plugin.path()).is_err());
    }

    #[test]
    fn test_lexical_normalize_keeps_symlinks() {
        assert_eq!(
            lexical_normalize(Path::new("/plugins/./a/../b")),
            PathBuf::from("/plugins/b")
        );
    }

    #[test]
    fn test_normalize_path_basic() {
        let normalized = normalize_path(Path::new("/a/b/../c/./d"));
        assert_eq!(normalized, PathBuf::from("/a/c/d"));
    }
}
