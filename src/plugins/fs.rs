//! Filesystem views over plugin directories
//!
//! A discovered plugin never touches the disk directly; it goes through a
//! [`PluginFs`] bound to its directory. Two views exist:
//!
//! - [`LocalFs`] reflects whatever is on disk right now.
//! - [`StaticFs`] freezes the set of readable files at construction time.
//!   A file dropped into the directory after discovery reads as missing,
//!   which closes the window between manifest validation and load.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, ScoutError};
use crate::security::resolve_in_dir;

/// Read access to the files of one plugin directory.
pub trait PluginFs: Send + Sync + Debug {
    /// Absolute directory this view is bound to.
    fn base(&self) -> &Path;

    /// Every non-directory entry under the base, symlinks included, relative to
    /// [`base`](Self::base), sorted.
    fn files(&self) -> Result<Vec<PathBuf>>;

    /// Open a file by path relative to the base.
    fn open(&self, name: &Path) -> Result<File>;

    /// Read a whole file by path relative to the base.
    fn read(&self, name: &Path) -> Result<Vec<u8>> {
        let mut file = self.open(name)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Express an absolute path relative to the base.
    fn rel(&self, path: &Path) -> Result<PathBuf> {
        path.strip_prefix(self.base())
            .map(Path::to_path_buf)
            .map_err(|_| {
                ScoutError::SecurityViolation(format!(
                    "{} is not within {}",
                    path.display(),
                    self.base().display()
                ))
            })
    }
}

/// Live view of a plugin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFs {
    base: PathBuf,
}

impl LocalFs {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }
}

impl PluginFs for LocalFs {
    fn base(&self) -> &Path {
        &self.base
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.base).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.base.clone());
                ScoutError::Walk {
                    path,
                    source: e.into(),
                }
            })?;
            // Symlinks are listed as they are; `open` confines their targets.
            if entry.file_type().is_dir() {
                continue;
            }
            // Entries always start with the walk root.
            if let Ok(rel) = entry.path().strip_prefix(&self.base) {
                files.push(rel.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    fn open(&self, name: &Path) -> Result<File> {
        let safe = resolve_in_dir(name, &self.base)?;
        match File::open(safe.as_path()) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ScoutError::FileNotFound(name.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Frozen view of a plugin directory.
///
/// The file set is captured once, in [`StaticFs::new`]. Files added later
/// are reported as not found. Files removed later surface as not found from
/// the underlying open.
#[derive(Debug, Clone)]
pub struct StaticFs {
    inner: LocalFs,
    files: BTreeSet<PathBuf>,
}

impl StaticFs {
    /// Snapshot the files currently visible through `inner`.
    ///
    /// # Errors
    ///
    /// Fails if the directory can no longer be listed.
    pub fn new(inner: LocalFs) -> Result<Self> {
        let files: BTreeSet<PathBuf> = inner.files()?.into_iter().collect();
        debug!(
            dir = %inner.base().display(),
            files = files.len(),
            "Froze plugin directory"
        );
        Ok(Self { inner, files })
    }

    /// Whether `name` was present when the snapshot was taken.
    pub fn contains(&self, name: &Path) -> bool {
        let rel = if name.is_absolute() {
            match self.inner.rel(name) {
                Ok(rel) => rel,
                Err(_) => return false,
            }
        } else {
            name.to_path_buf()
        };
        self.files.contains(&clean_relative(&rel))
    }
}

impl PluginFs for StaticFs {
    fn base(&self) -> &Path {
        self.inner.base()
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.iter().cloned().collect())
    }

    fn open(&self, name: &Path) -> Result<File> {
        // Confinement runs first so traversal is reported as such, not as a
        // missing file.
        resolve_in_dir(name, self.inner.base())?;
        if !self.contains(name) {
            return Err(ScoutError::FileNotFound(name.to_path_buf()));
        }
        self.inner.open(name)
    }
}

/// Drop `.` segments so `./a.txt` and `a.txt` match the same snapshot entry.
fn clean_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

/// Build the view discovery hands to a plugin.
///
/// # Errors
///
/// In hardened mode, fails when the directory cannot be snapshotted.
pub fn build_view(dir: PathBuf, hardened: bool) -> Result<Arc<dyn PluginFs>> {
    let local = LocalFs::new(dir);
    if hardened {
        Ok(Arc::new(StaticFs::new(local)?))
    } else {
        Ok(Arc::new(local))
    }
}
