//! Manifest discovery by directory traversal
//!
//! The traversal primitive is the [`DirVisitor`] trait so tests (and hosts
//! with unusual storage) can replace it. [`WalkDirVisitor`] is the stock
//! implementation on top of `walkdir`. [`ManifestWalker`] drives a visitor
//! and applies the discovery rules: prune dependency caches, collect
//! `plugin.json` files, tolerate missing and unreadable directories, and
//! abort on anything else.

use std::ffi::OsStr;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, trace, warn};
use walkdir::WalkDir;

use crate::error::{Result, ScoutError};
use crate::security::path::lexical_normalize;

use super::manifest::MANIFEST_FILE_NAME;

/// Dependency cache directory that is never descended into.
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Build output directory preferred when dist following is on.
pub const DIST_DIR: &str = "dist";

/// One step of a traversal, as reported to the visit callback.
#[derive(Debug)]
pub enum Visit<'a> {
    /// A file or directory was reached.
    Entry { path: &'a Path, is_dir: bool },
    /// Something could not be read.
    Failed { path: &'a Path, error: io::Error },
}

/// What the traversal should do after a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Do not descend into the directory just visited. Ignored for files.
    SkipDir,
}

/// Callback handed to a [`DirVisitor`].
pub type VisitFn<'f> = dyn FnMut(Visit<'_>) -> Result<WalkControl> + 'f;

/// Recursive, depth-first directory traversal.
///
/// Implementations call `visit` once per entry (the root included) and
/// once per failure, honor [`WalkControl::SkipDir`], and stop at the first
/// `Err` the callback returns, passing it through.
///
/// When `follow_dist` is set, any directory that contains a [`DIST_DIR`]
/// subdirectory, the root included, is entered only through that
/// subdirectory.
pub trait DirVisitor: Send + Sync + Debug {
    fn walk(&self, root: &Path, follow_dist: bool, visit: &mut VisitFn<'_>) -> Result<()>;
}

/// [`DirVisitor`] over the real filesystem. Follows symlinks; a symlink
/// cycle is logged and skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkDirVisitor;

impl DirVisitor for WalkDirVisitor {
    fn walk(&self, root: &Path, follow_dist: bool, visit: &mut VisitFn<'_>) -> Result<()> {
        let mut it = WalkDir::new(root).follow_links(true).into_iter();

        while let Some(next) = it.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    if let Some(ancestor) = e.loop_ancestor() {
                        warn!(
                            path = ?e.path(),
                            ancestor = %ancestor.display(),
                            "Skipping symlink cycle"
                        );
                        continue;
                    }
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.to_path_buf());
                    let error = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("walk failed"));
                    visit(Visit::Failed { path: &path, error })?;
                    continue;
                }
            };

            let is_dir = entry.file_type().is_dir();

            if follow_dist && entry.depth() >= 1 && !in_dist_branch(entry.path()) {
                if is_dir {
                    it.skip_current_dir();
                }
                continue;
            }

            let control = visit(Visit::Entry {
                path: entry.path(),
                is_dir,
            })?;
            if control == WalkControl::SkipDir && is_dir {
                it.skip_current_dir();
            }
        }

        Ok(())
    }
}

/// False when `path` is a sibling of a `dist` directory that should be
/// walked instead.
fn in_dist_branch(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return true;
    };
    if path.file_name() == Some(OsStr::new(DIST_DIR)) {
        return true;
    }
    !parent.join(DIST_DIR).is_dir()
}

/// Finds `plugin.json` files below a root through a [`DirVisitor`].
#[derive(Debug, Clone)]
pub struct ManifestWalker {
    visitor: Arc<dyn DirVisitor>,
}

impl Default for ManifestWalker {
    fn default() -> Self {
        Self::new(Arc::new(WalkDirVisitor))
    }
}

impl ManifestWalker {
    pub fn new(visitor: Arc<dyn DirVisitor>) -> Self {
        Self { visitor }
    }

    /// Absolute paths of every manifest under `root`.
    ///
    /// Not-found and permission failures, at the root or anywhere below
    /// it, are logged and contribute nothing. Duplicates across roots are
    /// left to the caller.
    ///
    /// # Errors
    ///
    /// `ScoutError::Walk` for any other traversal failure; the walk of this
    /// root stops there.
    pub fn manifest_paths(&self, root: &Path, follow_dist: bool) -> Result<Vec<PathBuf>> {
        let root = lexical_normalize(&std::path::absolute(root)?);
        let mut paths = Vec::new();

        self.visitor.walk(&root, follow_dist, &mut |visit| match visit {
            Visit::Failed { path, error: err } => match err.kind() {
                io::ErrorKind::NotFound => {
                    error!(
                        plugin_dir = %root.display(),
                        path = %path.display(),
                        error = %err,
                        "Couldn't scan directory since it doesn't exist"
                    );
                    Ok(WalkControl::Continue)
                }
                io::ErrorKind::PermissionDenied => {
                    error!(
                        plugin_dir = %root.display(),
                        path = %path.display(),
                        error = %err,
                        "Couldn't scan directory due to lack of permissions"
                    );
                    Ok(WalkControl::Continue)
                }
                _ => Err(ScoutError::Walk {
                    path: path.to_path_buf(),
                    source: err,
                }),
            },
            Visit::Entry { path, is_dir } => {
                let name = path.file_name();
                if is_dir {
                    if name == Some(OsStr::new(DEPENDENCY_DIR)) {
                        trace!(path = %path.display(), "Pruning dependency directory");
                        return Ok(WalkControl::SkipDir);
                    }
                    return Ok(WalkControl::Continue);
                }
                if name == Some(OsStr::new(MANIFEST_FILE_NAME)) {
                    paths.push(path.to_path_buf());
                }
                Ok(WalkControl::Continue)
            }
        })?;

        Ok(paths)
    }
}

/// Scripted [`DirVisitor`] for tests that need faults without a disk.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        Dir(PathBuf),
        File(PathBuf),
        Fail(PathBuf, io::ErrorKind),
    }

    impl Step {
        fn path(&self) -> &Path {
            match self {
                Self::Dir(p) | Self::File(p) | Self::Fail(p, _) => p,
            }
        }
    }

    /// Replays `steps` in order. `SkipDir` on a `Dir` step drops every later
    /// step below that directory.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct ScriptedVisitor {
        pub(crate) steps: Vec<Step>,
    }

    impl ScriptedVisitor {
        pub(crate) fn new(steps: Vec<Step>) -> Self {
            Self { steps }
        }
    }

    impl DirVisitor for ScriptedVisitor {
        fn walk(&self, root: &Path, _follow_dist: bool, visit: &mut VisitFn<'_>) -> Result<()> {
            let mut skipped: Vec<PathBuf> = Vec::new();
            for step in &self.steps {
                let path = step.path();
                if !path.starts_with(root) || skipped.iter().any(|s| path.starts_with(s)) {
                    continue;
                }
                match step {
                    Step::Dir(p) => {
                        if visit(Visit::Entry { path: p, is_dir: true })? == WalkControl::SkipDir {
                            skipped.push(p.clone());
                        }
                    }
                    Step::File(p) => {
                        visit(Visit::Entry { path: p, is_dir: false })?;
                    }
                    Step::Fail(p, kind) => {
                        visit(Visit::Failed {
                            path: p,
                            error: io::Error::new(*kind, "scripted failure"),
                        })?;
                    }
                }
            }
            Ok(())
        }
    }
}
