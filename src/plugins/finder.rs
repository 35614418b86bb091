//! The discovery pass
//!
//! [`Finder`] turns a [`PluginSource`] into bundles:
//!
//! ```text
//! Idle → CollectingRoots → ReadingManifests → BuildingViews
//!      → Deduplicating → Composing → Done
//! ```
//!
//! Any fatal error moves the pass to `Aborted` and nothing is returned but
//! the error. Recoverable problems (missing roots, bad manifests) are logged
//! and skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, info_span, trace, warn};
use uuid::Uuid;

use crate::config::{FeatureToggles, ScoutConfig};
use crate::error::{Result, ScoutError};

use super::bundle::{compose_bundles, NestingPolicy};
use super::dedup::{selector_for, DuplicateFilter, DuplicateSelector};
use super::fs::build_view;
use super::manifest::{manifest_dir, read_manifest};
use super::types::{FoundBundle, FoundPlugin, ManifestDescriptor, PluginClass, PluginSource};
use super::walker::{DirVisitor, ManifestWalker};

/// Where a discovery pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStage {
    Idle,
    CollectingRoots,
    ReadingManifests,
    BuildingViews,
    Deduplicating,
    Composing,
    Done,
    Aborted,
}

impl DiscoveryStage {
    /// The stage a successful pass moves to next. Terminal stages stay put.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::CollectingRoots,
            Self::CollectingRoots => Self::ReadingManifests,
            Self::ReadingManifests => Self::BuildingViews,
            Self::BuildingViews => Self::Deduplicating,
            Self::Deduplicating => Self::Composing,
            Self::Composing => Self::Done,
            Self::Done => Self::Done,
            Self::Aborted => Self::Aborted,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for DiscoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Stage bookkeeping for one pass.
#[derive(Debug)]
struct Pass {
    stage: DiscoveryStage,
}

impl Pass {
    fn new() -> Self {
        Self {
            stage: DiscoveryStage::Idle,
        }
    }

    fn advance(&mut self) {
        let next = self.stage.next();
        trace!(from = %self.stage, to = %next, "Discovery stage");
        self.stage = next;
    }

    fn finish(&mut self) {
        trace!(from = %self.stage, to = %DiscoveryStage::Done, "Discovery stage");
        self.stage = DiscoveryStage::Done;
    }

    fn abort(&mut self) {
        trace!(from = %self.stage, to = %DiscoveryStage::Aborted, "Discovery stage");
        self.stage = DiscoveryStage::Aborted;
    }
}

/// Bundles discovered for one source by [`Finder::find_all`].
#[derive(Debug, Clone)]
pub struct SourceBundles {
    pub class: PluginClass,
    pub bundles: Vec<FoundBundle>,
}

/// Runs discovery passes.
///
/// Cheap to clone; the traversal and selection strategies are shared.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use plugscout::config::FeatureToggles;
/// use plugscout::plugins::{Finder, LocalSource, PluginClass};
///
/// let finder = Finder::new(false, FeatureToggles::default());
/// let source = LocalSource::new(PluginClass::External, vec![PathBuf::from("/var/lib/plugins")]);
/// for bundle in finder.find(&source).unwrap() {
///     println!("{} (+{} children)", bundle.primary.id(), bundle.children.len());
/// }
/// ```
#[derive(Clone)]
pub struct Finder {
    hardened: bool,
    features: FeatureToggles,
    nesting: NestingPolicy,
    walker: ManifestWalker,
    selector: Arc<dyn DuplicateSelector>,
}

impl fmt::Debug for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("hardened", &self.hardened)
            .field("features", &self.features)
            .field("nesting", &self.nesting)
            .field("walker", &self.walker)
            .finish_non_exhaustive()
    }
}

impl Finder {
    /// Outside dev mode every plugin gets a frozen view.
    pub fn new(dev_mode: bool, features: FeatureToggles) -> Self {
        let selector = selector_for(&features);
        Self {
            hardened: !dev_mode,
            features,
            nesting: NestingPolicy::default(),
            walker: ManifestWalker::default(),
            selector,
        }
    }

    pub fn from_config(config: &ScoutConfig) -> Self {
        Self::new(config.dev_mode, config.features.clone()).with_nesting(config.nesting)
    }

    /// Replace the directory traversal.
    pub fn with_visitor(mut self, visitor: Arc<dyn DirVisitor>) -> Self {
        self.walker = ManifestWalker::new(visitor);
        self
    }

    /// Replace the duplicate selection policy.
    pub fn with_selector(mut self, selector: Arc<dyn DuplicateSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_nesting(mut self, nesting: NestingPolicy) -> Self {
        self.nesting = nesting;
        self
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    /// Core plugins are only looked for in `dist` folders when they can be
    /// built outside the host.
    pub fn follows_dist(&self, class: PluginClass) -> bool {
        !(class == PluginClass::Core && !self.features.external_core_plugins)
    }

    /// Run one discovery pass over `source`.
    ///
    /// # Errors
    /// - `ScoutError::Walk` if a root fails for a reason other than
    ///   not-found or permission denied
    /// - any view construction error in hardened mode
    /// - `ScoutError::InvalidSelection` from a misbehaving selector
    pub fn find(&self, source: &dyn PluginSource) -> Result<Vec<FoundBundle>> {
        let class = source.class();
        let span = info_span!("discovery", pass = %Uuid::new_v4(), class = %class);
        let _guard = span.enter();

        let mut pass = Pass::new();
        let result = self.run(source, &mut pass);
        if let Err(e) = &result {
            pass.abort();
            error!(error = %e, "Plugin discovery aborted");
        }
        result
    }

    fn run(&self, source: &dyn PluginSource, pass: &mut Pass) -> Result<Vec<FoundBundle>> {
        let class = source.class();
        let roots = source.plugin_uris();
        if roots.is_empty() {
            pass.finish();
            return Ok(Vec::new());
        }

        pass.advance();
        let manifest_paths = self.collect_manifest_paths(&roots, class)?;

        pass.advance();
        let found = read_manifests(&manifest_paths);

        pass.advance();
        let mut plugins = Vec::with_capacity(found.len());
        for (dir, manifest) in found {
            let fs = build_view(dir, self.hardened)?;
            plugins.push(FoundPlugin::new(manifest, fs));
        }

        pass.advance();
        let deduped = DuplicateFilter::new(Arc::clone(&self.selector)).filter(class, plugins)?;

        pass.advance();
        let bundles = compose_bundles(deduped, self.nesting);

        pass.advance();
        info!(
            roots = roots.len(),
            manifests = manifest_paths.len(),
            bundles = bundles.len(),
            "Plugin discovery finished"
        );
        Ok(bundles)
    }

    fn collect_manifest_paths(&self, roots: &[PathBuf], class: PluginClass) -> Result<Vec<PathBuf>> {
        let follow_dist = self.follows_dist(class);
        let mut manifest_paths = Vec::new();

        for root in roots {
            match root.try_exists() {
                Err(e) => {
                    warn!(
                        path = %root.display(),
                        error = %e,
                        "Skipping finding plugins as an error occurred"
                    );
                    continue;
                }
                Ok(false) => {
                    warn!(
                        path = %root.display(),
                        "Skipping finding plugins as directory does not exist"
                    );
                    continue;
                }
                Ok(true) => {}
            }

            let paths = self.walker.manifest_paths(root, follow_dist)?;
            debug!(
                root = %root.display(),
                follow_dist,
                manifests = paths.len(),
                "Scanned plugin root"
            );
            manifest_paths.extend(paths);
        }

        Ok(manifest_paths)
    }

    /// Run one pass per source on the blocking pool and collect the results
    /// in source order.
    ///
    /// Sources are scanned concurrently; only this task touches the combined
    /// result. The first failing source fails the whole call.
    ///
    /// # Errors
    /// Any error [`find`](Self::find) can return, or `ScoutError::Task` if a
    /// pass panicked.
    pub async fn find_all(&self, sources: Vec<Arc<dyn PluginSource>>) -> Result<Vec<SourceBundles>> {
        let tasks = sources.into_iter().map(|source| {
            let finder = self.clone();
            tokio::task::spawn_blocking(move || {
                let class = source.class();
                finder
                    .find(source.as_ref())
                    .map(|bundles| SourceBundles { class, bundles })
            })
        });

        let mut results = Vec::new();
        for joined in join_all(tasks).await {
            let outcome = joined.map_err(|e| ScoutError::Task(e.to_string()))?;
            results.push(outcome?);
        }
        Ok(results)
    }
}

/// Parse every manifest, keyed by its directory. Unreadable manifests are
/// skipped; a directory seen twice keeps the manifest read last.
fn read_manifests(paths: &[PathBuf]) -> BTreeMap<PathBuf, ManifestDescriptor> {
    let mut found = BTreeMap::new();

    for path in paths {
        let manifest = match read_manifest(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping plugin loading as its plugin.json could not be read"
                );
                continue;
            }
        };

        let dir = match manifest_dir(path) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    plugin = %manifest.id,
                    error = %e,
                    "Skipping plugin loading as absolute plugin.json path could not be calculated"
                );
                continue;
            }
        };

        if let Some(previous) = found.insert(dir, manifest) {
            debug!(plugin = %previous.id, "Replacing manifest found twice for the same directory");
        }
    }

    found
}
