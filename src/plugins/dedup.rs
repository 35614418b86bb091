//! Duplicate plugin resolution
//!
//! After directory-level dedup a source can still hold several plugins with
//! the same id, for example a core plugin shipped both as source and as a
//! `dist` build. [`DuplicateFilter`] reduces each such group to one
//! survivor. Which one survives is decided by an injected
//! [`DuplicateSelector`].

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::FeatureToggles;
use crate::error::{Result, ScoutError};

use super::types::{FoundPlugin, PluginClass};
use super::walker::DIST_DIR;

/// Picks the survivor among plugins that share an id.
///
/// `candidates` always holds at least two plugins, in discovery order. The
/// returned value is an index into `candidates` and must be deterministic
/// for a given input order. Any other index is a bug in the selector and
/// aborts the discovery pass.
#[cfg_attr(test, mockall::automock)]
pub trait DuplicateSelector: Send + Sync {
    fn select(&self, class: PluginClass, candidates: &[FoundPlugin]) -> usize;
}

/// Keeps whichever duplicate was discovered first.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstFound;

impl DuplicateSelector for FirstFound {
    fn select(&self, _class: PluginClass, _candidates: &[FoundPlugin]) -> usize {
        0
    }
}

/// Prefers (or avoids) duplicates whose directory is a `dist` build.
///
/// Falls back to the first candidate when none qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistPreference {
    pub prefer_dist: bool,
}

impl DuplicateSelector for DistPreference {
    fn select(&self, _class: PluginClass, candidates: &[FoundPlugin]) -> usize {
        candidates
            .iter()
            .position(|p| is_dist_build(p) == self.prefer_dist)
            .unwrap_or(0)
    }
}

/// Only the plugin's own directory name counts, so a `dist` somewhere
/// above the plugin root does not mark every candidate.
fn is_dist_build(plugin: &FoundPlugin) -> bool {
    plugin.dir().file_name() == Some(OsStr::new(DIST_DIR))
}

/// The selector the finder uses unless one is injected.
///
/// With externally built core plugins enabled the `dist` build wins;
/// otherwise the in-tree copy does.
pub fn selector_for(features: &FeatureToggles) -> Arc<dyn DuplicateSelector> {
    Arc::new(DistPreference {
        prefer_dist: features.external_core_plugins,
    })
}

/// Reduces every id to exactly one plugin.
#[derive(Clone)]
pub struct DuplicateFilter {
    selector: Arc<dyn DuplicateSelector>,
}

impl DuplicateFilter {
    pub fn new(selector: Arc<dyn DuplicateSelector>) -> Self {
        Self { selector }
    }

    /// Group `plugins` by id and keep one per group.
    ///
    /// Output order follows the first appearance of each id. Singletons pass
    /// through without consulting the selector.
    ///
    /// # Errors
    ///
    /// `ScoutError::InvalidSelection` if the selector answers with an index
    /// outside the group.
    pub fn filter(&self, class: PluginClass, plugins: Vec<FoundPlugin>) -> Result<Vec<FoundPlugin>> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<FoundPlugin>> = HashMap::new();

        for plugin in plugins {
            groups
                .entry(plugin.id().to_string())
                .or_insert_with_key(|id| {
                    order.push(id.clone());
                    Vec::new()
                })
                .push(plugin);
        }

        let mut survivors = Vec::with_capacity(order.len());
        for id in order {
            let Some(mut group) = groups.remove(&id) else {
                continue;
            };
            if group.len() == 1 {
                survivors.extend(group);
                continue;
            }

            let index = self.selector.select(class, &group);
            if index >= group.len() {
                return Err(ScoutError::InvalidSelection {
                    id,
                    index,
                    candidates: group.len(),
                });
            }

            let winner = group.remove(index);
            debug!(
                plugin = %id,
                dir = %winner.dir().display(),
                candidates = group.len() + 1,
                "Selected plugin among duplicates"
            );
            for loser in &group {
                warn!(
                    plugin = %id,
                    dir = %loser.dir().display(),
                    kept = %winner.dir().display(),
                    "Skipping duplicate plugin"
                );
            }
            survivors.push(winner);
        }

        Ok(survivors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::fs::LocalFs;
    use crate::plugins::types::{ManifestDescriptor, PluginType};
    use std::path::{Path, PathBuf};

    fn plugin(id: &str, dir: &str) -> FoundPlugin {
        let manifest: ManifestDescriptor =
            serde_json::from_value(serde_json::json!({ "id": id, "type": "panel" })).unwrap();
        assert_eq!(manifest.plugin_type, PluginType::Panel);
        FoundPlugin::new(manifest, Arc::new(LocalFs::new(PathBuf::from(dir))))
    }

    fn dirs(plugins: &[FoundPlugin]) -> Vec<&Path> {
        plugins.iter().map(FoundPlugin::dir).collect()
    }

    #[test]
    fn test_singletons_pass_through_without_selector() {
        let mut selector = MockDuplicateSelector::new();
        selector.expect_select().never();

        let filter = DuplicateFilter::new(Arc::new(selector));
        let out = filter
            .filter(
                PluginClass::External,
                vec![plugin("a", "/p/a"), plugin("b", "/p/b")],
            )
            .unwrap();

        assert_eq!(dirs(&out), vec![Path::new("/p/a"), Path::new("/p/b")]);
    }

    #[test]
    fn test_first_found_keeps_first() {
        let filter = DuplicateFilter::new(Arc::new(FirstFound));
        let out = filter
            .filter(
                PluginClass::External,
                vec![plugin("dup", "/plugins/x"), plugin("dup", "/plugins/y")],
            )
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].dir(), Path::new("/plugins/x"));
    }

    #[test]
    fn test_selector_sees_group_in_discovery_order() {
        let mut selector = MockDuplicateSelector::new();
        selector
            .expect_select()
            .withf(|class, candidates| {
                *class == PluginClass::Core
                    && candidates.len() == 3
                    && candidates[0].dir() == Path::new("/c/1")
                    && candidates[2].dir() == Path::new("/c/3")
            })
            .times(1)
            .return_const(2usize);

        let filter = DuplicateFilter::new(Arc::new(selector));
        let out = filter
            .filter(
                PluginClass::Core,
                vec![
                    plugin("dup", "/c/1"),
                    plugin("solo", "/c/solo"),
                    plugin("dup", "/c/2"),
                    plugin("dup", "/c/3"),
                ],
            )
            .unwrap();

        assert_eq!(dirs(&out), vec![Path::new("/c/3"), Path::new("/c/solo")]);
    }

    #[test]
    fn test_out_of_range_selection_is_fatal() {
        let mut selector = MockDuplicateSelector::new();
        selector.expect_select().return_const(5usize);

        let filter = DuplicateFilter::new(Arc::new(selector));
        let result = filter.filter(
            PluginClass::Bundled,
            vec![plugin("dup", "/a"), plugin("dup", "/b")],
        );

        match result {
            Err(ScoutError::InvalidSelection {
                id,
                index,
                candidates,
            }) => {
                assert_eq!(id, "dup");
                assert_eq!(index, 5);
                assert_eq!(candidates, 2);
            }
            other => panic!("Expected InvalidSelection, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_dist_preference() {
        let candidates = vec![
            plugin("clock", "/core/clock"),
            plugin("clock", "/core/clock/dist"),
        ];

        let prefer = DistPreference { prefer_dist: true };
        assert_eq!(prefer.select(PluginClass::Core, &candidates), 1);

        let avoid = DistPreference { prefer_dist: false };
        assert_eq!(avoid.select(PluginClass::Core, &candidates), 0);
    }

    #[test]
    fn test_dist_preference_falls_back_to_first() {
        let candidates = vec![plugin("clock", "/x/clock"), plugin("clock", "/y/clock")];
        let prefer = DistPreference { prefer_dist: true };
        assert_eq!(prefer.select(PluginClass::Core, &candidates), 0);
    }

    #[test]
    fn test_dist_preference_ignores_partial_names() {
        let candidates = vec![
            plugin("clock", "/x/clock/distribution"),
            plugin("clock", "/y/clock/dist"),
        ];
        let prefer = DistPreference { prefer_dist: true };
        assert_eq!(prefer.select(PluginClass::External, &candidates), 1);
    }

    #[test]
    fn test_dist_preference_ignores_dist_above_plugin() {
        let candidates = vec![
            plugin("clock", "/opt/dist/plugins/clock"),
            plugin("clock", "/opt/dist/plugins/clock/dist"),
        ];

        let prefer = DistPreference { prefer_dist: true };
        assert_eq!(prefer.select(PluginClass::Core, &candidates), 1);

        let avoid = DistPreference { prefer_dist: false };
        assert_eq!(avoid.select(PluginClass::Core, &candidates), 0);
    }

    #[test]
    fn test_selector_for_follows_feature_flag() {
        let candidates = vec![
            plugin("clock", "/core/clock"),
            plugin("clock", "/core/clock/dist"),
        ];

        let on = selector_for(&FeatureToggles {
            external_core_plugins: true,
        });
        let off = selector_for(&FeatureToggles::default());

        assert_eq!(on.select(PluginClass::Core, &candidates), 1);
        assert_eq!(off.select(PluginClass::Core, &candidates), 0);
    }
}
