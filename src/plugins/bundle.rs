//! Bundle composition from directory containment
//!
//! A plugin whose directory lies strictly inside another plugin's directory
//! is that plugin's child. The composer turns the flat, deduplicated plugin
//! list into the bundles the loader consumes.
//!
//! With three or more nesting levels a plugin has several ancestors, and
//! [`NestingPolicy`] decides whether it is attached to all of them or only
//! to the closest one. In both cases a plugin heads its own bundle when it
//! has children or when nothing contains it, so every nested plugin ends up
//! inside at least one bundle and a nested leaf is never top level.

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{FoundBundle, FoundPlugin};

/// How nested plugins are attached to their enclosing plugins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingPolicy {
    /// Attach to every enclosing plugin. Matches the historical loader.
    #[default]
    AllAncestors,
    /// Attach only to the closest enclosing plugin.
    NearestAncestor,
}

impl NestingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllAncestors => "all_ancestors",
            Self::NearestAncestor => "nearest_ancestor",
        }
    }
}

impl fmt::Display for NestingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NestingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all_ancestors" | "all" => Ok(Self::AllAncestors),
            "nearest_ancestor" | "nearest" => Ok(Self::NearestAncestor),
            other => Err(format!(
                "unknown nesting policy '{}' (expected all-ancestors or nearest-ancestor)",
                other
            )),
        }
    }
}

/// True when `dir` lies strictly below `ancestor`.
///
/// Comparison is by path component, so `/p/ab` is not below `/p/a`, and a
/// relative remainder that climbs back out through `..` does not count.
pub fn is_descendant(ancestor: &Path, dir: &Path) -> bool {
    if ancestor == dir {
        return false;
    }
    match dir.strip_prefix(ancestor) {
        Ok(rel) => {
            rel.components().next().is_some()
                && !rel.components().any(|c| matches!(c, Component::ParentDir))
        }
        Err(_) => false,
    }
}

/// Build the bundle forest for a set of plugins with distinct directories.
///
/// Bundles are ordered by primary directory and children by directory.
pub fn compose_bundles(mut plugins: Vec<FoundPlugin>, policy: NestingPolicy) -> Vec<FoundBundle> {
    plugins.sort_by(|a, b| a.dir().cmp(b.dir()));

    let count = plugins.len();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut consumed = vec![false; count];

    for (child, plugin) in plugins.iter().enumerate() {
        let ancestors: Vec<usize> = (0..count)
            .filter(|&parent| is_descendant(plugins[parent].dir(), plugin.dir()))
            .collect();

        let attach_to: Vec<usize> = match policy {
            NestingPolicy::AllAncestors => ancestors,
            NestingPolicy::NearestAncestor => ancestors
                .into_iter()
                .max_by_key(|&parent| plugins[parent].dir().components().count())
                .into_iter()
                .collect(),
        };

        for parent in attach_to {
            debug!(
                parent = %plugins[parent].id(),
                child = %plugin.id(),
                rel_path = ?plugin.dir().strip_prefix(plugins[parent].dir()).ok(),
                "Adding child"
            );
            children[parent].push(child);
            consumed[child] = true;
        }
    }

    plugins
        .iter()
        .enumerate()
        .filter(|(index, _)| !children[*index].is_empty() || !consumed[*index])
        .map(|(index, primary)| FoundBundle {
            primary: primary.clone(),
            children: children[index]
                .iter()
                .map(|&child| plugins[child].clone())
                .collect(),
        })
        .collect()
}
