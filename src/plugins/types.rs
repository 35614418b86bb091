//! Plugin types for PlugScout
//!
//! This module defines the types that flow through a discovery pass: the
//! manifest descriptor parsed from `plugin.json`, the plugin classification
//! and source abstraction, and the found plugin and bundle structures
//! handed to the loader.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fs::PluginFs;

/// Where a set of plugins comes from. Drives dist-folder handling and
/// duplicate precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginClass {
    /// Shipped with and versioned alongside the host.
    Core,
    /// Pre-installed next to the host but built separately.
    Bundled,
    /// Installed by the operator.
    External,
}

impl PluginClass {
    /// Returns the canonical string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Bundled => "bundled",
            Self::External => "external",
        }
    }
}

impl fmt::Display for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PluginClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "bundled" => Ok(Self::Bundled),
            "external" => Ok(Self::External),
            other => Err(format!(
                "unknown plugin class '{}' (expected core, bundled or external)",
                other
            )),
        }
    }
}

/// The `type` discriminator of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    App,
    Datasource,
    Panel,
    Renderer,
    #[serde(rename = "secretsmanager")]
    SecretsManager,
}

impl PluginType {
    /// Returns the canonical string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Datasource => "datasource",
            Self::Panel => "panel",
            Self::Renderer => "renderer",
            Self::SecretsManager => "secretsmanager",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity parsed from a plugin's `plugin.json` file.
///
/// Only `id` and `type` are required. Everything else the loader may want
/// is either modelled here with a default or kept verbatim in `extra`.
///
/// # Example
///
/// ```json
/// {
///   "id": "acme-clock-panel",
///   "type": "panel",
///   "name": "Clock",
///   "info": {
///     "version": "2.1.0",
///     "description": "Shows the time",
///     "author": { "name": "Acme", "url": "https://acme.example" }
///   },
///   "dependencies": {
///     "hostVersion": ">=10.0.0",
///     "plugins": [{ "id": "acme-datasource", "version": "^1" }]
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDescriptor {
    /// Unique plugin identifier.
    pub id: String,

    /// Plugin type discriminator.
    #[serde(rename = "type")]
    pub plugin_type: PluginType,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Version and authorship metadata.
    #[serde(default)]
    pub info: ManifestInfo,

    /// Host and plugin requirements.
    #[serde(default)]
    pub dependencies: ManifestDependencies,

    /// Every other top-level field, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Informational block of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestInfo {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<ManifestAuthor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAuthor {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Requirements declared by a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDependencies {
    /// Semver range of host versions the plugin supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_version: Option<String>,

    /// Other plugins this one needs.
    #[serde(default)]
    pub plugins: Vec<PluginDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    pub id: String,

    #[serde(default)]
    pub version: String,
}

/// A configured origin of plugins.
///
/// Implementations must return the same roots and class for the whole
/// duration of one discovery pass.
pub trait PluginSource: Send + Sync {
    /// Classification shared by every plugin found under this source.
    fn class(&self) -> PluginClass;

    /// Root directories to scan. May be empty.
    fn plugin_uris(&self) -> Vec<PathBuf>;
}

/// A source backed by a fixed list of local directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    class: PluginClass,
    paths: Vec<PathBuf>,
}

impl LocalSource {
    /// Create a source of the given class over `paths`.
    pub fn new(class: PluginClass, paths: Vec<PathBuf>) -> Self {
        Self { class, paths }
    }
}

impl PluginSource for LocalSource {
    fn class(&self) -> PluginClass {
        self.class
    }

    fn plugin_uris(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }
}

/// A plugin whose manifest was read and whose directory has been wrapped in
/// a filesystem view.
#[derive(Debug, Clone)]
pub struct FoundPlugin {
    /// The parsed manifest.
    pub manifest: ManifestDescriptor,

    /// Read access to the plugin directory.
    pub fs: Arc<dyn PluginFs>,
}

impl FoundPlugin {
    /// Create a found plugin from its manifest and view.
    pub fn new(manifest: ManifestDescriptor, fs: Arc<dyn PluginFs>) -> Self {
        Self { manifest, fs }
    }

    /// The plugin id from its manifest.
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Absolute plugin directory.
    pub fn dir(&self) -> &Path {
        self.fs.base()
    }
}

/// One loadable unit: a primary plugin and the plugins nested below it.
#[derive(Debug, Clone)]
pub struct FoundBundle {
    pub primary: FoundPlugin,
    pub children: Vec<FoundPlugin>,
}

impl FoundBundle {
    /// Ids of the children, in bundle order.
    pub fn child_ids(&self) -> Vec<&str> {
        self.children.iter().map(FoundPlugin::id).collect()
    }

    /// A serializable projection of this bundle.
    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            primary: PluginSummary::from(&self.primary),
            children: self.children.iter().map(PluginSummary::from).collect(),
        }
    }
}

/// Serializable view of a found plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub version: String,
    pub dir: PathBuf,
}

impl From<&FoundPlugin> for PluginSummary {
    fn from(plugin: &FoundPlugin) -> Self {
        Self {
            id: plugin.manifest.id.clone(),
            plugin_type: plugin.manifest.plugin_type,
            version: plugin.manifest.info.version.clone(),
            dir: plugin.dir().to_path_buf(),
        }
    }
}

/// Serializable view of a found bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSummary {
    pub primary: PluginSummary,
    #[serde(default)]
    pub children: Vec<PluginSummary>,
}
