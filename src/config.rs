//! Configuration for PlugScout
//!
//! Configuration lives in `~/.plugscout/config.json`. Every field has a
//! default, so a missing file or a partial file is fine. Environment
//! variables are applied on top of the file:
//!
//! | Variable                          | Effect                                   |
//! |-----------------------------------|------------------------------------------|
//! | `PLUGSCOUT_DEV_MODE`              | `dev_mode` (live views instead of frozen) |
//! | `PLUGSCOUT_EXTERNAL_CORE_PLUGINS` | `features.external_core_plugins`         |
//! | `PLUGSCOUT_NESTING`               | `nesting`                                |
//! | `PLUGSCOUT_PLUGIN_DIRS`           | replaces the external sources' roots     |
//!
//! # Example config.json
//!
//! ```json
//! {
//!   "dev_mode": false,
//!   "features": { "external_core_plugins": true },
//!   "nesting": "all_ancestors",
//!   "sources": [
//!     { "class": "core", "paths": ["/usr/share/host/plugins"] },
//!     { "class": "external", "paths": ["~/.plugscout/plugins"] }
//!   ],
//!   "log_format": "pretty"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ScoutError};
use crate::plugins::{LocalSource, NestingPolicy, PluginClass};

const ENV_DEV_MODE: &str = "PLUGSCOUT_DEV_MODE";
const ENV_EXTERNAL_CORE_PLUGINS: &str = "PLUGSCOUT_EXTERNAL_CORE_PLUGINS";
const ENV_NESTING: &str = "PLUGSCOUT_NESTING";
const ENV_PLUGIN_DIRS: &str = "PLUGSCOUT_PLUGIN_DIRS";

/// Feature flags that change discovery behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    /// Core plugins may be built externally: follow their `dist` folders
    /// and prefer `dist` builds among duplicates.
    pub external_core_plugins: bool,
}

/// One configured plugin source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub class: PluginClass,

    /// Root directories. A leading `~` expands to the home directory.
    #[serde(default)]
    pub paths: Vec<String>,
}

impl SourceConfig {
    /// Materialize this entry as a [`LocalSource`].
    pub fn to_source(&self) -> LocalSource {
        LocalSource::new(
            self.class,
            self.paths.iter().map(|p| expand_home(p)).collect(),
        )
    }
}

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Development mode: plugin views stay live instead of frozen.
    pub dev_mode: bool,

    pub features: FeatureToggles,

    /// How nested plugins attach to enclosing ones.
    pub nesting: NestingPolicy,

    /// Sources scanned by `plugscout scan`.
    pub sources: Vec<SourceConfig>,

    pub log_format: LogFormat,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            features: FeatureToggles::default(),
            nesting: NestingPolicy::default(),
            sources: vec![SourceConfig {
                class: PluginClass::External,
                paths: vec!["~/.plugscout/plugins".to_string()],
            }],
            log_format: LogFormat::default(),
        }
    }
}

impl ScoutConfig {
    /// The PlugScout home directory, `~/.plugscout`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".plugscout")
    }

    /// Default config file location.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// Load from `path`, then apply environment overrides.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// `ScoutError::Config` if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path` without looking at the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ScoutError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ScoutError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `PLUGSCOUT_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEV_MODE).and_then(|v| parse_bool(ENV_DEV_MODE, &v)) {
            self.dev_mode = value;
        }

        if let Some(value) = lookup(ENV_EXTERNAL_CORE_PLUGINS)
            .and_then(|v| parse_bool(ENV_EXTERNAL_CORE_PLUGINS, &v))
        {
            self.features.external_core_plugins = value;
        }

        if let Some(raw) = lookup(ENV_NESTING) {
            match raw.parse::<NestingPolicy>() {
                Ok(policy) => self.nesting = policy,
                Err(e) => warn!(variable = ENV_NESTING, error = %e, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_PLUGIN_DIRS) {
            let paths: Vec<String> = std::env::split_paths(&raw)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            self.sources.retain(|s| s.class != PluginClass::External);
            self.sources.push(SourceConfig {
                class: PluginClass::External,
                paths,
            });
        }
    }

    /// Every configured source, with `~` expanded.
    pub fn plugin_sources(&self) -> Vec<LocalSource> {
        self.sources.iter().map(SourceConfig::to_source).collect()
    }
}

fn parse_bool(variable: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(variable, value = raw, "Ignoring invalid boolean override");
            None
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
