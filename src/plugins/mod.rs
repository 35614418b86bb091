//! Plugin bundle discovery
//!
//! Turns a set of root directories into plugin bundles. A plugin is any
//! directory holding a `plugin.json` manifest; a plugin nested inside
//! another plugin's directory travels with it as a child.
//!
//! # Architecture
//!
//! - **walker**: Recursive traversal that collects manifest paths
//! - **manifest**: Reading and validating a single `plugin.json`
//! - **fs**: Live and frozen filesystem views bound to a plugin directory
//! - **dedup**: Collapsing plugins that declare the same id
//! - **bundle**: Grouping nested plugins under their enclosing plugin
//! - **finder**: The discovery pass tying the stages together
//! - **types**: Plugin classes, manifests, sources, and results
//!
//! # Plugin Directory Structure
//!
//! ```text
//! /var/lib/plugscout/plugins/
//! ├── clock-panel/
//! │   ├── plugin.json
//! │   └── module.js
//! ├── my-app/
//! │   ├── plugin.json
//! │   ├── datasources/
//! │   │   └── sql/
//! │   │       └── plugin.json      <- child of my-app
//! │   └── node_modules/            <- never scanned
//! └── core-thing/
//!     ├── plugin.json
//!     └── dist/
//!         └── plugin.json          <- preferred when following dist
//! ```
//!
//! # Example plugin.json
//!
//! ```json
//! {
//!   "id": "my-app",
//!   "type": "app",
//!   "name": "My App",
//!   "info": { "version": "2.1.0", "author": { "name": "Acme" } },
//!   "dependencies": { "hostVersion": ">=9.0.0", "plugins": [] }
//! }
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use plugscout::config::FeatureToggles;
//! use plugscout::plugins::{Finder, LocalSource, PluginClass};
//!
//! let finder = Finder::new(false, FeatureToggles::default());
//! let source = LocalSource::new(
//!     PluginClass::External,
//!     vec![PathBuf::from("/var/lib/plugscout/plugins")],
//! );
//!
//! let bundles = finder.find(&source).unwrap();
//! println!("Found {} bundles", bundles.len());
//! ```

pub mod bundle;
pub mod dedup;
pub mod finder;
pub mod fs;
mod manifest;
pub mod types;
pub mod walker;

pub use bundle::{compose_bundles, is_descendant, NestingPolicy};
pub use dedup::{selector_for, DistPreference, DuplicateFilter, DuplicateSelector, FirstFound};
pub use finder::{DiscoveryStage, Finder, SourceBundles};
pub use fs::{build_view, LocalFs, PluginFs, StaticFs};
pub use manifest::{
    manifest_dir, read_manifest, validate_manifest, MANIFEST_EXTENSION, MANIFEST_FILE_NAME,
};
pub use types::{
    BundleSummary, FoundBundle, FoundPlugin, LocalSource, ManifestDescriptor, PluginClass,
    PluginSource, PluginSummary, PluginType,
};
pub use walker::{DirVisitor, ManifestWalker, Visit, WalkControl, WalkDirVisitor};
