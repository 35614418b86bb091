//! Manifest reading for PlugScout
//!
//! Opens a single `plugin.json`, parses it into a [`ManifestDescriptor`],
//! and checks that the identity it declares is usable. A bad manifest is
//! reported as an error and nothing else; the finder decides to skip it.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{Result, ScoutError};

use super::types::ManifestDescriptor;

/// File name every plugin directory carries.
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Extension accepted by [`read_manifest`], compared case-insensitively.
pub const MANIFEST_EXTENSION: &str = "json";

static PLUGIN_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._\-]*$").expect("valid plugin id pattern"));

/// Read and validate the manifest at `path`.
///
/// The file handle lives only inside this call and is closed on every
/// return path, parse failures included.
///
/// # Errors
/// - `ScoutError::InvalidManifestPath` if the extension is not `.json`;
///   the file is not opened in that case
/// - `ScoutError::Io` if the file cannot be opened
/// - `ScoutError::Manifest` if the JSON is malformed or lacks `id`/`type`
/// - `ScoutError::InvalidManifest` if the id is not well formed
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use plugscout::plugins::read_manifest;
///
/// let manifest = read_manifest(Path::new("/var/lib/plugins/clock/plugin.json")).unwrap();
/// println!("{} ({})", manifest.id, manifest.plugin_type);
/// ```
pub fn read_manifest(path: &Path) -> Result<ManifestDescriptor> {
    debug!(path = %path.display(), "Loading plugin manifest");

    let has_json_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION));
    if !has_json_ext {
        return Err(ScoutError::InvalidManifestPath(path.to_path_buf()));
    }

    let abs_path = std::path::absolute(path)?;
    let file = File::open(&abs_path)?;

    let manifest: ManifestDescriptor = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| ScoutError::Manifest {
            path: abs_path.clone(),
            source,
        })?;

    validate_manifest(&manifest)?;

    Ok(manifest)
}

/// Check that a parsed manifest carries a usable identity.
///
/// Only identity is checked. Whether the plugin would actually work is the
/// loader's concern.
///
/// # Errors
/// `ScoutError::InvalidManifest` if the id is blank or contains characters
/// outside `[a-zA-Z0-9._-]`, or starts with a separator.
pub fn validate_manifest(manifest: &ManifestDescriptor) -> Result<()> {
    if manifest.id.trim().is_empty() {
        return Err(ScoutError::InvalidManifest("id is empty".to_string()));
    }

    if !PLUGIN_ID_RE.is_match(&manifest.id) {
        return Err(ScoutError::InvalidManifest(format!(
            "Invalid plugin id '{}': must be alphanumeric characters, dots, underscores and hyphens, starting with alphanumeric",
            manifest.id
        )));
    }

    Ok(())
}

/// Directory that owns a manifest file, as an absolute path.
pub fn manifest_dir(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path)?;
    abs.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| ScoutError::InvalidManifestPath(abs.clone()))
}
