//! Scan command: run discovery over configured and ad-hoc sources.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use plugscout::config::ScoutConfig;
use plugscout::plugins::{
    BundleSummary, Finder, LocalSource, NestingPolicy, PluginClass, PluginSource, SourceBundles,
};

/// Options for `plugscout scan`.
#[derive(Debug, Default)]
pub(crate) struct ScanOptions {
    pub config: Option<PathBuf>,
    pub dev: bool,
    pub sources: Vec<String>,
    pub nesting: Option<NestingPolicy>,
    pub json: bool,
}

/// JSON output for one source.
#[derive(Debug, Serialize)]
struct SourceReport {
    class: PluginClass,
    bundles: Vec<BundleSummary>,
}

impl From<&SourceBundles> for SourceReport {
    fn from(found: &SourceBundles) -> Self {
        Self {
            class: found.class,
            bundles: found.bundles.iter().map(|b| b.summary()).collect(),
        }
    }
}

/// Parse a `CLASS=PATH` source argument.
pub(crate) fn parse_source_arg(raw: &str) -> Result<(PluginClass, PathBuf)> {
    let (class, path) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid source '{}'. Use CLASS=PATH, e.g. external=/opt/plugins", raw))?;
    let class: PluginClass = class.parse().map_err(|e: String| anyhow!(e))?;
    if path.trim().is_empty() {
        return Err(anyhow!("Source '{}' has an empty path", raw));
    }
    Ok((class, plugscout::config::expand_home(path.trim())))
}

/// Load the configuration the scan runs with: file, then environment, then
/// command-line flags.
pub(crate) fn resolve_config(opts: &ScanOptions) -> Result<ScoutConfig> {
    let mut config = match &opts.config {
        Some(path) => ScoutConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => ScoutConfig::load().with_context(|| "Failed to load configuration")?,
    };

    if opts.dev {
        config.dev_mode = true;
    }
    if let Some(nesting) = opts.nesting {
        config.nesting = nesting;
    }
    Ok(config)
}

pub(crate) async fn cmd_scan(opts: ScanOptions) -> Result<()> {
    let config = resolve_config(&opts)?;

    let mut sources: Vec<Arc<dyn PluginSource>> = config
        .plugin_sources()
        .into_iter()
        .map(|s| Arc::new(s) as Arc<dyn PluginSource>)
        .collect();
    for raw in &opts.sources {
        let (class, path) = parse_source_arg(raw)?;
        sources.push(Arc::new(LocalSource::new(class, vec![path])));
    }

    let finder = Finder::from_config(&config);
    let results = finder
        .find_all(sources)
        .await
        .with_context(|| "Plugin discovery failed")?;

    if opts.json {
        let report: Vec<SourceReport> = results.iter().map(SourceReport::from).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&report).with_context(|| "Failed to encode results")?
        );
    } else {
        print!("{}", render_tree(&results));
    }
    Ok(())
}

/// Render scan results as an indented tree.
pub(crate) fn render_tree(results: &[SourceBundles]) -> String {
    let mut out = String::new();
    for found in results {
        let _ = writeln!(out, "{} ({} bundles)", found.class, found.bundles.len());
        for bundle in &found.bundles {
            let p = &bundle.primary;
            let _ = writeln!(
                out,
                "  {} [{}] {}",
                p.id(),
                p.manifest.plugin_type,
                display_dir(p.dir())
            );
            for child in &bundle.children {
                let rel = child.dir().strip_prefix(p.dir()).unwrap_or(child.dir());
                let _ = writeln!(
                    out,
                    "    └── {} [{}] {}",
                    child.id(),
                    child.manifest.plugin_type,
                    display_dir(rel)
                );
            }
        }
    }
    out
}

fn display_dir(dir: &Path) -> String {
    dir.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugscout::config::FeatureToggles;
    use std::fs;
    use tempfile::TempDir;

    fn write_plugin(dir: &Path, id: &str, kind: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("plugin.json"),
            format!(r#"{{"id": "{}", "type": "{}"}}"#, id, kind),
        )
        .unwrap();
    }

    #[test]
    fn test_parse_source_arg() {
        let (class, path) = parse_source_arg("core=/usr/share/plugins").unwrap();
        assert_eq!(class, PluginClass::Core);
        assert_eq!(path, PathBuf::from("/usr/share/plugins"));

        assert!(parse_source_arg("/no/class").is_err());
        assert!(parse_source_arg("weird=/x").is_err());
        assert!(parse_source_arg("external=").is_err());
    }

    #[test]
    fn test_resolve_config_flags_win() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"dev_mode": false, "nesting": "all_ancestors"}"#).unwrap();

        let config = resolve_config(&ScanOptions {
            config: Some(path),
            dev: true,
            nesting: Some(NestingPolicy::NearestAncestor),
            ..Default::default()
        })
        .unwrap();

        assert!(config.dev_mode);
        assert_eq!(config.nesting, NestingPolicy::NearestAncestor);
    }

    #[test]
    fn test_resolve_config_bad_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let result = resolve_config(&ScanOptions {
            config: Some(path),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_render_tree_shows_children_relative() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        write_plugin(&app, "my-app", "app");
        write_plugin(&app.join("ds"), "my-ds", "datasource");

        let finder = Finder::new(true, FeatureToggles::default());
        let source = LocalSource::new(PluginClass::External, vec![tmp.path().to_path_buf()]);
        let bundles = finder.find(&source).unwrap();

        let tree = render_tree(&[SourceBundles {
            class: PluginClass::External,
            bundles,
        }]);

        assert!(tree.starts_with("external (1 bundles)\n"));
        assert!(tree.contains("  my-app [app] "));
        assert!(tree.contains("    └── my-ds [datasource] ds\n"));
    }

    #[test]
    fn test_source_report_json_shape() {
        let tmp = TempDir::new().unwrap();
        write_plugin(&tmp.path().join("clock"), "clock", "panel");

        let finder = Finder::new(true, FeatureToggles::default());
        let source = LocalSource::new(PluginClass::Bundled, vec![tmp.path().to_path_buf()]);
        let found = SourceBundles {
            class: PluginClass::Bundled,
            bundles: finder.find(&source).unwrap(),
        };

        let value = serde_json::to_value(SourceReport::from(&found)).unwrap();
        assert_eq!(value["class"], "bundled");
        assert_eq!(value["bundles"][0]["primary"]["id"], "clock");
        assert_eq!(value["bundles"][0]["primary"]["type"], "panel");
        assert!(value["bundles"][0]["children"].as_array().unwrap().is_empty());
    }
}
