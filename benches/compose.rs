//! Discovery Benchmarks
//!
//! Run with: cargo bench --bench compose

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use plugscout::config::FeatureToggles;
use plugscout::plugins::{
    compose_bundles, Finder, FoundPlugin, LocalFs, LocalSource, ManifestDescriptor,
    NestingPolicy, PluginClass,
};

/// `apps` top-level plugins, each with `nested` children one level down.
fn plugin_forest(apps: usize, nested: usize) -> Vec<FoundPlugin> {
    let mut plugins = Vec::with_capacity(apps * (nested + 1));
    for a in 0..apps {
        let app_dir = PathBuf::from(format!("/plugins/app-{}", a));
        for n in 0..nested {
            plugins.push(plugin(
                &format!("app-{}-ds-{}", a, n),
                app_dir.join(format!("ds-{}", n)),
            ));
        }
        plugins.push(plugin(&format!("app-{}", a), app_dir));
    }
    plugins
}

fn plugin(id: &str, dir: PathBuf) -> FoundPlugin {
    let manifest: ManifestDescriptor =
        serde_json::from_value(serde_json::json!({ "id": id, "type": "app" })).unwrap();
    FoundPlugin::new(manifest, Arc::new(LocalFs::new(dir)))
}

fn benchmark_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose_bundles");

    for (apps, nested) in [(10, 2), (50, 4), (200, 4)] {
        let plugins = plugin_forest(apps, nested);
        group.throughput(Throughput::Elements(plugins.len() as u64));

        for policy in [NestingPolicy::AllAncestors, NestingPolicy::NearestAncestor] {
            group.bench_function(format!("{}_{}x{}", policy, apps, nested), |b| {
                b.iter(|| compose_bundles(black_box(plugins.clone()), policy));
            });
        }
    }

    group.finish();
}

fn benchmark_find(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    for a in 0..50 {
        let app = tmp.path().join(format!("app-{}", a));
        std::fs::create_dir_all(app.join("ds")).unwrap();
        std::fs::create_dir_all(app.join("node_modules").join("dep")).unwrap();
        std::fs::write(
            app.join("plugin.json"),
            format!(r#"{{"id": "app-{}", "type": "app"}}"#, a),
        )
        .unwrap();
        std::fs::write(
            app.join("ds").join("plugin.json"),
            format!(r#"{{"id": "app-{}-ds", "type": "datasource"}}"#, a),
        )
        .unwrap();
        std::fs::write(app.join("module.js"), "export {}").unwrap();
    }

    let source = LocalSource::new(PluginClass::External, vec![tmp.path().to_path_buf()]);
    let mut group = c.benchmark_group("find");

    for (name, dev_mode) in [("live_views", true), ("frozen_views", false)] {
        let finder = Finder::new(dev_mode, FeatureToggles::default());
        group.bench_function(name, |b| {
            b.iter(|| finder.find(black_box(&source)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_compose, benchmark_find);
criterion_main!(benches);
