//! Development watcher emitting hot updates.

use super::{compile_page, load_plugin, write_view};
use anyhow::{Context, Result};
use mdpress_core::bundle::site_data_module;
use mdpress_core::page_data::relative_path;
use mdpress_core::{HotUpdate, MdpressPlugin};
use mdpress_types::PAGE_DATA_EVENT;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub async fn dev_server(config_path: &Path) -> Result<()> {
    let mut plugin = load_plugin(config_path, false).await?;
    let src_dir = plugin.config().src_dir();
    let temp_dir = plugin.config().temp_dir();
    let out_dir = plugin.config().out_dir();

    let pages = plugin.site().pages.clone();
    for page in pages {
        match compile_page(&mut plugin, &page) {
            Ok(compiled) => write_view(&temp_dir, &page, &compiled.view_source)?,
            Err(err) => tracing::error!("{:#}", err),
        }
    }

    println!("Watching {:?} for changes (Ctrl+C to stop)...", src_dir);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut _watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )
    .context("Failed to initialize watcher")?;

    _watcher
        .watch(&src_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {:?}", src_dir))?;
    if let Some(config_file) = plugin.config().config_path().filter(|p| p.is_file()) {
        if !config_file.starts_with(&src_dir) {
            _watcher
                .watch(config_file, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {:?}", config_file))?;
        }
    }

    while let Some(event) = rx.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                eprintln!("Watcher error: {err}");
                continue;
            }
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            continue;
        }

        for path in event.paths {
            if is_generated(&path, &out_dir) {
                continue;
            }
            match plugin.handle_hot_update(&path).await {
                Ok(updates) => {
                    for update in updates {
                        apply_update(&mut plugin, &update)?;
                        println!("{}", describe_update(&update, &src_dir));
                    }
                }
                Err(err) => tracing::error!("{}", err),
            }
        }
    }

    Ok(())
}

/// Bring the files under the temp dir in line with a hot update
///
/// Route updates recompile every affected route that still exists and
/// delete the views of routes that are gone.
pub(crate) fn apply_update(plugin: &mut MdpressPlugin, update: &HotUpdate) -> Result<()> {
    let temp_dir = plugin.config().temp_dir();
    match update {
        HotUpdate::Page {
            payload,
            view_source,
        } => write_view(&temp_dir, payload.path.trim_start_matches('/'), view_source),
        HotUpdate::Routes { modules } => {
            let src_dir = plugin.config().src_dir();
            for module in modules {
                let page = relative_path(&src_dir, module);
                if plugin.site().dynamic_routes.find(module).is_some() {
                    let compiled = compile_page(plugin, &page)?;
                    write_view(&temp_dir, &page, &compiled.view_source)?;
                } else {
                    let stale = temp_dir.join(format!("{page}.vue"));
                    if stale.exists() {
                        fs::remove_file(&stale)
                            .with_context(|| format!("Failed to remove {:?}", stale))?;
                    }
                }
            }
            Ok(())
        }
        HotUpdate::SiteData { .. } => {
            let site_module = site_data_module(plugin.site_data())?;
            fs::create_dir_all(&temp_dir).context("Failed to create output directory")?;
            fs::write(temp_dir.join("siteData.js"), site_module)
                .context("Failed to write siteData.js")
        }
    }
}

fn is_generated(path: &Path, out_dir: &Path) -> bool {
    path.starts_with(out_dir)
        || path
            .components()
            .any(|component| component.as_os_str() == ".mdpress")
}

fn describe_update(update: &HotUpdate, src_dir: &Path) -> serde_json::Value {
    match update {
        HotUpdate::Page { payload, .. } => json!({
            "event": PAGE_DATA_EVENT,
            "data": payload,
        }),
        HotUpdate::Routes { modules } => {
            let modules: Vec<String> = modules
                .iter()
                .map(|module: &PathBuf| relative_path(src_dir, module))
                .collect();
            json!({
                "event": "mdpress:routes",
                "modules": modules,
            })
        }
        HotUpdate::SiteData { base_changed } => json!({
            "event": "mdpress:siteData",
            "baseChanged": base_changed,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_route_edit_rewrites_route_views() {
        let dir = tempdir().unwrap();
        write(dir.path(), "pkg/[name].md", "# Package\n\n<!-- @content -->\n");
        let paths = write(
            dir.path(),
            "pkg/[name].paths.yml",
            "paths:\n  - params: { name: a }\n  - params: { name: b }\n",
        );
        let mut plugin = load_plugin(&dir.path().join("mdpress.yml"), false).await.unwrap();
        let temp_dir = plugin.config().temp_dir();
        for page in plugin.site().pages.clone() {
            let compiled = compile_page(&mut plugin, &page).unwrap();
            write_view(&temp_dir, &page, &compiled.view_source).unwrap();
        }
        assert!(temp_dir.join("pkg/b.md.vue").exists());

        fs::write(
            &paths,
            "paths:\n  - params: { name: a }\n    content: Alpha docs\n  - params: { name: c }\n",
        )
        .unwrap();
        let updates = plugin.handle_hot_update(&paths).await.unwrap();
        assert!(matches!(updates.as_slice(), [HotUpdate::Routes { .. }]));
        for update in &updates {
            apply_update(&mut plugin, update).unwrap();
        }

        let a = fs::read_to_string(temp_dir.join("pkg/a.md.vue")).unwrap();
        assert!(a.contains("Alpha docs"));
        assert!(temp_dir.join("pkg/c.md.vue").exists());
        assert!(!temp_dir.join("pkg/b.md.vue").exists());
    }

    #[tokio::test]
    async fn test_config_edit_rewrites_site_data() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.md", "# Home\n");
        let config = write(dir.path(), "mdpress.yml", "site:\n  title: One\n");
        let mut plugin = load_plugin(&config, false).await.unwrap();

        fs::write(&config, "site:\n  title: Two\n").unwrap();
        for update in plugin.handle_hot_update(&config).await.unwrap() {
            apply_update(&mut plugin, &update).unwrap();
        }

        let site = fs::read_to_string(plugin.config().temp_dir().join("siteData.js")).unwrap();
        assert!(site.contains(r#"\"title\":\"Two\""#));
    }
}
