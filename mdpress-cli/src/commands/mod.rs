//! CLI command implementations.

pub mod build;
pub mod dev;
pub mod routes;

pub use build::build_site;
pub use dev::dev_server;
pub use routes::list_routes;

use anyhow::{Context, Result};
use mdpress_core::compiler::CompiledPage;
use mdpress_core::plugin::file_timestamp;
use mdpress_core::{Config, FilePathsLoader, MdpressPlugin};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Load the config and resolve every page of the site
pub(crate) async fn load_plugin(config_path: &Path, ssr: bool) -> Result<MdpressPlugin> {
    let config_path = if config_path.is_absolute() {
        config_path.to_path_buf()
    } else {
        env::current_dir()
            .context("Failed to read current directory")?
            .join(config_path)
    };
    tracing::info!("Loading config from {:?}", config_path);
    let config = Config::load_or_default(&config_path).context("Failed to load configuration")?;
    MdpressPlugin::new(config, FilePathsLoader, ssr)
        .await
        .context("Failed to resolve pages")
}

/// Compile one page by its path relative to the source dir
pub(crate) fn compile_page(plugin: &mut MdpressPlugin, page: &str) -> Result<Arc<CompiledPage>> {
    let src_dir = plugin.config().src_dir();
    let full_path = src_dir.join(page);

    let (source, timestamp_path) = match plugin.site().dynamic_routes.find(&full_path).cloned() {
        Some(route) => {
            let source = plugin
                .load(&route.full_path.to_string_lossy())
                .with_context(|| format!("Failed to load route {}", page))?
                .with_context(|| format!("Route {} is not registered", page))?;
            (source, src_dir.join(&route.route))
        }
        None => {
            let source = fs::read_to_string(&full_path)
                .with_context(|| format!("Failed to read {:?}", full_path))?;
            (source, full_path.clone())
        }
    };

    plugin
        .compile(&source, &full_path, file_timestamp(&timestamp_path))
        .with_context(|| format!("Failed to compile {}", page))
}

/// Write a page's view module under the temp dir
pub(crate) fn write_view(temp_dir: &Path, page: &str, view_source: &str) -> Result<()> {
    let path = temp_dir.join(format!("{page}.vue"));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::write(&path, view_source).with_context(|| format!("Failed to write {:?}", path))
}
