//! Build command implementation.

use super::{compile_page, load_plugin, write_view};
use anyhow::{Context, Result};
use mdpress_core::bundle::site_data_module;
use std::fs;
use std::path::Path;

/// Compile every page into `<out_dir>/.temp`
///
/// Dead links are reported as they are found; the build fails once, after
/// all pages were written, if there were any.
pub async fn build_site(config_path: &Path) -> Result<()> {
    let mut plugin = load_plugin(config_path, false).await?;
    tracing::info!("Building site: {}", plugin.site_data().title);

    let temp_dir = plugin.config().temp_dir();
    fs::create_dir_all(&temp_dir).context("Failed to create output directory")?;

    let pages = plugin.site().pages.clone();
    let mut page_data = Vec::with_capacity(pages.len());
    for page in &pages {
        let compiled = compile_page(&mut plugin, page)?;
        write_view(&temp_dir, page, &compiled.view_source)?;
        page_data.push(compiled.page_data.clone());
    }

    let pages_json = serde_json::to_string_pretty(&page_data)?;
    fs::write(temp_dir.join("pages.json"), pages_json).context("Failed to write pages.json")?;

    let site_module = site_data_module(plugin.site_data())?;
    fs::write(temp_dir.join("siteData.js"), site_module).context("Failed to write siteData.js")?;

    plugin.render_start()?;

    tracing::info!("✓ Built {} pages", pages.len());
    tracing::info!("✓ Output written to {:?}", temp_dir);
    Ok(())
}
