//! Bundler-facing hooks.
//!
//! `MdpressPlugin` owns one compiler, one route table and the dead links of
//! each compiled document for a single build or dev-server run. Each method maps onto one
//! bundler hook; the host drives them in its own order.

use crate::bundle::{self, Bundle, Chunk, PageHashMap};
use crate::compiler::{page_keys, CompileError, CompiledPage, Compiler, CompilerOptions, DeadLink};
use crate::config::{Config, ConfigError};
use crate::markdown::MarkdownRenderer;
use crate::page_data::{normalize_path, relative_path};
use crate::pages::{resolve_pages, PagesError, SitePages};
use crate::routes::{FilePathsLoader, PathsLoader, RouteError};
use mdpress_types::{HotUpdatePayload, SiteData};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::{info, warn};

/// Virtual module id of the site data module
pub const SITE_DATA_REQUEST_PATH: &str = "/@siteData";

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("One or more pages contain dead links.{}", list_dead_links(.0))]
    DeadLinks(Vec<DeadLink>),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pages(#[from] PagesError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode site data: {0}")]
    SiteData(#[from] serde_json::Error),
}

/// Effect of a file change on the running site
#[derive(Debug, Clone, PartialEq)]
pub enum HotUpdate {
    /// Site config reloaded; the site data module must be reloaded
    SiteData { base_changed: bool },
    /// A document was recompiled
    Page {
        payload: HotUpdatePayload,
        view_source: String,
    },
    /// Virtual route modules invalidated by a generator or dependency edit
    Routes { modules: BTreeSet<PathBuf> },
}

pub struct MdpressPlugin<L = FilePathsLoader> {
    config: Config,
    loader: L,
    site_data: SiteData,
    site: SitePages,
    compiler: Compiler<MarkdownRenderer>,
    ssr: bool,
    /// Dead links by the relative path of the document containing them
    dead_links: BTreeMap<String, Vec<DeadLink>>,
    page_hashes: PageHashMap,
}

impl<L: PathsLoader> MdpressPlugin<L> {
    /// Discover pages and resolve dynamic routes for `config`
    pub async fn new(config: Config, loader: L, ssr: bool) -> Result<Self, PluginError> {
        let src_dir = config.src_dir();
        let site = resolve_pages(&src_dir, &config.ignore_patterns, &loader).await?;
        info!(
            "Resolved {} pages ({} from dynamic routes)",
            site.pages.len(),
            site.dynamic_routes.routes.len()
        );

        let options = CompilerOptions::new(&src_dir)
            .with_public_dir(config.public_dir())
            .with_pages(&site.pages);
        let compiler = Compiler::new(MarkdownRenderer::new(config.markdown.clone()), options);

        Ok(Self {
            site_data: config.site_data(),
            config,
            loader,
            site,
            compiler,
            ssr,
            dead_links: BTreeMap::new(),
            page_hashes: PageHashMap::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn site_data(&self) -> &SiteData {
        &self.site_data
    }

    pub fn site(&self) -> &SitePages {
        &self.site
    }

    pub fn dead_links(&self) -> Vec<DeadLink> {
        self.dead_links.values().flatten().cloned().collect()
    }

    pub fn page_hashes(&self) -> &PageHashMap {
        &self.page_hashes
    }

    /// Claim the site data module and generated route ids
    pub fn resolve_id(&self, id: &str) -> Option<String> {
        if id == SITE_DATA_REQUEST_PATH {
            return Some(id.to_string());
        }
        self.site
            .dynamic_routes
            .resolve_id(id)
            .map(|path| path.to_string_lossy().into_owned())
    }

    /// Source of a claimed virtual module
    pub fn load(&mut self, id: &str) -> Result<Option<String>, PluginError> {
        if id == SITE_DATA_REQUEST_PATH {
            return Ok(Some(bundle::site_data_module(&self.site_data)?));
        }
        Ok(self.site.dynamic_routes.load(Path::new(id))?)
    }

    /// Compile a `.md` module into view source
    pub fn transform(
        &mut self,
        code: &str,
        id: &str,
        last_updated: u64,
    ) -> Result<Option<String>, PluginError> {
        if !id.ends_with(".md") {
            return Ok(None);
        }
        let page = self.compile(code, Path::new(id), last_updated)?;
        Ok(Some(page.view_source.clone()))
    }

    /// Compile a document and record its dead links
    ///
    /// The links replace whatever was recorded for `file` before, so a fixed
    /// link stops being reported on the next compile.
    pub fn compile(
        &mut self,
        code: &str,
        file: &Path,
        last_updated: u64,
    ) -> Result<Arc<CompiledPage>, PluginError> {
        let page = self.compiler.compile(code, file, last_updated)?;
        let relative = relative_path(&self.compiler.options().src_dir, file);
        // a cache hit may carry links recorded against another path
        let links: Vec<DeadLink> = page
            .dead_links
            .iter()
            .map(|link| DeadLink {
                file: relative.clone(),
                url: link.url.clone(),
            })
            .collect();
        if links.is_empty() {
            self.dead_links.remove(&relative);
        } else {
            self.dead_links.insert(relative, links);
        }
        Ok(page)
    }

    /// Fail the build once if any compiled page has dead links
    pub fn render_start(&self) -> Result<(), PluginError> {
        if self.dead_links.is_empty() {
            return Ok(());
        }
        Err(PluginError::DeadLinks(self.dead_links()))
    }

    pub fn render_chunk(&self, chunk: &Chunk) -> Option<String> {
        bundle::render_chunk(chunk, self.ssr)
    }

    pub fn generate_bundle(&mut self, bundle: &mut Bundle) {
        let src_dir = self.config.src_dir();
        bundle::generate_bundle(bundle, self.ssr, &src_dir, &mut self.page_hashes);
    }

    /// React to a changed file
    ///
    /// Config edits reload site data. Generator and dependency edits re-run
    /// route resolution and report the affected route modules. Document
    /// edits recompile the document and produce a page-data payload.
    pub async fn handle_hot_update(&mut self, file: &Path) -> Result<Vec<HotUpdate>, PluginError> {
        let file = normalize_path(file);
        let mut updates = Vec::new();

        if self.config.config_path().map(normalize_path).as_deref() == Some(file.as_path()) {
            let reloaded = Config::load_or_default(&file)?;
            let site_data = reloaded.site_data();
            let base_changed = site_data.base != self.site_data.base;
            if base_changed {
                warn!("[mdpress]: config.base has changed. Please restart the dev server.");
            }
            self.site_data = site_data;
            self.config = reloaded;
            updates.push(HotUpdate::SiteData { base_changed });
            return Ok(updates);
        }

        if self.site.dynamic_routes.graph.is_tracked(&file) {
            let mut modules = self.site.dynamic_routes.graph.modules_for(&file);
            if !is_markdown(&file) {
                self.reload_pages().await?;
                modules.extend(self.site.dynamic_routes.graph.modules_for(&file));
            }
            updates.push(HotUpdate::Routes { modules });
        }

        if is_markdown(&file) {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|source| PluginError::Io {
                    path: file.clone(),
                    source,
                })?;
            let page = self.compile(&content, &file, file_timestamp(&file))?;
            let path = format!("/{}", relative_path(&self.config.src_dir(), &file));
            updates.push(HotUpdate::Page {
                payload: HotUpdatePayload {
                    path,
                    page_data: page.page_data.clone(),
                },
                view_source: page.view_source.clone(),
            });
        }

        Ok(updates)
    }

    async fn reload_pages(&mut self) -> Result<(), PluginError> {
        let src_dir = self.config.src_dir();
        self.site = resolve_pages(&src_dir, &self.config.ignore_patterns, &self.loader).await?;
        self.compiler.set_pages(page_keys(&self.site.pages));
        info!("Re-resolved {} dynamic routes", self.site.dynamic_routes.routes.len());
        Ok(())
    }
}

fn list_dead_links(links: &[DeadLink]) -> String {
    links
        .iter()
        .map(|link| format!("\n  {} in {}", link.url, link.file))
        .collect()
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Modification time in milliseconds since the epoch, or 0 when unknown
pub fn file_timestamp(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::OutputItem;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    async fn site(files: &[(&str, &str)]) -> (TempDir, MdpressPlugin) {
        let dir = tempdir().unwrap();
        for (rel, content) in files {
            write(dir.path(), rel, content);
        }
        let config = Config::load_or_default(dir.path().join("mdpress.yml")).unwrap();
        let plugin = MdpressPlugin::new(config, FilePathsLoader, false).await.unwrap();
        (dir, plugin)
    }

    #[tokio::test]
    async fn test_site_data_module() {
        let (_dir, mut plugin) = site(&[("index.md", "# Home")]).await;
        assert_eq!(
            plugin.resolve_id(SITE_DATA_REQUEST_PATH).as_deref(),
            Some(SITE_DATA_REQUEST_PATH)
        );
        let module = plugin.load(SITE_DATA_REQUEST_PATH).unwrap().unwrap();
        assert!(module.starts_with("export default \"{\\\"title\\\":\\\"mdpress\\\""));
        assert!(plugin.resolve_id("/other.js").is_none());
    }

    #[tokio::test]
    async fn test_dead_links_fail_render_start_once() {
        let (dir, mut plugin) = site(&[
            ("index.md", "[ok](./guide.md)"),
            ("guide.md", "[dead](./nope.md)"),
            ("other.md", "[dead](./gone.md)"),
        ])
        .await;
        assert!(plugin.render_start().is_ok());

        let index = dir.path().join("index.md");
        let view = plugin.transform("[ok](./guide.md)", &index.to_string_lossy(), 0).unwrap();
        assert!(view.unwrap().contains("<template><div>"));
        assert!(plugin.render_start().is_ok());

        for rel in ["guide.md", "other.md"] {
            let path = dir.path().join(rel);
            let code = fs::read_to_string(&path).unwrap();
            plugin.transform(&code, &path.to_string_lossy(), 0).unwrap();
        }
        assert_eq!(plugin.dead_links().len(), 2);
        let err = plugin.render_start().unwrap_err();
        assert!(matches!(&err, PluginError::DeadLinks(links) if links.len() == 2));
        let message = err.to_string();
        assert!(message.starts_with("One or more pages contain dead links."));
        assert!(message.contains("./nope.md in guide.md"));
        assert!(message.contains("./gone.md in other.md"));
    }

    #[tokio::test]
    async fn test_fixed_dead_link_is_forgotten() {
        let (dir, mut plugin) = site(&[("guide.md", "[dead](./nope.md)")]).await;
        let guide = dir.path().join("guide.md");

        plugin.compile("[dead](./nope.md)", &guide, 0).unwrap();
        assert!(plugin.render_start().is_err());

        plugin.compile("no links left", &guide, 0).unwrap();
        assert!(plugin.dead_links().is_empty());
        assert!(plugin.render_start().is_ok());
    }

    #[tokio::test]
    async fn test_cached_dead_links_belong_to_the_compiled_file() {
        let (dir, mut plugin) = site(&[]).await;
        plugin.compile("[dead](/gone/)", &dir.path().join("a.md"), 0).unwrap();
        plugin.compile("[dead](/gone/)", &dir.path().join("b.md"), 0).unwrap();

        let files: Vec<String> = plugin.dead_links().into_iter().map(|link| link.file).collect();
        assert_eq!(files, vec!["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn test_transform_ignores_other_modules() {
        let (_dir, mut plugin) = site(&[]).await;
        assert!(plugin.transform("body", "/x/app.js", 0).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_hot_update_payload() {
        let (dir, mut plugin) = site(&[("guide/index.md", "# Guide\n\n## Setup")]).await;
        let file = dir.path().join("guide/index.md");

        let updates = plugin.handle_hot_update(&file).await.unwrap();
        let [HotUpdate::Page { payload, view_source }] = updates.as_slice() else {
            panic!("expected one page update, got {updates:?}");
        };
        assert_eq!(payload.path, "/guide/index.md");
        assert_eq!(payload.page_data.title, "Guide");
        assert_eq!(payload.page_data.headers[0].slug, "setup");
        assert!(payload.applies_to("/guide/"));
        assert!(view_source.contains("__pageData"));
    }

    #[tokio::test]
    async fn test_config_hot_update_warns_on_base_change() {
        let (dir, mut plugin) = site(&[("mdpress.yml", "site:\n  title: One\n")]).await;
        let config = dir.path().join("mdpress.yml");

        fs::write(&config, "site:\n  title: Two\n").unwrap();
        let updates = plugin.handle_hot_update(&config).await.unwrap();
        assert_eq!(updates, vec![HotUpdate::SiteData { base_changed: false }]);
        assert_eq!(plugin.site_data().title, "Two");

        fs::write(&config, "site:\n  title: Two\n  base: /docs/\n").unwrap();
        let updates = plugin.handle_hot_update(&config).await.unwrap();
        assert_eq!(updates, vec![HotUpdate::SiteData { base_changed: true }]);
    }

    #[tokio::test]
    async fn test_dependency_edit_re_resolves_routes() {
        let (dir, mut plugin) = site(&[
            ("pkg/[name].md", "# {{ $params.name }}"),
            ("pkg/names.json", "[]"),
            (
                "pkg/[name].paths.yml",
                "paths:\n  - params: { name: a }\n  - params: { name: b }\ndependencies: [names.json]\n",
            ),
        ])
        .await;
        assert_eq!(plugin.site().pages, vec!["pkg/a.md", "pkg/b.md"]);

        let id = plugin.resolve_id("/pkg/a.md").unwrap();
        let source = plugin.load(&id).unwrap().unwrap();
        let page = plugin.compile(&source, Path::new(&id), 0).unwrap();
        assert_eq!(page.page_data.params.as_ref().unwrap()["name"], "a");

        write(
            dir.path(),
            "pkg/[name].paths.yml",
            "paths:\n  - params: { name: a }\n  - params: { name: c }\ndependencies: [names.json]\n",
        );
        let updates = plugin
            .handle_hot_update(&dir.path().join("pkg/names.json"))
            .await
            .unwrap();
        let [HotUpdate::Routes { modules }] = updates.as_slice() else {
            panic!("expected one routes update, got {updates:?}");
        };
        assert!(modules.contains(&dir.path().join("pkg/a.md")));
        assert!(modules.contains(&dir.path().join("pkg/b.md")));
        assert!(modules.contains(&dir.path().join("pkg/c.md")));
        assert_eq!(plugin.site().pages, vec!["pkg/a.md", "pkg/c.md"]);
    }

    #[tokio::test]
    async fn test_bundle_hooks_follow_build_mode() {
        let (dir, mut plugin) = site(&[]).await;
        let chunk = Chunk {
            name: "a.md".into(),
            file_name: "assets/a.md.ff00.js".into(),
            code: "const _hoisted_1 = /*#__PURE__*/createStaticVNode(\"<p>x</p>\", 1)".into(),
            is_entry: true,
            facade_module_id: Some(dir.path().join("guide/a.md")),
        };
        let marked = plugin.render_chunk(&chunk).unwrap();

        let mut bundle = Bundle::new();
        bundle.insert(
            "a.md".into(),
            OutputItem::Chunk(Chunk {
                code: marked,
                ..chunk
            }),
        );
        plugin.generate_bundle(&mut bundle);
        assert_eq!(plugin.page_hashes().get("guide_a.md").map(String::as_str), Some("ff00"));
        assert!(bundle.contains_key("a.md-lean"));
    }
}
