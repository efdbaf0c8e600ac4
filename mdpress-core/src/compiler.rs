//! Document-to-view compilation.
//!
//! `Compiler::compile` turns one markdown document into view source with an
//! embedded page-data export. Results are cached by source text, and a cache
//! hit skips every other step, including dead-link detection.

use crate::cache::{CompileCache, DEFAULT_CACHE_CAPACITY};
use crate::frontmatter::{split_frontmatter, FrontmatterError};
use crate::inject::inject_page_data;
use crate::markdown::{MarkdownRenderer, Render, RenderError};
use crate::page_data::{extract_page_data, normalize_path, relative_path, PageSource};
use crate::routes::{PARAMS_END, PARAMS_START};
use mdpress_types::{PageData, RouteParams};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

static QUERY_OR_FRAGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?#].*$").unwrap());
static PAGE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(html|md)$").unwrap());

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to parse front-matter of {file}: {source}")]
    Frontmatter {
        file: String,
        #[source]
        source: FrontmatterError,
    },

    #[error("Failed to render {file}: {source}")]
    Render {
        file: String,
        #[source]
        source: RenderError,
    },

    #[error("Invalid route params in {file}: {source}")]
    Params {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize page data of {file}: {source}")]
    PageData {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A link target that resolves to neither a page nor an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLink {
    /// Relative path of the document containing the link
    pub file: String,
    pub url: String,
}

/// Result of compiling one document
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPage {
    pub view_source: String,
    pub page_data: PageData,
    pub dead_links: Vec<DeadLink>,
}

/// Site layout the compiler resolves paths and links against
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub src_dir: PathBuf,
    pub public_dir: PathBuf,
    /// Known pages, relative to `src_dir`, without the `.md` extension
    pub pages: HashSet<String>,
    pub cache_capacity: usize,
}

impl CompilerOptions {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        let src_dir = src_dir.into();
        Self {
            public_dir: src_dir.join("public"),
            src_dir,
            pages: HashSet::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_public_dir(mut self, public_dir: impl Into<PathBuf>) -> Self {
        self.public_dir = public_dir.into();
        self
    }

    /// Register pages from their paths relative to `src_dir`
    pub fn with_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pages = page_keys(pages);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// Strip the `.md` extension from relative page paths
pub fn page_keys<I, S>(pages: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .map(|page| {
            let page = page.as_ref();
            page.strip_suffix(".md").unwrap_or(page).to_string()
        })
        .collect()
}

/// Markdown-to-view compiler owning its cache
pub struct Compiler<R = MarkdownRenderer> {
    renderer: R,
    options: CompilerOptions,
    cache: CompileCache<CompiledPage>,
}

impl Compiler<MarkdownRenderer> {
    pub fn new(renderer: MarkdownRenderer, options: CompilerOptions) -> Self {
        Self::with_renderer(renderer, options)
    }
}

impl<R: Render> Compiler<R> {
    pub fn with_renderer(renderer: R, options: CompilerOptions) -> Self {
        Self {
            renderer,
            cache: CompileCache::new(options.cache_capacity),
            options,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Replace the known page set, e.g. after dynamic routes were re-resolved
    pub fn set_pages(&mut self, pages: HashSet<String>) {
        self.options.pages = pages;
    }

    /// Compile one document into view source and page data
    pub fn compile(
        &mut self,
        source: &str,
        file: &Path,
        last_updated: u64,
    ) -> Result<Arc<CompiledPage>, CompileError> {
        let relative = relative_path(&self.options.src_dir, file);
        if let Some(cached) = self.cache.get(source) {
            debug!("[cache hit] {}", relative);
            return Ok(cached);
        }
        let start = Instant::now();

        let (params, content) = split_params(source).map_err(|source| CompileError::Params {
            file: relative.clone(),
            source,
        })?;
        let (frontmatter, body) =
            split_frontmatter(content).map_err(|source| CompileError::Frontmatter {
                file: relative.clone(),
                source,
            })?;
        let rendered = self
            .renderer
            .render(body)
            .map_err(|source| CompileError::Render {
                file: relative.clone(),
                source,
            })?;

        let dead_links = self.find_dead_links(&rendered.links, file, &relative);

        let page_data = extract_page_data(PageSource {
            frontmatter,
            body,
            headers: rendered.headers,
            relative_path: relative.clone(),
            last_updated,
            params,
        });

        let blocks = inject_page_data(rendered.hoisted, &page_data).map_err(|source| {
            CompileError::PageData {
                file: relative.clone(),
                source,
            }
        })?;
        let view_source = format!(
            "{}\n<template><div>{}</div></template>",
            blocks.join("\n"),
            rendered.html
        );

        debug!("[render] {} in {}ms.", relative, start.elapsed().as_millis());

        let compiled = Arc::new(CompiledPage {
            view_source,
            page_data,
            dead_links,
        });
        self.cache.set(source, Arc::clone(&compiled));
        Ok(compiled)
    }

    fn find_dead_links(&self, links: &[String], file: &Path, relative: &str) -> Vec<DeadLink> {
        let dir = file.parent().unwrap_or(Path::new(""));
        let mut dead = Vec::new();

        for link in links {
            let Some(target) = self.resolve_link(link, dir) else {
                continue;
            };
            if !self.target_exists(&target) {
                warn!("(!) Found dead link {} in file {}", link, relative);
                dead.push(DeadLink {
                    file: relative.to_string(),
                    url: link.clone(),
                });
            }
        }

        dead
    }

    /// Page key a link points at, relative to `src_dir`
    fn resolve_link(&self, link: &str, dir: &Path) -> Option<String> {
        let url = QUERY_OR_FRAGMENT.replace(link, "");
        if url.is_empty() {
            return None;
        }
        let mut url = PAGE_EXTENSION.replace(&url, "").into_owned();
        if url.ends_with('/') {
            url.push_str("index");
        }

        let resolved = match url.strip_prefix('/') {
            Some(rooted) => rooted.to_string(),
            None => relative_path(&self.options.src_dir, &normalize_path(&dir.join(&url))),
        };
        Some(percent_decode_str(&resolved).decode_utf8_lossy().into_owned())
    }

    fn target_exists(&self, target: &str) -> bool {
        self.options.pages.contains(target)
            || self.options.public_dir.join(format!("{target}.html")).exists()
            || self.options.public_dir.join(target).exists()
            || self.options.src_dir.join(target).is_file()
    }
}

/// Split the route-params marker prefix off a document
///
/// Virtual route modules carry their params as
/// `__VP_PARAMS_START<json>__VP_PARAMS_END__` ahead of the template content.
pub fn split_params(source: &str) -> Result<(Option<RouteParams>, &str), serde_json::Error> {
    let Some(rest) = source.strip_prefix(PARAMS_START) else {
        return Ok((None, source));
    };
    let Some(end) = rest.find(PARAMS_END) else {
        return Ok((None, source));
    };
    let params: RouteParams = serde_json::from_str(&rest[..end])?;
    Ok((Some(params), &rest[end + PARAMS_END.len()..]))
}
