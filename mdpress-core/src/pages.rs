//! Page discovery.

use crate::page_data::relative_path;
use crate::routes::{is_dynamic_route, resolve_dynamic_routes, DynamicRoutes, PathsLoader};
use regex::Regex;
use std::path::Path;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Directories never scanned for pages
const SKIPPED_DIRS: &[&str] = &["node_modules", ".mdpress", ".git"];

#[derive(Error, Debug)]
pub enum PagesError {
    #[error("Failed to scan source directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Every page of a site
#[derive(Debug, Clone, Default)]
pub struct SitePages {
    /// Relative `.md` paths: static pages, then generated routes
    pub pages: Vec<String>,
    pub dynamic_routes: DynamicRoutes,
}

/// Relative paths of all markdown files under `src_dir`, sorted
///
/// `ignore_patterns` are regexes matched against the relative path.
pub fn discover_markdown_files(
    src_dir: &Path,
    ignore_patterns: &[String],
) -> Result<Vec<String>, PagesError> {
    let ignores = compile_ignore_patterns(ignore_patterns);
    let mut files = Vec::new();

    let walker = WalkDir::new(src_dir)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));
    for entry in walker {
        let entry = entry?;
        let is_markdown = entry.path().extension().and_then(|ext| ext.to_str()) == Some("md");
        if !entry.file_type().is_file() || !is_markdown {
            continue;
        }
        let rel = relative_path(src_dir, entry.path());
        if ignores.iter().any(|re| re.is_match(&rel)) {
            tracing::debug!("Ignoring {} due to ignore_patterns", rel);
            continue;
        }
        files.push(rel);
    }

    files.sort();
    Ok(files)
}

/// Discover pages and expand dynamic route templates
pub async fn resolve_pages<L>(
    src_dir: &Path,
    ignore_patterns: &[String],
    loader: &L,
) -> Result<SitePages, PagesError>
where
    L: PathsLoader + ?Sized,
{
    let (templates, mut pages): (Vec<String>, Vec<String>) =
        discover_markdown_files(src_dir, ignore_patterns)?
            .into_iter()
            .partition(|page| is_dynamic_route(page));

    let dynamic_routes = resolve_dynamic_routes(src_dir, &templates, loader).await;
    pages.extend(dynamic_routes.pages().map(str::to_string));

    Ok(SitePages {
        pages,
        dynamic_routes,
    })
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn compile_ignore_patterns(patterns: &[String]) -> Vec<Regex> {
    let mut compiled = Vec::new();
    for pat in patterns {
        match Regex::new(pat) {
            Ok(re) => compiled.push(re),
            Err(err) => tracing::warn!("Invalid ignore pattern '{}': {}", pat, err),
        }
    }
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::FilePathsLoader;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discovery_skips_dependencies_and_ignores() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "index.md", "# Home");
        touch(root, "guide/intro.md", "# Intro");
        touch(root, "guide/notes.txt", "x");
        touch(root, "node_modules/pkg/readme.md", "x");
        touch(root, ".mdpress/cache.md", "x");
        touch(root, "drafts/wip.md", "x");

        let files = discover_markdown_files(root, &["^drafts/".to_string()]).unwrap();
        assert_eq!(files, vec!["guide/intro.md", "index.md"]);
    }

    #[test]
    fn test_invalid_ignore_pattern_is_skipped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.md", "");
        let files = discover_markdown_files(dir.path(), &["(".to_string()]).unwrap();
        assert_eq!(files, vec!["a.md"]);
    }

    #[tokio::test]
    async fn test_resolve_pages_expands_templates() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "index.md", "# Home");
        touch(root, "pkg/[name].md", "# Package");
        touch(
            root,
            "pkg/[name].paths.yml",
            "paths:\n  - params: { name: core }\n  - params: { name: cli }\n",
        );
        touch(root, "[orphan].md", "# No generator");

        let site = resolve_pages(root, &[], &FilePathsLoader).await.unwrap();
        assert_eq!(site.pages, vec!["index.md", "pkg/core.md", "pkg/cli.md"]);
        assert_eq!(site.dynamic_routes.routes.len(), 2);
    }
}
