//! Dynamic routes.
//!
//! A page template such as `packages/[pkg].md` sits next to a generator
//! file (`packages/[pkg].paths.yml`) listing parameter sets. Each set
//! becomes one virtual page whose source is the template with the params
//! attached as a marker prefix. Any edit to the generator or one of its
//! dependencies re-runs resolution for all templates.

pub mod graph;
pub mod loader;

use crate::page_data::normalize_path;
use mdpress_types::RouteParams;
use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub use graph::RouteGraph;
pub use loader::{
    FilePathsLoader, LoadError, PathsFuture, PathsLoader, PathsSource, RouteModule,
    UserRouteConfig,
};

/// Marker opening the params prefix of a virtual route module
pub const PARAMS_START: &str = "__VP_PARAMS_START";
/// Marker closing the params prefix of a virtual route module
pub const PARAMS_END: &str = "__VP_PARAMS_END__";

pub static DYNAMIC_ROUTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\w+?)\]").unwrap());
static CONTENT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--\s*@content\s*-->").unwrap());

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Route {route} has no value for param `{param}`")]
    MissingParam { route: String, param: String },

    #[error("Failed to read route template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode params of {path}: {source}")]
    Params {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether a page path contains a `[param]` segment
pub fn is_dynamic_route(route: &str) -> bool {
    DYNAMIC_ROUTE.is_match(route)
}

/// One concrete page generated from a template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Template path relative to the source dir, e.g. `foo/[bar].md`
    pub route: String,
    /// Concrete path relative to the source dir, e.g. `foo/1.md`
    pub path: String,
    pub full_path: PathBuf,
    pub params: RouteParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Substitute every `[param]` segment of `route`
pub fn instantiate_route(route: &str, params: &RouteParams) -> Result<String, RouteError> {
    let mut missing = None;
    let path = DYNAMIC_ROUTE.replace_all(route, |caps: &Captures| match params.get(&caps[1]) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        }
        Some(other) => other.to_string(),
    });

    match missing {
        Some(param) => Err(RouteError::MissingParam {
            route: route.to_string(),
            param,
        }),
        None => Ok(path.into_owned()),
    }
}

/// Source of a virtual route module: params marker, then the template with
/// its `<!-- @content -->` marker replaced by the route's content
pub fn render_route_module(route: &RouteSpec, template: &str) -> Result<String, serde_json::Error> {
    let body = match &route.content {
        Some(content) => CONTENT_MARKER.replacen(template, 1, NoExpand(content)),
        None => template.into(),
    };
    Ok(format!(
        "{PARAMS_START}{}{PARAMS_END}{body}",
        serde_json::to_string(&route.params)?
    ))
}

/// Resolved routes plus the invalidation graph that produced them
#[derive(Debug, Clone, Default)]
pub struct DynamicRoutes {
    pub src_dir: PathBuf,
    pub routes: Vec<RouteSpec>,
    pub graph: RouteGraph,
}

impl DynamicRoutes {
    pub fn find(&self, full_path: &Path) -> Option<&RouteSpec> {
        self.routes.iter().find(|route| route.full_path == full_path)
    }

    /// Map a requested `.md` id to the virtual module it names
    pub fn resolve_id(&self, id: &str) -> Option<PathBuf> {
        if !id.ends_with(".md") {
            return None;
        }
        let candidate = Path::new(id);
        let normalized = if candidate.starts_with(&self.src_dir) {
            normalize_path(candidate)
        } else {
            normalize_path(&self.src_dir.join(id.trim_start_matches('/')))
        };
        self.find(&normalized).map(|route| route.full_path.clone())
    }

    /// Load a virtual route module, registering it against its template
    ///
    /// Returns `Ok(None)` when `id` is not a generated route.
    pub fn load(&mut self, id: &Path) -> Result<Option<String>, RouteError> {
        let Some(route) = self.find(id).cloned() else {
            return Ok(None);
        };
        let template = normalize_path(&self.src_dir.join(&route.route));
        self.graph.register_module(&template, id);

        let base = fs::read_to_string(&template).map_err(|source| RouteError::Io {
            path: template.clone(),
            source,
        })?;
        render_route_module(&route, &base)
            .map(Some)
            .map_err(|source| RouteError::Params {
                path: route.path.clone(),
                source,
            })
    }

    /// Relative paths of every generated page
    pub fn pages(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.path.as_str())
    }
}

/// Expand every template in `templates` into concrete routes
///
/// Templates are processed in order and each generator's output order is
/// kept. A template without a generator, or whose generator fails, is
/// skipped with a warning.
pub async fn resolve_dynamic_routes<L>(src_dir: &Path, templates: &[String], loader: &L) -> DynamicRoutes
where
    L: PathsLoader + ?Sized,
{
    let mut resolved = DynamicRoutes {
        src_dir: src_dir.to_path_buf(),
        ..DynamicRoutes::default()
    };

    for route in templates {
        let template = normalize_path(&src_dir.join(route));
        let Some(paths_file) = loader.locate(&template) else {
            let expected: Vec<String> = loader
                .extensions()
                .iter()
                .map(|ext| format!("{}.paths.{ext}", route.trim_end_matches(".md")))
                .collect();
            warn!(
                "missing paths file for dynamic route {}: one of {} is needed.",
                route,
                expected.join(", ")
            );
            continue;
        };
        let paths_file = normalize_path(&paths_file);

        let module = match loader.load(&paths_file).await {
            Ok(module) => module,
            Err(err) => {
                warn!("invalid paths file export in {}: {}", paths_file.display(), err);
                continue;
            }
        };
        let configs = match module.paths.resolve().await {
            Ok(configs) => configs,
            Err(err) => {
                warn!("failed to generate paths for {}: {}", route, err);
                continue;
            }
        };

        resolved.graph.add_template(&template);
        resolved.graph.add_dependency(&paths_file, &template);
        let base_dir = paths_file.parent().unwrap_or(src_dir);
        for dep in &module.dependencies {
            resolved
                .graph
                .add_dependency(&normalize_path(&base_dir.join(dep)), &template);
        }

        for config in configs {
            let path = match instantiate_route(route, &config.params) {
                Ok(path) => path,
                Err(err) => {
                    warn!("{}", err);
                    continue;
                }
            };
            let full_path = normalize_path(&src_dir.join(&path));
            resolved.graph.register_module(&template, &full_path);
            resolved.routes.push(RouteSpec {
                route: route.clone(),
                path,
                full_path,
                params: config.params,
                content: config.content,
            });
        }
    }

    debug!(
        "resolved {} dynamic routes from {} templates",
        resolved.routes.len(),
        templates.len()
    );
    resolved
}
