//! Path-generator loading.
//!
//! Route resolution never executes generator code itself. It asks a
//! `PathsLoader` for a `RouteModule`, so hosts can plug in whatever module
//! system they have. `FilePathsLoader` handles YAML and JSON generator files.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use mdpress_types::RouteParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Paths command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Invalid paths file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// One route instance requested by a generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRouteConfig {
    pub params: RouteParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

pub type PathsFuture = BoxFuture<'static, Result<Vec<UserRouteConfig>, LoadError>>;

/// The `paths` export of a generator module
pub enum PathsSource {
    List(Vec<UserRouteConfig>),
    Sync(Box<dyn Fn() -> Vec<UserRouteConfig> + Send + Sync>),
    Async(Box<dyn Fn() -> PathsFuture + Send + Sync>),
}

impl PathsSource {
    /// Produce the route list, awaiting the generator if needed
    pub async fn resolve(&self) -> Result<Vec<UserRouteConfig>, LoadError> {
        match self {
            PathsSource::List(paths) => Ok(paths.clone()),
            PathsSource::Sync(generate) => Ok(generate()),
            PathsSource::Async(generate) => generate().await,
        }
    }
}

impl fmt::Debug for PathsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathsSource::List(paths) => f.debug_tuple("List").field(paths).finish(),
            PathsSource::Sync(_) => f.write_str("Sync(..)"),
            PathsSource::Async(_) => f.write_str("Async(..)"),
        }
    }
}

/// A loaded generator module
#[derive(Debug)]
pub struct RouteModule {
    pub paths: PathsSource,
    /// Files whose edits invalidate the generated routes
    pub dependencies: Vec<PathBuf>,
}

/// Loads generator modules for dynamic route templates
#[async_trait]
pub trait PathsLoader: Send + Sync {
    /// Generator file extensions after `.paths.`, in lookup order
    fn extensions(&self) -> &[&str];

    async fn load(&self, path: &Path) -> Result<RouteModule, LoadError>;

    /// Generator file co-located with `template`, if any
    fn locate(&self, template: &Path) -> Option<PathBuf> {
        let base = template.to_string_lossy();
        let base = base.strip_suffix(".md").unwrap_or(&base);
        self.extensions()
            .iter()
            .map(|ext| PathBuf::from(format!("{base}.paths.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

#[derive(Debug, Deserialize)]
struct PathsFile {
    paths: PathsSpec,
    #[serde(default)]
    dependencies: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathsSpec {
    List(Vec<UserRouteConfig>),
    Command { command: Vec<String> },
}

/// Reads `*.paths.yml`, `*.paths.yaml` and `*.paths.json` files
///
/// `paths` is either a literal list of `{params, content}` records or
/// `{command: [program, args...]}`. A command runs in the generator file's
/// directory and must print a JSON list of records on stdout. Relative
/// `dependencies` resolve against the same directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePathsLoader;

#[async_trait]
impl PathsLoader for FilePathsLoader {
    fn extensions(&self) -> &[&str] {
        &["yml", "yaml", "json"]
    }

    async fn load(&self, path: &Path) -> Result<RouteModule, LoadError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let file: PathsFile = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
        let dependencies = file
            .dependencies
            .into_iter()
            .map(|dep| if dep.is_absolute() { dep } else { dir.join(dep) })
            .collect();

        let paths = match file.paths {
            PathsSpec::List(paths) => PathsSource::List(paths),
            PathsSpec::Command { command } => {
                if command.is_empty() {
                    return Err(LoadError::Invalid {
                        path: path.to_path_buf(),
                        message: "`paths.command` is empty".into(),
                    });
                }
                PathsSource::Async(Box::new(move || {
                    let command = command.clone();
                    let dir = dir.clone();
                    async move { run_paths_command(&command, &dir).await }.boxed()
                }))
            }
        };

        Ok(RouteModule {
            paths,
            dependencies,
        })
    }
}

async fn run_paths_command(
    argv: &[String],
    dir: &Path,
) -> Result<Vec<UserRouteConfig>, LoadError> {
    let command_line = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Err(LoadError::Command {
            command: command_line,
            message: "empty command".into(),
        });
    };

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|err| LoadError::Command {
            command: command_line.clone(),
            message: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(LoadError::Command {
            command: command_line,
            message: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|err| LoadError::Command {
        command: command_line,
        message: format!("stdout is not a JSON route list: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_loads_yaml_list() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("[pkg].paths.yml");
        fs::write(
            &file,
            "paths:\n  - params: { pkg: core }\n  - params: { pkg: cli }\n    content: '# CLI'\ndependencies:\n  - data.json\n",
        )
        .unwrap();

        let module = FilePathsLoader.load(&file).await.unwrap();
        let paths = module.paths.resolve().await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].params["pkg"], "core");
        assert_eq!(paths[1].content.as_deref(), Some("# CLI"));
        assert_eq!(module.dependencies, vec![dir.path().join("data.json")]);
    }

    #[tokio::test]
    async fn test_loads_json_list() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("[id].paths.json");
        fs::write(&file, r#"{"paths": [{"params": {"id": 1}}]}"#).unwrap();

        let module = FilePathsLoader.load(&file).await.unwrap();
        let paths = module.paths.resolve().await.unwrap();
        assert_eq!(paths[0].params["id"], 1);
        assert!(module.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("[id].paths.yml");
        fs::write(&file, "paths: 3\n").unwrap();
        assert!(FilePathsLoader.load(&file).await.is_err());

        let missing = dir.path().join("missing.paths.yml");
        assert!(matches!(
            FilePathsLoader.load(&missing).await,
            Err(LoadError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_paths_run_in_file_directory() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("routes.json"),
            r#"[{"params": {"pkg": "a"}}, {"params": {"pkg": "b"}}]"#,
        )
        .unwrap();
        let file = dir.path().join("[pkg].paths.yml");
        fs::write(&file, "paths:\n  command: [cat, routes.json]\n").unwrap();

        let module = FilePathsLoader.load(&file).await.unwrap();
        let paths = module.paths.resolve().await.unwrap();
        let pkgs: Vec<_> = paths.iter().map(|p| p.params["pkg"].clone()).collect();
        assert_eq!(pkgs, vec!["a", "b"]);
    }

    #[test]
    fn test_locate_prefers_extension_order() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("[pkg].md");
        assert!(FilePathsLoader.locate(&template).is_none());

        fs::write(dir.path().join("[pkg].paths.json"), "{}").unwrap();
        fs::write(dir.path().join("[pkg].paths.yml"), "").unwrap();
        assert_eq!(
            FilePathsLoader.locate(&template),
            Some(dir.path().join("[pkg].paths.yml"))
        );
    }
}
