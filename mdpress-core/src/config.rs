//! Configuration parsing and management.

use crate::markdown::MarkdownOptions;
use mdpress_types::{HeadConfig, SiteData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the project root
pub const DEFAULT_CONFIG_FILE: &str = "mdpress.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Main configuration struct matching the mdpress.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Static assets; defaults to `<src_dir>/public`
    #[serde(default)]
    pub public_dir: Option<PathBuf>,

    #[serde(default)]
    pub markdown: MarkdownOptions,

    /// Regexes matched against page paths relative to `src_dir`
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_src_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".mdpress/dist")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default = "default_base")]
    pub base: String,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default)]
    pub head: Vec<HeadConfig>,

    #[serde(default = "default_theme_config")]
    pub theme_config: Value,
}

fn default_title() -> String {
    String::from("mdpress")
}

fn default_description() -> String {
    String::from("An mdpress site")
}

fn default_base() -> String {
    String::from("/")
}

fn default_lang() -> String {
    String::from("en-US")
}

fn default_theme_config() -> Value {
    Value::Object(Default::default())
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: default_description(),
            base: default_base(),
            lang: default_lang(),
            head: Vec::new(),
            theme_config: default_theme_config(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            src_dir: default_src_dir(),
            out_dir: default_out_dir(),
            public_dir: None,
            markdown: MarkdownOptions::default(),
            ignore_patterns: Vec::new(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)?
        };

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Load `path` if it exists, otherwise use defaults rooted next to it
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.is_file() {
            return Self::from_file(path);
        }

        tracing::debug!("no config file found at {}, using defaults", path.display());
        Ok(Config {
            config_path: Some(path.to_path_buf()),
            ..Config::default()
        })
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Get the source directory, resolved relative to config file
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.src_dir)
    }

    /// Get the output directory, resolved relative to config file
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.out_dir)
    }

    /// Directory for generated view modules
    pub fn temp_dir(&self) -> PathBuf {
        self.out_dir().join(".temp")
    }

    pub fn public_dir(&self) -> PathBuf {
        match &self.public_dir {
            Some(dir) => self.resolve_path(dir),
            None => self.src_dir().join("public"),
        }
    }

    /// Site data exposed to the client
    pub fn site_data(&self) -> SiteData {
        SiteData {
            title: self.site.title.clone(),
            description: self.site.description.clone(),
            base: normalize_base_url(&self.site.base),
            lang: self.site.lang.clone(),
            head: self.site.head.clone(),
            theme_config: self.site.theme_config.clone(),
        }
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(parent) => crate::page_data::normalize_path(&parent.join(path)),
            None => path.to_path_buf(),
        }
    }
}

/// Ensure base URLs have a leading and trailing slash
pub fn normalize_base_url(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    if !s.ends_with('/') {
        s.push('/');
    }

    // Collapse duplicate slashes
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    s
}
