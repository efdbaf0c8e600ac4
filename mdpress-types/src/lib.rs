//! Shared types for mdpress
//!
//! This crate holds the data contract between the compile pipeline, the
//! navigation layer and the in-browser hot-update listeners: page metadata,
//! site metadata and the hot-update notification payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Author-supplied front-matter, kept as an arbitrary mapping
pub type Frontmatter = Map<String, Value>;

/// Parameter mapping of one resolved dynamic route
pub type RouteParams = Map<String, Value>;

/// Custom event name used for page-data hot updates
pub const PAGE_DATA_EVENT: &str = "mdpress:pageData";

/// A collected heading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub level: u8,
    pub title: String,
    pub slug: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Header>,
}

impl Header {
    pub fn new(level: u8, title: impl Into<String>, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            level,
            title: title.into(),
            link: format!("#{slug}"),
            slug,
            children: Vec::new(),
        }
    }
}

/// Metadata of one compiled page
///
/// Embedded into the generated view module and read back by the client as
/// read-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub frontmatter: Frontmatter,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub relative_path: String,
    #[serde(default)]
    pub last_updated: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RouteParams>,
}

/// A head tag: `[tag, attrs]` or `[tag, attrs, innerHTML]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeadConfig {
    WithContent(String, BTreeMap<String, String>, String),
    Tag(String, BTreeMap<String, String>),
}

impl HeadConfig {
    pub fn tag(&self) -> &str {
        match self {
            HeadConfig::WithContent(tag, _, _) | HeadConfig::Tag(tag, _) => tag,
        }
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        match self {
            HeadConfig::WithContent(_, attrs, _) | HeadConfig::Tag(_, attrs) => attrs,
        }
    }
}

/// Site-wide metadata served to the client as a virtual module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub base: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub head: Vec<HeadConfig>,
    #[serde(default)]
    pub theme_config: Value,
}

impl Default for SiteData {
    fn default() -> Self {
        Self {
            title: String::from("mdpress"),
            description: String::from("An mdpress site"),
            base: String::from("/"),
            lang: String::from("en-US"),
            head: Vec::new(),
            theme_config: Value::Object(Map::new()),
        }
    }
}

/// Payload pushed to browser listeners when a document is edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotUpdatePayload {
    /// Served path of the document, e.g. `/guide/index.md`
    pub path: String,
    pub page_data: PageData,
}

static PAYLOAD_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\bindex)?\.md$").unwrap());
static LOCATION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\bindex)?\.html$").unwrap());

impl HotUpdatePayload {
    /// Whether this update targets the page shown at `location_pathname`
    ///
    /// Paths are compared after dropping a trailing `index` and the
    /// document/page extension, so `/guide/index.md` applies to `/guide/`
    /// and `/guide/index.html` alike.
    pub fn applies_to(&self, location_pathname: &str) -> bool {
        PAYLOAD_SUFFIX.replace(&self.path, "") == LOCATION_SUFFIX.replace(location_pathname, "")
    }
}
