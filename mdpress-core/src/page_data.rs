//! Page metadata extraction.

use crate::header::normalize_header;
use mdpress_types::{Frontmatter, Header, PageData, RouteParams};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

static FIRST_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*#+\s+(.*)").unwrap());

/// Inputs for building one page's metadata
pub struct PageSource<'a> {
    pub frontmatter: Frontmatter,
    /// Markdown body without front-matter
    pub body: &'a str,
    pub headers: Vec<Header>,
    pub relative_path: String,
    pub last_updated: u64,
    pub params: Option<RouteParams>,
}

/// Build the page metadata for a rendered document
pub fn extract_page_data(source: PageSource<'_>) -> PageData {
    PageData {
        title: infer_title(&source.frontmatter, source.body),
        description: infer_description(&source.frontmatter),
        headers: source.headers,
        relative_path: source.relative_path,
        last_updated: source.last_updated,
        params: source.params,
        frontmatter: source.frontmatter,
    }
}

/// Page title: `Home` for home pages, then the front-matter title, then the
/// first heading of the body
pub fn infer_title(frontmatter: &Frontmatter, body: &str) -> String {
    if frontmatter.get("home").is_some_and(is_truthy) {
        return String::from("Home");
    }

    if let Some(title) = frontmatter.get("title").filter(|v| is_truthy(v)) {
        return match title {
            Value::String(title) => normalize_header(title),
            other => normalize_header(&other.to_string()),
        };
    }

    FIRST_HEADING
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|heading| normalize_header(heading.as_str().trim()))
        .unwrap_or_default()
}

/// Description from the first `meta name="description"` head tag
pub fn infer_description(frontmatter: &Frontmatter) -> String {
    frontmatter
        .get("head")
        .and_then(|head| head_meta_content(head, "description"))
        .unwrap_or_default()
}

fn head_meta_content(head: &Value, name: &str) -> Option<String> {
    head.as_array()?.iter().find_map(|entry| {
        let entry = entry.as_array()?;
        if entry.first()?.as_str()? != "meta" {
            return None;
        }
        let attrs = entry.get(1)?.as_object()?;
        if attrs.get("name")?.as_str()? != name {
            return None;
        }
        attrs
            .get("content")
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
    })
}

/// Values that count as set in front-matter
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Path of `file` relative to `root`, with forward slashes
pub fn relative_path(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `.` and `..` components without touching the file system
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                None | Some(Component::ParentDir) => normalized.push(".."),
                Some(_) => {
                    normalized.pop();
                }
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
