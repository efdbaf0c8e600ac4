//! Front-matter splitting for markdown documents.

use mdpress_types::Frontmatter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML front-matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Front-matter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

static FRONTMATTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)").unwrap()
});

/// Split a document into its front-matter mapping and markdown body
///
/// Documents without a leading `---` fence yield an empty mapping and the
/// full text as body. An empty fence pair also yields an empty mapping.
///
/// # Example
///
/// ```
/// use mdpress_core::frontmatter::split_frontmatter;
///
/// let content = "---\ntitle: My Page\nhome: true\n---\n# Hello World\n";
///
/// let (fm, body) = split_frontmatter(content).unwrap();
/// assert_eq!(fm["title"], "My Page");
/// assert_eq!(fm["home"], true);
/// assert_eq!(body, "# Hello World\n");
/// ```
pub fn split_frontmatter(content: &str) -> Result<(Frontmatter, &str), FrontmatterError> {
    let Some(captures) = FRONTMATTER_REGEX.captures(content) else {
        return Ok((Frontmatter::new(), content));
    };

    let body = &content[captures.get(0).map_or(0, |m| m.end())..];
    let yaml = captures.get(1).map_or("", |m| m.as_str());
    if yaml.trim().is_empty() {
        return Ok((Frontmatter::new(), body));
    }

    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Object(map) => Ok((map, body)),
        Value::Null => Ok((Frontmatter::new(), body)),
        Value::Array(_) => Err(FrontmatterError::NotAMapping("a sequence")),
        Value::String(_) => Err(FrontmatterError::NotAMapping("a string")),
        Value::Number(_) => Err(FrontmatterError::NotAMapping("a number")),
        Value::Bool(_) => Err(FrontmatterError::NotAMapping("a boolean")),
    }
}
