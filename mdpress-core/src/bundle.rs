//! Production bundle post-processing.
//!
//! Page chunks produced by the bundler are patched as text. Static content
//! strings are located with patterns that rely on the view compiler's
//! output shape (`const _hoisted_N = /*#__PURE__*/createStaticVNode("...", N)`),
//! so this must run before minification.

use mdpress_types::SiteData;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::page_data::relative_path;

pub const STATIC_START: &str = "__VP_STATIC_START__";
pub const STATIC_END: &str = "__VP_STATIC_END__";

static HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\w+)\.js$").unwrap());
static STATIC_INJECT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(const _hoisted_\d+ = /\*#__PURE__\*/createStaticVNode)\("(.*)", (\d+)\)"#)
        .unwrap()
});
static STATIC_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__VP_STATIC_START__.*?__VP_STATIC_END__").unwrap());
static STATIC_RESTORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__VP_STATIC_(START|END)__").unwrap());

/// An emitted chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub name: String,
    pub file_name: String,
    pub code: String,
    pub is_entry: bool,
    pub facade_module_id: Option<PathBuf>,
}

impl Chunk {
    /// Entry chunk built from a markdown page
    pub fn is_page(&self) -> bool {
        self.is_entry
            && self
                .facade_module_id
                .as_ref()
                .is_some_and(|id| id.extension().is_some_and(|ext| ext == "md"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    Chunk(Chunk),
    Asset { file_name: String },
}

/// Bundle output keyed by output name
pub type Bundle = BTreeMap<String, OutputItem>;

/// Lowercased page chunk name (`foo_bar.md`) to content hash
pub type PageHashMap = BTreeMap<String, String>;

/// Flat chunk name for a page: `foo/bar.md` becomes `foo_bar.md.js`
pub fn page_chunk_name(root: &Path, page: &Path) -> String {
    format!("{}.js", relative_path(root, page).replace('/', "_"))
}

/// Wrap static content strings in start/end markers
pub fn inject_static_markers(code: &str) -> String {
    STATIC_INJECT_MARKER
        .replace_all(code, format!("${{1}}(\"{STATIC_START}${{2}}{STATIC_END}\", ${{3}})"))
        .into_owned()
}

/// Drop marked static strings, leaving an empty literal behind
pub fn strip_static(code: &str) -> String {
    STATIC_STRIP.replace_all(code, "").into_owned()
}

/// Remove the markers but keep the static strings
pub fn restore_static(code: &str) -> String {
    STATIC_RESTORE.replace_all(code, "").into_owned()
}

/// Patch a rendered chunk; returns `None` when the chunk is left alone
pub fn render_chunk(chunk: &Chunk, ssr: bool) -> Option<String> {
    if ssr || !chunk.is_page() {
        return None;
    }
    Some(inject_static_markers(&chunk.code))
}

/// Finalize the bundle
///
/// Server builds drop every asset. Client builds record each page's hash
/// under its chunk name relative to `root`, add a `.lean.js` copy of each
/// page chunk without its static strings and remove the markers from the
/// original.
pub fn generate_bundle(
    bundle: &mut Bundle,
    ssr: bool,
    root: &Path,
    page_hashes: &mut PageHashMap,
) {
    if ssr {
        bundle.retain(|_, item| !matches!(item, OutputItem::Asset { .. }));
        return;
    }

    let mut lean_chunks = Vec::new();
    for (name, item) in bundle.iter_mut() {
        let OutputItem::Chunk(chunk) = item else {
            continue;
        };
        if !chunk.is_page() {
            continue;
        }
        let Some(page) = chunk.facade_module_id.as_deref() else {
            continue;
        };

        match HASH.captures(&chunk.file_name).and_then(|caps| caps.get(1)) {
            Some(hash) => {
                let key = page_chunk_name(root, page);
                let key = key.strip_suffix(".js").unwrap_or(&key).to_lowercase();
                page_hashes.insert(key, hash.as_str().to_string());
            }
            None => debug!("page chunk {} has no content hash", chunk.file_name),
        }

        let lean = Chunk {
            file_name: lean_file_name(&chunk.file_name),
            code: strip_static(&chunk.code),
            ..chunk.clone()
        };
        lean_chunks.push((format!("{name}-lean"), lean));
        chunk.code = restore_static(&chunk.code);
    }

    for (name, lean) in lean_chunks {
        bundle.insert(name, OutputItem::Chunk(lean));
    }
}

fn lean_file_name(file_name: &str) -> String {
    match file_name.strip_suffix(".js") {
        Some(stem) => format!("{stem}.lean.js"),
        None => file_name.to_string(),
    }
}

/// Source of the client module exposing site data
pub fn site_data_module(site: &SiteData) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(site)?;
    Ok(format!("export default {}", serde_json::to_string(&json)?))
}
