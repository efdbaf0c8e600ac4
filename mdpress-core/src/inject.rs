//! Page-data injection into the generated view source.
//!
//! The hoisted blocks come straight from the renderer, so their shape is
//! known: script blocks are located and patched with patterns instead of
//! being parsed.

use mdpress_types::PageData;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

/// Export name the navigation layer reads page data from
pub const PAGE_DATA_EXPORT: &str = "__pageData";

static SCRIPT_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</script>").unwrap());
static SCRIPT_SETUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*script[^>]*\bsetup\b[^>]*").unwrap());
static DEFAULT_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"((?:^|\n|;)\s*)export(\s*)default").unwrap());
static NAMED_DEFAULT_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"((?:^|\n|;)\s*)export(.+)as(\s*)default").unwrap());

/// Serialize page data as a JSON string literal holding the JSON document
pub fn encode_page_data(data: &PageData) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serde_json::to_string(data)?)
}

/// Add the page-data export to the hoisted blocks
///
/// The export goes into the first non-setup `<script>` block, followed by an
/// empty default export when that block has none of its own. Without such a
/// block a new one is prepended.
pub fn inject_page_data(
    mut blocks: Vec<String>,
    data: &PageData,
) -> Result<Vec<String>, serde_json::Error> {
    let code = format!(
        "\nexport const {PAGE_DATA_EXPORT} = {}",
        encode_page_data(data)?
    );

    let existing = blocks
        .iter()
        .position(|block| SCRIPT_CLOSE.is_match(block) && !SCRIPT_SETUP.is_match(block));

    match existing {
        Some(index) => {
            let block = &blocks[index];
            let has_default_export =
                DEFAULT_EXPORT.is_match(block) || NAMED_DEFAULT_EXPORT.is_match(block);
            let replacement = if has_default_export {
                format!("{code}</script>")
            } else {
                format!("{code}\nexport default {{}}\n</script>")
            };
            let patched = SCRIPT_CLOSE
                .replacen(block, 1, NoExpand(&replacement))
                .into_owned();
            blocks[index] = patched;
        }
        None => blocks.insert(0, format!("<script>{code}\nexport default {{}}</script>")),
    }

    Ok(blocks)
}
