//! Anchor slug generation for headings.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Convert heading text to an anchor slug
///
/// Rules:
/// - Lowercase
/// - Whitespace and ASCII punctuation become hyphens
/// - Control characters are dropped
/// - Collapse multiple hyphens, trim leading/trailing hyphens
/// - A leading digit is prefixed with `_` so the slug is a valid id
///
/// # Examples
///
/// ```
/// use mdpress_core::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("Rust & Safety"), "rust-safety");
/// assert_eq!(slugify("2. Install"), "_2-install");
/// ```
pub fn slugify(input: &str) -> String {
    let replaced = input
        .graphemes(true)
        .filter_map(|g| {
            let c = g.chars().next()?;
            if c.is_control() {
                None
            } else if c.is_whitespace() || c.is_ascii_punctuation() || is_typographic_quote(c) {
                Some("-")
            } else {
                Some(g)
            }
        })
        .collect::<String>();

    let collapsed = HYPHEN_RUNS.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches('-').to_lowercase();

    match trimmed.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{trimmed}"),
        _ => trimmed,
    }
}

fn is_typographic_quote(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
}

/// Hands out unique slugs within one document
///
/// Repeated headings get `-1`, `-2`, ... suffixes in order of appearance.
#[derive(Debug, Default)]
pub struct SlugRegistry {
    used: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut candidate = base.clone();
        let mut suffix = 0;
        while self.used.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}-{suffix}");
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Getting Started"), "getting-started");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(slugify("Rust & Safety"), "rust-safety");
        assert_eq!(slugify("C++ Programming"), "c-programming");
        assert_eq!(slugify("Node.js Tips"), "node-js-tips");
        assert_eq!(slugify("What's new?"), "what-s-new");
        assert_eq!(slugify("“Quoted” title"), "quoted-title");
    }

    #[test]
    fn test_unicode() {
        assert_eq!(slugify("Café"), "café");
        assert_eq!(slugify("中文 标题"), "中文-标题");
    }

    #[test]
    fn test_leading_digit() {
        assert_eq!(slugify("1 Intro"), "_1-intro");
    }

    #[test]
    fn test_empty_and_special_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("   "), "");
    }

    #[test]
    fn test_registry_deduplicates() {
        let mut registry = SlugRegistry::new();
        assert_eq!(registry.unique("Usage"), "usage");
        assert_eq!(registry.unique("Usage"), "usage-1");
        assert_eq!(registry.unique("Usage"), "usage-2");
        assert_eq!(registry.unique("Other"), "other");
    }

    #[test]
    fn test_registry_skips_taken_suffixes() {
        let mut registry = SlugRegistry::new();
        assert_eq!(registry.unique("Step 1"), "step-1");
        assert_eq!(registry.unique("Step"), "step");
        assert_eq!(registry.unique("Step"), "step-2");
    }
}
