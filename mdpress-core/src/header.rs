//! Heading text normalization.
//!
//! Titles and collected headers are shown as plain text by the navigation
//! layer, so inline formatting is reduced to its text content and raw
//! component tags are removed. Tags written inside inline code survive as
//! literal text.

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser};
use regex::Regex;
use std::borrow::Cow;

/// Line starts that would turn the heading text into a block construct
static BLOCK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<ordered>\d{1,9})[.)](?:[ \t]|$)|#{1,6}(?:[ \t]|$)|(?:[-*_][ \t]*){3,}$|[-+*](?:[ \t]|$)|>)")
        .unwrap()
});

/// Leading text that keeps a `<` at line start from opening an HTML block
const INLINE_GUARD: char = '\u{200B}';

/// Normalize heading text to plain text
///
/// # Examples
///
/// ```
/// use mdpress_core::normalize_header;
///
/// assert_eq!(normalize_header("Hello <Comp/>"), "Hello");
/// assert_eq!(normalize_header("*Hello* `<Comp/>`"), "Hello <Comp/>");
/// assert_eq!(normalize_header("`A` <Comp/> `B`"), "A  B");
/// ```
pub fn normalize_header(text: &str) -> String {
    let source = as_inline_source(text.trim_start());
    let plain = plain_text(Parser::new_ext(&source, Options::ENABLE_STRIKETHROUGH));
    plain
        .strip_prefix(INLINE_GUARD)
        .unwrap_or(&plain)
        .trim()
        .to_string()
}

/// Concatenate the text and inline-code content of parsed inline events
pub(crate) fn plain_text<'a>(events: impl IntoIterator<Item = Event<'a>>) -> String {
    let mut plain = String::new();
    for event in events {
        match event {
            Event::Text(text) | Event::Code(text) => plain.push_str(&text),
            Event::SoftBreak | Event::HardBreak => plain.push(' '),
            // raw markup is dropped, the whitespace around it stays
            Event::InlineHtml(_) | Event::Html(_) => {}
            _ => {}
        }
    }
    plain
}

/// Escape a leading block marker so the text parses as one paragraph
fn as_inline_source(text: &str) -> Cow<'_, str> {
    if text.starts_with('<') {
        return Cow::Owned(format!("{INLINE_GUARD}{text}"));
    }
    let Some(captures) = BLOCK_MARKER.captures(text) else {
        return Cow::Borrowed(text);
    };

    let at = captures.name("ordered").map_or(0, |digits| digits.end());
    let mut escaped = String::with_capacity(text.len() + 1);
    escaped.push_str(&text[..at]);
    escaped.push('\\');
    escaped.push_str(&text[at..]);
    Cow::Owned(escaped)
}
