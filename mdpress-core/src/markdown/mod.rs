//! Markdown rendering with page-level passes.
//!
//! The renderer runs pulldown-cmark and then a fixed sequence of event
//! transformers: hoisting of top-level `<script>`/`<style>` blocks, header
//! collection and anchors, link rewriting, and fenced-code decoration with
//! line highlighting.

pub mod headers;
pub mod highlight;
pub mod hoist;
pub mod links;

use mdpress_types::Header;
use pulldown_cmark::{html, Event, Options, Parser};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use headers::HeaderTransformer;
pub use highlight::{parse_line_ranges, CodeBlockTransformer, LineRange};
pub use hoist::HoistTransformer;
pub use links::LinkTransformer;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to highlight `{lang}` code block: {message}")]
    Highlight { lang: String, message: String },

    #[error("Markdown engine failed: {0}")]
    Engine(String),
}

/// Markdown options from the `markdown` section of the site config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownOptions {
    /// Heading levels collected into `PageData.headers`
    #[serde(default = "default_header_levels")]
    pub header_levels: Vec<u8>,

    /// Syntax highlighting for fenced code
    #[serde(default = "default_true")]
    pub highlight: bool,

    /// Line-number gutter next to fenced code
    #[serde(default)]
    pub line_numbers: bool,

    #[serde(default = "default_anchor_symbol")]
    pub anchor_symbol: String,
}

fn default_header_levels() -> Vec<u8> {
    vec![2, 3]
}

fn default_true() -> bool {
    true
}

fn default_anchor_symbol() -> String {
    String::from("#")
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            header_levels: default_header_levels(),
            highlight: true,
            line_numbers: false,
            anchor_symbol: default_anchor_symbol(),
        }
    }
}

/// Output of one render pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    pub html: String,
    pub headers: Vec<Header>,
    /// Blocks lifted out of the content tree, in source order
    pub hoisted: Vec<String>,
    /// Internal link targets as written by the author
    pub links: Vec<String>,
}

/// A markdown-to-markup engine the compiler can drive
pub trait Render {
    fn render(&self, markdown: &str) -> Result<RenderOutput, RenderError>;
}

/// Markdown renderer with the mdpress passes installed
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: MarkdownOptions,
}

impl MarkdownRenderer {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }

    fn parser_options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options
    }
}

impl Render for MarkdownRenderer {
    fn render(&self, markdown: &str) -> Result<RenderOutput, RenderError> {
        let events: Vec<Event> = Parser::new_ext(markdown, Self::parser_options()).collect();

        let (events, hoisted) = HoistTransformer::new().transform(events);

        let header_transformer =
            HeaderTransformer::new(&self.options.header_levels, &self.options.anchor_symbol);
        let (events, headers) = header_transformer.transform(events);

        let (events, links) = LinkTransformer::new().transform(events);

        let code_transformer =
            CodeBlockTransformer::new(self.options.highlight, self.options.line_numbers);
        let events = code_transformer.transform(events)?;

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.into_iter());

        Ok(RenderOutput {
            html: html_output,
            headers,
            hoisted,
            links,
        })
    }
}

pub(crate) fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
