//! Fenced code decoration: syntax highlighting and line highlighting.
//!
//! A fence info string may carry a line-range annotation, e.g.
//! ```` ```js{2,4-6} ````. The code text itself is never modified; instead a
//! gutter block with one marker per source line is emitted next to it.

use super::{html_escape, RenderError};
use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use regex::Regex;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

static FENCE_INFO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^\s{]*)\s*(?:\{([^}]*)\})?").unwrap());

/// An inclusive range of 1-based line numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn contains(&self, line: usize) -> bool {
        (self.start..=self.end).contains(&line)
    }
}

/// Parse a `2,4-6` style annotation
///
/// Returns `None` when the annotation holds no line number at all; entries
/// that fail to parse are skipped. A range with a missing end covers only
/// its start line.
pub fn parse_line_ranges(annotation: &str) -> Option<Vec<LineRange>> {
    let ranges: Vec<LineRange> = annotation
        .split(',')
        .filter_map(|part| {
            let mut bounds = part.trim().splitn(2, '-');
            let start = bounds.next()?.trim().parse::<usize>().ok()?;
            let end = bounds
                .next()
                .and_then(|end| end.trim().parse::<usize>().ok())
                .filter(|end| *end >= start)
                .unwrap_or(start);
            Some(LineRange { start, end })
        })
        .collect();

    if ranges.is_empty() {
        None
    } else {
        Some(ranges)
    }
}

/// Render the highlight gutter for `line_count` lines
pub fn highlight_gutter(line_count: usize, ranges: &[LineRange]) -> String {
    let mut gutter = String::from(r#"<div class="highlight-lines">"#);
    for line in 1..=line_count {
        if ranges.iter().any(|range| range.contains(line)) {
            gutter.push_str(r#"<div class="highlighted">&nbsp;</div>"#);
        } else {
            gutter.push_str("<br>");
        }
    }
    gutter.push_str("</div>");
    gutter
}

fn line_numbers_gutter(line_count: usize) -> String {
    let mut gutter = String::from(r#"<div class="line-numbers-wrapper" aria-hidden="true">"#);
    for line in 1..=line_count {
        gutter.push_str(&format!(r#"<span class="line-number">{line}</span><br>"#));
    }
    gutter.push_str("</div>");
    gutter
}

/// Replaces fenced code blocks with decorated html
pub struct CodeBlockTransformer {
    highlight: bool,
    line_numbers: bool,
}

impl CodeBlockTransformer {
    pub fn new(highlight: bool, line_numbers: bool) -> Self {
        Self {
            highlight,
            line_numbers,
        }
    }

    pub fn transform<'a>(&self, events: Vec<Event<'a>>) -> Result<Vec<Event<'a>>, RenderError> {
        let mut result = Vec::with_capacity(events.len());
        let mut fence: Option<(String, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    fence = Some((info.to_string(), String::new()));
                }
                Event::Text(text) if fence.is_some() => {
                    if let Some((_, code)) = fence.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if fence.is_some() => {
                    if let Some((info, code)) = fence.take() {
                        let html = self.render_block(&info, &code)?;
                        result.push(Event::Html(CowStr::Boxed(html.into_boxed_str())));
                    }
                }
                other => result.push(other),
            }
        }

        Ok(result)
    }

    fn render_block(&self, info: &str, code: &str) -> Result<String, RenderError> {
        let (lang, annotation) = match FENCE_INFO.captures(info) {
            Some(captures) => (
                captures.get(1).map_or("", |m| m.as_str()),
                captures.get(2).map(|m| m.as_str()),
            ),
            None => ("", None),
        };
        let lang = if lang.is_empty() { "text" } else { lang };
        let line_count = code.lines().count();

        let mut html = format!(r#"<div class="language-{}"#, html_escape(lang));
        if self.line_numbers {
            html.push_str(" line-numbers-mode");
        }
        html.push_str(r#"">"#);

        if let Some(ranges) = annotation.and_then(parse_line_ranges) {
            html.push_str(&highlight_gutter(line_count, &ranges));
        }

        html.push_str(&format!(
            r#"<pre v-pre class="language-{}"><code>"#,
            html_escape(lang)
        ));
        html.push_str(&self.highlight_code(code, lang)?);
        html.push_str("</code></pre>");

        if self.line_numbers {
            html.push_str(&line_numbers_gutter(line_count));
        }
        html.push_str("</div>\n");
        Ok(html)
    }

    fn highlight_code(&self, code: &str, lang: &str) -> Result<String, RenderError> {
        let syntax = if self.highlight {
            SYNTAX_SET.find_syntax_by_token(lang)
        } else {
            None
        };
        let Some(syntax) = syntax else {
            return Ok(html_escape(code));
        };

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|err| RenderError::Highlight {
                    lang: lang.to_string(),
                    message: err.to_string(),
                })?;
        }
        Ok(generator.finalize())
    }
}
