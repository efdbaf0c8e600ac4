//! Lift top-level `<script>` and `<style>` blocks out of the content.
//!
//! A view module keeps its script and style blocks beside the template, not
//! inside it, so these blocks are removed from the event stream and returned
//! separately in source order.

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Tag, TagEnd};
use regex::Regex;

static HOISTABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*<(script|style)(\s|>|$)").unwrap());

/// Transformer that collects hoistable html blocks
pub struct HoistTransformer;

impl HoistTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Returns the remaining events and the hoisted blocks
    pub fn transform<'a>(&self, events: Vec<Event<'a>>) -> (Vec<Event<'a>>, Vec<String>) {
        let mut result = Vec::with_capacity(events.len());
        let mut hoisted = Vec::new();
        let mut depth = 0usize;
        // (index in `result` where the block started, accumulated source)
        let mut block: Option<(usize, String)> = None;

        for event in events {
            match &event {
                Event::Start(Tag::HtmlBlock) if depth == 0 => {
                    block = Some((result.len(), String::new()));
                }
                Event::Html(html) => {
                    if let Some((_, source)) = block.as_mut() {
                        source.push_str(html);
                    }
                }
                Event::End(TagEnd::HtmlBlock) if depth == 1 => {
                    if let Some((start, source)) = block.take() {
                        if HOISTABLE.is_match(&source) {
                            result.truncate(start);
                            hoisted.push(source.trim_end().to_string());
                            depth -= 1;
                            continue;
                        }
                    }
                }
                _ => {}
            }

            match &event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth = depth.saturating_sub(1),
                _ => {}
            }
            result.push(event);
        }

        (result, hoisted)
    }
}

impl Default for HoistTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{html, Parser};

    fn run(markdown: &str) -> (String, Vec<String>) {
        let events: Vec<Event> = Parser::new(markdown).collect();
        let (events, hoisted) = HoistTransformer::new().transform(events);
        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        (out, hoisted)
    }

    #[test]
    fn test_hoists_script_and_style_in_order() {
        let md = "<script setup>\nimport Foo from './Foo.vue'\n</script>\n\n\
                  # Title\n\n\
                  <style scoped>\n.a { color: red }\n</style>\n";
        let (html, hoisted) = run(md);

        assert_eq!(hoisted.len(), 2);
        assert!(hoisted[0].starts_with("<script setup>"));
        assert!(hoisted[0].ends_with("</script>"));
        assert!(hoisted[1].starts_with("<style scoped>"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(!html.contains("<script"));
        assert!(!html.contains("<style"));
    }

    #[test]
    fn test_script_with_blank_lines_stays_one_block() {
        let md = "<script>\nconst a = 1\n\nexport default {}\n</script>\n";
        let (_, hoisted) = run(md);
        assert_eq!(hoisted.len(), 1);
        assert!(hoisted[0].contains("export default {}"));
    }

    #[test]
    fn test_other_html_blocks_stay_in_content() {
        let (html, hoisted) = run("<div class=\"tip\">\nhello\n</div>\n");
        assert!(hoisted.is_empty());
        assert!(html.contains("<div class=\"tip\">"));
    }

    #[test]
    fn test_nested_script_is_not_hoisted() {
        let (html, hoisted) = run("> <script>\n> var a\n> </script>\n");
        assert!(hoisted.is_empty());
        assert!(html.contains("<script>"));
    }
}
