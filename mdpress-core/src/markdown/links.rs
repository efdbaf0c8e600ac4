//! Link rewriting and internal link collection.

use super::html_escape;
use once_cell::sync::Lazy;
use pulldown_cmark::{CowStr, Event, Tag};
use regex::Regex;

/// Targets with a scheme (`https:`, `mailto:`, ...) leave the site
pub static EXTERNAL_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[a-zA-Z][a-zA-Z\d+.\-]*:|//)").unwrap());

static MD_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.md((?:[?#].*)?)$").unwrap());

/// Rewrites `.md` targets to `.html` and opens external links in a new tab
pub struct LinkTransformer;

impl LinkTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Returns the rewritten events and the internal targets as written
    pub fn transform<'a>(&self, events: Vec<Event<'a>>) -> (Vec<Event<'a>>, Vec<String>) {
        let mut links = Vec::new();
        let result = events
            .into_iter()
            .map(|event| match event {
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => {
                    if EXTERNAL_URL.is_match(&dest_url) {
                        return Event::InlineHtml(CowStr::Boxed(
                            external_anchor(&dest_url, &title).into_boxed_str(),
                        ));
                    }
                    if dest_url.starts_with('#') || dest_url.is_empty() {
                        return Event::Start(Tag::Link {
                            link_type,
                            dest_url,
                            title,
                            id,
                        });
                    }

                    links.push(dest_url.to_string());
                    let rewritten = MD_SUFFIX.replace(&dest_url, ".html$1").into_owned();
                    Event::Start(Tag::Link {
                        link_type,
                        dest_url: CowStr::Boxed(rewritten.into_boxed_str()),
                        title,
                        id,
                    })
                }
                other => other,
            })
            .collect();

        (result, links)
    }
}

impl Default for LinkTransformer {
    fn default() -> Self {
        Self::new()
    }
}

fn external_anchor(href: &str, title: &str) -> String {
    let mut anchor = format!(r#"<a href="{}""#, html_escape(href));
    if !title.is_empty() {
        anchor.push_str(&format!(r#" title="{}""#, html_escape(title)));
    }
    anchor.push_str(r#" target="_blank" rel="noopener noreferrer">"#);
    anchor
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{html, Parser};

    fn run(markdown: &str) -> (String, Vec<String>) {
        let events: Vec<Event> = Parser::new(markdown).collect();
        let (events, links) = LinkTransformer::new().transform(events);
        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        (out, links)
    }

    #[test]
    fn test_internal_md_links_are_rewritten_and_collected() {
        let (html, links) = run("[a](./guide.md) [b](../api/index.md#usage) [c](/about)");
        assert!(html.contains(r#"href="./guide.html""#));
        assert!(html.contains(r#"href="../api/index.html#usage""#));
        assert!(html.contains(r#"href="/about""#));
        assert_eq!(links, vec!["./guide.md", "../api/index.md#usage", "/about"]);
    }

    #[test]
    fn test_external_links_open_in_new_tab() {
        let (html, links) = run("[docs](https://example.com \"Docs\") and [mail](mailto:a@b.c)");
        assert!(html.contains(
            r#"<a href="https://example.com" title="Docs" target="_blank" rel="noopener noreferrer">docs</a>"#
        ));
        assert!(html.contains(r#"href="mailto:a@b.c""#));
        assert!(links.is_empty());
    }

    #[test]
    fn test_fragment_links_are_left_alone() {
        let (html, links) = run("[top](#top)");
        assert!(html.contains(r##"href="#top""##));
        assert!(links.is_empty());
    }
}
