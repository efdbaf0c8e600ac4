//! Header collection, heading ids and permalink anchors.

use super::html_escape;
use crate::header::plain_text;
use crate::slug::SlugRegistry;
use mdpress_types::Header;
use pulldown_cmark::{CowStr, Event, HeadingLevel, Tag, TagEnd};

/// Heading class that keeps a heading out of the collected headers
pub const IGNORE_HEADER_CLASS: &str = "ignore-header";

/// Assigns ids to headings and collects the configured levels
pub struct HeaderTransformer<'o> {
    levels: &'o [u8],
    anchor_symbol: &'o str,
}

struct OpenHeading<'a> {
    level: HeadingLevel,
    id: Option<CowStr<'a>>,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    inner: Vec<Event<'a>>,
}

impl<'o> HeaderTransformer<'o> {
    pub fn new(levels: &'o [u8], anchor_symbol: &'o str) -> Self {
        Self {
            levels,
            anchor_symbol,
        }
    }

    /// Returns the events with heading ids attached, and the nested headers
    pub fn transform<'a>(&self, events: Vec<Event<'a>>) -> (Vec<Event<'a>>, Vec<Header>) {
        let mut result = Vec::with_capacity(events.len());
        let mut collected = Vec::new();
        let mut slugs = SlugRegistry::new();
        let mut open: Option<OpenHeading<'a>> = None;

        for event in events {
            match event {
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }) => {
                    open = Some(OpenHeading {
                        level,
                        id,
                        classes,
                        attrs,
                        inner: Vec::new(),
                    });
                }
                Event::End(TagEnd::Heading(level)) => {
                    let Some(heading) = open.take() else {
                        result.push(Event::End(TagEnd::Heading(level)));
                        continue;
                    };
                    self.close_heading(heading, &mut slugs, &mut result, &mut collected);
                }
                other => match open.as_mut() {
                    Some(heading) => heading.inner.push(other),
                    None => result.push(other),
                },
            }
        }

        (result, nest(collected))
    }

    fn close_heading<'a>(
        &self,
        heading: OpenHeading<'a>,
        slugs: &mut SlugRegistry,
        result: &mut Vec<Event<'a>>,
        collected: &mut Vec<Header>,
    ) {
        let title = plain_text(heading.inner.iter().cloned()).trim().to_string();
        let slug = match &heading.id {
            Some(explicit) => slugs.unique(explicit),
            None => slugs.unique(&title),
        };

        let level = heading.level as u8;
        let ignored = heading
            .classes
            .iter()
            .any(|class| class.as_ref() == IGNORE_HEADER_CLASS);
        if !ignored && self.levels.contains(&level) {
            collected.push(Header::new(level, title.clone(), slug.clone()));
        }

        let anchor = format!(
            r##"<a class="header-anchor" href="#{slug}" aria-label="Permalink to &quot;{label}&quot;">{symbol}</a>"##,
            slug = html_escape(&slug),
            label = html_escape(&title),
            symbol = self.anchor_symbol,
        );

        result.push(Event::Start(Tag::Heading {
            level: heading.level,
            id: Some(CowStr::Boxed(slug.into_boxed_str())),
            classes: heading.classes,
            attrs: heading.attrs,
        }));
        result.extend(heading.inner);
        result.push(Event::InlineHtml(CowStr::Boxed(anchor.into_boxed_str())));
        result.push(Event::End(TagEnd::Heading(heading.level)));
    }
}

/// Nest a flat header list: deeper levels become children of the closest
/// preceding shallower header
fn nest(flat: Vec<Header>) -> Vec<Header> {
    let mut roots = Vec::new();
    for header in flat {
        insert(&mut roots, header);
    }
    roots
}

fn insert(siblings: &mut Vec<Header>, header: Header) {
    match siblings.last_mut() {
        Some(last) if last.level < header.level => insert(&mut last.children, header),
        _ => siblings.push(header),
    }
}
