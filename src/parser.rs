//! Strict RSS/Atom reader.
//!
//! Every `item` (RSS 0.9x/1.0/2.0) and `entry` (Atom) becomes one [`Article`]
//! in document order. Fields are matched on local names so namespaced
//! elements such as `dc:date` or `content:encoded` are picked up. A document
//! that is not well-formed yields a [`ParseError`], never a partial list.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;
use crate::model::Article;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Channel or feed level `<title>`, if present and non-empty.
    pub title: Option<String>,
    pub articles: Vec<Article>,
}

/// Parses a feed payload into its articles.
pub fn parse(payload: &str) -> Result<Vec<Article>, ParseError> {
    parse_document(payload).map(|feed| feed.articles)
}

/// Parses a feed payload into its title and articles.
pub fn parse_document(payload: &str) -> Result<ParsedFeed, ParseError> {
    if payload.trim().is_empty() {
        return Err(ParseError::EmptyPayload);
    }

    let mut reader = Reader::from_str(payload);
    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut root_closed = false;
    // Non-whitespace text seen before the root element opened
    let mut stray_text = false;
    let mut feed_title: Option<String> = None;
    // Open item/entry and the depth it was opened at
    let mut entry: Option<(usize, EntryFields)> = None;
    let mut capture: Option<Capture> = None;
    let mut articles = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| malformed(&reader, e))?;
        match event {
            Event::Start(start) => {
                if stack.is_empty() {
                    check_new_root(&reader, root_closed, stray_text)?;
                }
                seen_root = true;
                let name = local_name(&start);
                stack.push(name.clone());
                let depth = stack.len();

                if capture.is_some() {
                    // Markup nested inside a captured field contributes text only
                    continue;
                }

                match entry.as_mut() {
                    None if is_entry(&name) => {
                        entry = Some((depth, EntryFields::default()));
                    }
                    None => {
                        let parent = depth.checked_sub(2).and_then(|i| stack.get(i));
                        let under_channel =
                            matches!(parent.map(String::as_str), Some("channel" | "feed"));
                        if name == "title" && under_channel && feed_title.is_none() {
                            capture = Some(Capture::new(Target::FeedTitle, depth));
                        }
                    }
                    Some((entry_depth, fields)) if depth == *entry_depth + 1 => {
                        if let Some(field) = Field::from_local_name(&name) {
                            if field == Field::Link {
                                fields.offer_href(&reader, &start)?;
                            }
                            capture = Some(Capture::new(Target::Entry(field), depth));
                        }
                    }
                    Some(_) => {}
                }
            }
            Event::Empty(start) => {
                if stack.is_empty() {
                    check_new_root(&reader, root_closed, stray_text)?;
                    root_closed = true;
                }
                seen_root = true;
                if capture.is_some() {
                    continue;
                }
                let name = local_name(&start);
                match entry.as_mut() {
                    // <item/> is still one article, with every field empty
                    None if is_entry(&name) => articles.push(Article::default()),
                    None => {}
                    Some((entry_depth, fields)) => {
                        if stack.len() == *entry_depth && name == "link" {
                            fields.offer_href(&reader, &start)?;
                        }
                    }
                }
            }
            Event::Text(text) => {
                if stack.is_empty() && !is_blank(&text) {
                    if seen_root {
                        return Err(malformed(&reader, "text after the root element"));
                    }
                    stray_text = true;
                }
                if let Some(capture) = capture.as_mut() {
                    let text = text.unescape().map_err(|e| malformed(&reader, e))?;
                    capture.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if stack.is_empty() {
                    return Err(malformed(&reader, "CDATA outside the root element"));
                }
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let depth = stack.len();

                if capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let Some(done) = capture.take() {
                        let text = done.text.trim().to_string();
                        match done.target {
                            Target::FeedTitle => {
                                if !text.is_empty() {
                                    feed_title = Some(text);
                                }
                            }
                            Target::Entry(field) => {
                                if let Some((_, fields)) = entry.as_mut() {
                                    fields.set(field, text);
                                }
                            }
                        }
                    }
                }

                if entry.as_ref().is_some_and(|(d, _)| *d == depth) {
                    if let Some((_, fields)) = entry.take() {
                        articles.push(fields.into_article());
                    }
                }

                stack.pop();
                if stack.is_empty() {
                    root_closed = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(element) = stack.pop() {
        return Err(ParseError::UnexpectedEof { element });
    }
    if !seen_root {
        return Err(ParseError::NoRootElement);
    }

    Ok(ParsedFeed {
        title: feed_title,
        articles,
    })
}

fn malformed(reader: &Reader<&[u8]>, err: impl fmt::Display) -> ParseError {
    ParseError::Malformed {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

/// A document has exactly one root element and no text around it.
fn check_new_root(
    reader: &Reader<&[u8]>,
    root_closed: bool,
    stray_text: bool,
) -> Result<(), ParseError> {
    if root_closed {
        return Err(malformed(reader, "second root element"));
    }
    if stray_text {
        return Err(malformed(reader, "text before the root element"));
    }
    Ok(())
}

fn is_blank(text: &[u8]) -> bool {
    String::from_utf8_lossy(text)
        .chars()
        .all(|c| c.is_whitespace() || c == '\u{feff}')
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn is_entry(name: &str) -> bool {
    name == "item" || name == "entry"
}

fn attribute(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    key: &str,
) -> Result<Option<String>, ParseError> {
    match start.try_get_attribute(key) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|value| Some(value.into_owned()))
            .map_err(|e| malformed(reader, e)),
        Ok(None) => Ok(None),
        Err(e) => Err(malformed(reader, e)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Content,
    Published,
    Updated,
}

impl Field {
    fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "link" => Some(Self::Link),
            "description" | "summary" => Some(Self::Description),
            "content" | "encoded" => Some(Self::Content),
            "pubDate" | "published" | "date" | "issued" => Some(Self::Published),
            "updated" | "modified" => Some(Self::Updated),
            _ => None,
        }
    }
}

enum Target {
    FeedTitle,
    Entry(Field),
}

struct Capture {
    target: Target,
    depth: usize,
    text: String,
}

impl Capture {
    fn new(target: Target, depth: usize) -> Self {
        Self {
            target,
            depth,
            text: String::new(),
        }
    }
}

/// First non-empty value of each field seen inside one item/entry.
#[derive(Debug, Default)]
struct EntryFields {
    title: Option<String>,
    link: Option<String>,
    fallback_link: Option<String>,
    description: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

impl EntryFields {
    fn set(&mut self, field: Field, text: String) {
        if text.is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        };
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    /// Atom links carry the URL in `href`; `rel="alternate"` (or no rel) wins.
    fn offer_href(
        &mut self,
        reader: &Reader<&[u8]>,
        start: &BytesStart<'_>,
    ) -> Result<(), ParseError> {
        let Some(href) = attribute(reader, start, "href")? else {
            return Ok(());
        };
        let href = href.trim().to_string();
        if href.is_empty() {
            return Ok(());
        }

        let rel = attribute(reader, start, "rel")?;
        match rel.as_deref() {
            None | Some("alternate") => self.set(Field::Link, href),
            Some(_) => {
                if self.fallback_link.is_none() {
                    self.fallback_link = Some(href);
                }
            }
        }
        Ok(())
    }

    fn into_article(self) -> Article {
        Article {
            title: self.title.unwrap_or_default(),
            link: self.link.or(self.fallback_link).unwrap_or_default(),
            description: self.description.or(self.content).unwrap_or_default(),
            published_at: self.published.or(self.updated).unwrap_or_default(),
            source: String::new(),
        }
    }
}
