//! Feed document parsing
//!
//! RSS, Atom and JSON Feed documents are parsed with `feed_rs` and adapted
//! into [`FeedEntry`] values so the rest of the collector only ever sees
//! typed, optional fields.

use crate::FeedlineError;
use chrono::{DateTime, Utc};

/// One entry of a parsed feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    /// First non-empty link href
    pub link: Option<String>,

    /// Entry id / guid
    pub id: Option<String>,

    pub title: Option<String>,

    /// Summary (RSS `description`, Atom `summary`)
    pub summary: Option<String>,

    /// Media description, used when no summary exists
    pub description: Option<String>,

    /// Inline content bodies (RSS `content:encoded`, Atom `content`)
    pub content_blocks: Vec<String>,

    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,

    /// Name of the first listed author
    pub author: Option<String>,

    /// Language inherited from the feed
    pub language: Option<String>,
}

impl FeedEntry {
    /// Best publication timestamp: published, else updated
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published.or(self.updated)
    }
}

/// A parsed feed document
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub language: Option<String>,
    pub entries: Vec<FeedEntry>,

    /// True when the document only parsed after lenient cleanup
    pub recovered: bool,
}

/// Parses a feed document
///
/// A document that fails to parse is cleaned up (byte order mark and leading
/// whitespace stripped, bare ampersands escaped) and parsed once more before
/// giving up.
///
/// # Arguments
///
/// * `url` - The feed URL, used for logging and errors
/// * `body` - The raw document
///
/// # Returns
///
/// * `Ok(ParsedFeed)` - The parsed feed
/// * `Err(FeedlineError::MalformedFeed)` - Neither attempt succeeded
pub fn parse_feed(url: &str, body: &[u8]) -> Result<ParsedFeed, FeedlineError> {
    match feed_rs::parser::parse(body) {
        Ok(feed) => Ok(adapt_feed(feed, false)),
        Err(first_error) => {
            tracing::warn!(
                "Feed {} is malformed ({}), attempting lenient parse",
                url,
                first_error
            );

            let cleaned = lenient_cleanup(body);
            match feed_rs::parser::parse(cleaned.as_bytes()) {
                Ok(feed) => Ok(adapt_feed(feed, true)),
                Err(e) => Err(FeedlineError::MalformedFeed {
                    url: url.to_string(),
                    message: e.to_string(),
                }),
            }
        }
    }
}

fn adapt_feed(feed: feed_rs::model::Feed, recovered: bool) -> ParsedFeed {
    let language = feed.language.filter(|l| !l.trim().is_empty());
    let entries = feed
        .entries
        .into_iter()
        .map(|entry| adapt_entry(entry, language.as_deref()))
        .collect();

    ParsedFeed {
        title: feed.title.map(|t| t.content),
        language,
        entries,
        recovered,
    }
}

fn adapt_entry(entry: feed_rs::model::Entry, feed_language: Option<&str>) -> FeedEntry {
    let link = entry
        .links
        .iter()
        .map(|l| l.href.trim())
        .find(|href| !href.is_empty())
        .map(str::to_string);

    let id = Some(entry.id.trim().to_string()).filter(|id| !id.is_empty());

    let description = entry
        .media
        .iter()
        .find_map(|m| m.description.as_ref())
        .map(|t| t.content.clone());

    let content_blocks = entry
        .content
        .and_then(|c| c.body)
        .filter(|body| !body.trim().is_empty())
        .into_iter()
        .collect();

    FeedEntry {
        link,
        id,
        title: entry.title.map(|t| t.content),
        summary: entry.summary.map(|t| t.content),
        description,
        content_blocks,
        published: entry.published,
        updated: entry.updated,
        author: entry
            .authors
            .first()
            .map(|a| a.name.trim().to_string())
            .filter(|name| !name.is_empty()),
        language: feed_language.map(str::to_string),
    }
}

/// Repairs the most common breakage in hand-written feeds
fn lenient_cleanup(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    escape_bare_ampersands(text)
}

/// Escapes `&` characters that do not start an entity or character reference
fn escape_bare_ampersands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        if ch == '&' && !starts_reference(&text[idx + 1..]) {
            out.push_str("&amp;");
        } else {
            out.push(ch);
        }
    }
    out
}

fn starts_reference(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let name = &rest[..end];

    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(dec) = name.strip_prefix('#') {
        !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit())
    } else {
        let mut chars = name.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric())
    }
}
