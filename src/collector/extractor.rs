//! Article text extraction
//!
//! This module reduces a fetched HTML page to its readable article text:
//! - Picks the main content container (`article`, `main`, `[role=main]`,
//!   falling back to `body`)
//! - Drops scripts, styles, navigation chrome and forms
//! - Collapses whitespace runs to single spaces

use scraper::{ElementRef, Html, Selector};

/// Containers tried in order when looking for the article body
const CONTENT_CONTAINERS: [&str; 4] = ["article", "main", "[role=main]", "body"];

/// Elements whose text is never part of the article
const SKIPPED_TAGS: [&str; 11] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "template",
];

/// Extracts normalized article text from an HTML document
///
/// # Arguments
///
/// * `html` - The full HTML document
///
/// # Returns
///
/// * `Some(String)` - Whitespace-normalized article text
/// * `None` - Nothing usable was found
///
/// # Example
///
/// ```
/// use feedline::collector::extract;
///
/// let html = "<html><body><nav>Menu</nav><article><p>Hello   world</p></article></body></html>";
/// assert_eq!(extract(html), Some("Hello world".to_string()));
/// ```
pub fn extract(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for container in CONTENT_CONTAINERS {
        let Ok(selector) = Selector::parse(container) else {
            continue;
        };

        // First container of this kind that yields any text wins
        for element in document.select(&selector) {
            let text = container_text(element);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    None
}

/// Converts a feed-supplied HTML fragment (summary, description, content
/// block) to normalized plain text
pub fn html_to_text(fragment: &str) -> Option<String> {
    let document = Html::parse_fragment(fragment);
    let text = container_text(document.root_element());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Collapses every whitespace run to one space and trims the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn container_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    normalize_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !SKIPPED_TAGS.contains(&child_element.value().name()) {
                collect_text(child_element, out);
            }
        }
    }
}
