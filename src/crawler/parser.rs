//! HTML parser for extracting links and page titles
//!
//! This module handles parsing fetched pages to extract:
//! - Links to follow (from `<a>` tags)
//! - A display title for stored recipes

use crate::url::resolve_link;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Longest title stored with a recipe, in characters
pub const MAX_TITLE_CHARS: usize = 200;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// `<title>` text, falling back to the first `<h1>`
    pub title: Option<String>,

    /// Normalized absolute links in document order, without duplicates
    pub links: Vec<Url>,
}

/// Parses HTML content and extracts links and the title
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only anchors
///
/// Links are returned normalized (no query, no fragment), so two hrefs that
/// differ only there appear once.
///
/// # Example
///
/// ```
/// use recipe_harvester::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the display title of a page
///
/// Uses the `<title>` text when non-empty, otherwise the first `<h1>`.
/// Whitespace runs are collapsed and the result is cut to
/// [`MAX_TITLE_CHARS`] characters.
pub fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title")
        .or_else(|| first_text(document, "h1"))
        .map(|title| title.chars().take(MAX_TITLE_CHARS).collect())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| {
            element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
}

/// Extracts all followable links from the HTML document
pub fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let a_selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return links,
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(link) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if seen.insert(link.as_str().to_string()) {
            links.push(link);
        }
    }

    links
}
