//! Site prescan: guesses a recipe pattern and selectors for a new site
//!
//! The guesses are heuristics meant to pre-fill a site profile. They are
//! never applied to a profile automatically.

use crate::crawler::classifier::has_structured_recipe;
use crate::crawler::fetcher::{FetchOptions, Fetcher};
use crate::crawler::parser::extract_links;
use crate::url::{normalize_url, same_host};
use crate::HarvestError;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

/// Most same-host links considered from the start page
pub const MAX_SAMPLED_LINKS: usize = 200;

/// Candidate path patterns, in tie-break order
pub const COMMON_PATTERNS: &[&str] = &[
    "/recipes/",
    "/recipe/",
    "/recipe-",
    "/recipes-",
    "/dish/",
    "/cook/",
    "/food/",
];

/// Pattern suggested when no common pattern appears at all
pub const FALLBACK_PATTERN: &str = "/recipe";

const METHOD_KEYWORDS: &[&str] = &["method", "instruction", "direction", "steps"];

const INGREDIENT_FALLBACK_QUERY: &str =
    "section.ingredients ul li, .ingredients li, [class*='ingredient'] li";
const INGREDIENT_FALLBACK_SELECTOR: &str = ".ingredients li";

const METHOD_FALLBACK_QUERY: &str =
    "section.method ol li, .method li, [class*='method'] li, [class*='instruction'] li";
const METHOD_FALLBACK_SELECTOR: &str = ".method li";

/// Suggested profile values for a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrescanReport {
    pub recipe_pattern: String,
    pub ingredients_selector: Option<String>,
    pub method_selector: Option<String>,
    /// Page the selectors were guessed from
    pub sample_url: Option<String>,
    pub links_sampled: usize,
}

/// Prescans a site with the default quick-fetch settings
pub async fn prescan(start_url: &str) -> Result<PrescanReport, HarvestError> {
    let fetcher = Fetcher::new(FetchOptions::prescan())?;
    prescan_with(&fetcher, start_url).await
}

/// Prescans a site using the given fetcher
///
/// Fetches the start page, samples its same-host links, scores them against
/// [`COMMON_PATTERNS`], then fetches one sample page to guess selectors.
///
/// # Errors
///
/// Returns [`HarvestError::Prescan`] if the start page cannot be fetched.
pub async fn prescan_with(fetcher: &Fetcher, start_url: &str) -> Result<PrescanReport, HarvestError> {
    let start = normalize_url(start_url)?;

    let html = fetcher
        .fetch_html(start.as_str())
        .await
        .ok_or_else(|| HarvestError::Prescan("Could not fetch start URL".to_string()))?;

    let links = sample_links(&html, &start);
    let recipe_pattern = guess_pattern(&links);
    let sample = links
        .iter()
        .find(|link| link.path().to_lowercase().contains(recipe_pattern))
        .or_else(|| links.first())
        .cloned();

    let mut ingredients_selector = None;
    let mut method_selector = None;
    if let Some(sample) = &sample {
        match fetcher.fetch_html(sample.as_str()).await {
            Some(sample_html) => {
                (ingredients_selector, method_selector) = guess_selectors(&sample_html);
            }
            None => tracing::debug!("Could not fetch prescan sample {}", sample),
        }
    }

    tracing::info!(
        "Prescan of {} suggests pattern '{}' from {} links",
        start,
        recipe_pattern,
        links.len()
    );

    Ok(PrescanReport {
        recipe_pattern: recipe_pattern.to_string(),
        ingredients_selector,
        method_selector,
        sample_url: sample.map(|url| url.to_string()),
        links_sampled: links.len(),
    })
}

/// Distinct same-host links of a page, in document order, capped at
/// [`MAX_SAMPLED_LINKS`]
pub fn sample_links(html: &str, start: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    extract_links(&document, start)
        .into_iter()
        .filter(|link| same_host(start, link))
        .take(MAX_SAMPLED_LINKS)
        .collect()
}

/// Picks the common pattern found in the most link paths
///
/// Paths are compared lowercased. Ties go to the pattern listed first;
/// [`FALLBACK_PATTERN`] is returned when nothing matches.
pub fn guess_pattern(links: &[Url]) -> &'static str {
    let mut scores = [0usize; COMMON_PATTERNS.len()];
    for link in links {
        let path = link.path().to_lowercase();
        for (score, pattern) in scores.iter_mut().zip(COMMON_PATTERNS) {
            if path.contains(pattern) {
                *score += 1;
            }
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((i, score));
        }
    }

    best.map_or(FALLBACK_PATTERN, |(i, _)| COMMON_PATTERNS[i])
}

/// Guesses (ingredients, method) selectors from a sample recipe page
///
/// Pages that already carry structured recipe data need no selectors, so
/// both guesses are `None` for them. Otherwise the first list following a
/// heading that names the section is used, with class-based fallbacks.
pub fn guess_selectors(html: &str) -> (Option<String>, Option<String>) {
    let document = Html::parse_document(html);
    if has_structured_recipe(&document) {
        return (None, None);
    }

    let Ok(outline_query) = Selector::parse("h1, h2, h3, h4, h5, ul, ol") else {
        return (None, None);
    };
    let outline: Vec<ElementRef<'_>> = document.select(&outline_query).collect();

    let ingredients = list_after_heading(&outline, "ingredient")
        .or_else(|| fallback(&document, INGREDIENT_FALLBACK_QUERY, INGREDIENT_FALLBACK_SELECTOR));

    let method = METHOD_KEYWORDS
        .iter()
        .find_map(|keyword| list_after_heading(&outline, keyword))
        .or_else(|| fallback(&document, METHOD_FALLBACK_QUERY, METHOD_FALLBACK_SELECTOR));

    (ingredients, method)
}

fn is_heading(element: &ElementRef<'_>) -> bool {
    matches!(element.value().name(), "h1" | "h2" | "h3" | "h4" | "h5")
}

fn is_list(element: &ElementRef<'_>) -> bool {
    matches!(element.value().name(), "ul" | "ol")
}

/// Selector for the first list after the first heading containing `keyword`
/// that has one
fn list_after_heading(outline: &[ElementRef<'_>], keyword: &str) -> Option<String> {
    outline.iter().enumerate().find_map(|(i, element)| {
        if !is_heading(element) {
            return None;
        }
        let text = element.text().collect::<Vec<_>>().join(" ").to_lowercase();
        if !text.contains(keyword) {
            return None;
        }
        outline[i + 1..]
            .iter()
            .find(|candidate| is_list(candidate))
            .map(list_selector)
    })
}

/// `tag#id li`, or `tag.class1.class2 li` from the first two classes
fn list_selector(list: &ElementRef<'_>) -> String {
    let element = list.value();
    let mut selector = element.name().to_string();

    match element.attr("id").map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            selector.push('#');
            selector.push_str(id);
        }
        None => {
            let classes: Vec<&str> = element
                .attr("class")
                .unwrap_or("")
                .split_whitespace()
                .take(2)
                .collect();
            if !classes.is_empty() {
                selector.push('.');
                selector.push_str(&classes.join("."));
            }
        }
    }

    selector.push_str(" li");
    selector
}

fn fallback(document: &Html, query: &str, suggestion: &str) -> Option<String> {
    let query = Selector::parse(query).ok()?;
    document
        .select(&query)
        .next()
        .map(|_| suggestion.to_string())
}
