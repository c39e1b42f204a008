//! Recipe page classification
//!
//! A page is a recipe when it carries schema.org `Recipe` structured data in
//! a JSON-LD block, or when both configured CSS selectors match at least one
//! element.

use crate::crawler::parser::extract_title;
use scraper::{Html, Selector};
use serde_json::Value;

/// Outcome of classifying one fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageVerdict {
    pub is_recipe: bool,
    pub title: Option<String>,
}

/// Classifies pages as recipes
///
/// Selectors are parsed once when the classifier is built and reused for
/// every page of a run.
#[derive(Debug, Clone, Default)]
pub struct RecipeClassifier {
    selectors: Option<(Selector, Selector)>,
}

impl RecipeClassifier {
    /// Builds a classifier from an optional (ingredients, method) selector pair
    ///
    /// A selector that does not parse disables the selector rule for the
    /// whole run; structured data still applies.
    pub fn new(selectors: Option<(&str, &str)>) -> Self {
        let selectors = selectors.and_then(|(ingredients, method)| {
            match (Selector::parse(ingredients), Selector::parse(method)) {
                (Ok(ingredients), Ok(method)) => Some((ingredients, method)),
                _ => {
                    tracing::warn!(
                        "Ignoring invalid recipe selectors '{}' / '{}'",
                        ingredients,
                        method
                    );
                    None
                }
            }
        });

        Self { selectors }
    }

    /// Returns true if selector-based classification is active
    pub fn has_selectors(&self) -> bool {
        self.selectors.is_some()
    }

    /// Classifies a page and extracts its title in a single parse
    pub fn classify_page(&self, html: &str) -> PageVerdict {
        let document = Html::parse_document(html);
        PageVerdict {
            is_recipe: self.matches(&document),
            title: extract_title(&document),
        }
    }

    /// Returns true if the page is a recipe
    pub fn is_recipe(&self, html: &str) -> bool {
        self.matches(&Html::parse_document(html))
    }

    fn matches(&self, document: &Html) -> bool {
        if has_structured_recipe(document) {
            return true;
        }

        match &self.selectors {
            Some((ingredients, method)) => {
                document.select(ingredients).next().is_some()
                    && document.select(method).next().is_some()
            }
            None => false,
        }
    }
}

/// Classifies a page with optional selectors
///
/// Convenience wrapper around [`RecipeClassifier`] for one-off checks.
pub fn classify(html: &str, selectors: Option<(&str, &str)>) -> bool {
    RecipeClassifier::new(selectors).is_recipe(html)
}

/// Returns true if any JSON-LD block on the page declares a `Recipe`
///
/// Blocks that fail to parse are skipped.
pub fn has_structured_recipe(document: &Html) -> bool {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return false;
    };

    document.select(&selector).any(|script| {
        let text: String = script.text().collect();
        if text.trim().is_empty() {
            return false;
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => value_declares_recipe(&value),
            Err(e) => {
                tracing::debug!("Skipping malformed JSON-LD block: {}", e);
                false
            }
        }
    })
}

/// Checks a parsed JSON-LD document: a node, an array of nodes, or a node
/// carrying an `@graph` array
fn value_declares_recipe(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(node_or_graph_declares_recipe),
        Value::Object(_) => node_or_graph_declares_recipe(value),
        _ => false,
    }
}

fn node_or_graph_declares_recipe(node: &Value) -> bool {
    if node_is_recipe(node) {
        return true;
    }

    node.get("@graph")
        .and_then(Value::as_array)
        .is_some_and(|graph| graph.iter().any(node_is_recipe))
}

fn node_is_recipe(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(kind)) => is_recipe_type(kind),
        Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).any(is_recipe_type),
        _ => false,
    }
}

/// Matches `Recipe` case-insensitively, also in IRI form such as
/// `http://schema.org/Recipe` or `schema:Recipe`
fn is_recipe_type(kind: &str) -> bool {
    let last = kind
        .trim()
        .rsplit(|c| c == '/' || c == ':' || c == '#')
        .next()
        .unwrap_or("");
    last.eq_ignore_ascii_case("recipe")
}
