//! URL handling module for Recipe Harvester
//!
//! This module provides URL normalization, link resolution, same-host checks
//! and the recipe-candidate path heuristic.

mod domain;
mod normalize;

pub use domain::{host_key, same_host};
pub use normalize::{normalize_url, resolve_link};

use url::Url;

/// Path fragments treated as recipe candidates when no pattern is configured
pub const DEFAULT_RECIPE_MARKERS: &[&str] = &["/recipe", "/recipes"];

/// Decides whether a link deserves classification as a possible recipe
///
/// With a configured `pattern` the link is a candidate when the pattern is a
/// substring of its path (case-sensitive, matching what the operator typed).
/// Without one, the lower-cased path is checked for the default markers.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use recipe_harvester::url::is_recipe_candidate;
///
/// let url = Url::parse("https://example.com/Recipes/pie").unwrap();
/// assert!(is_recipe_candidate(&url, None));
/// assert!(!is_recipe_candidate(&url, Some("/dish/")));
/// ```
pub fn is_recipe_candidate(url: &Url, pattern: Option<&str>) -> bool {
    let path = url.path();
    match pattern {
        Some(pattern) => path.contains(pattern),
        None => {
            let lower = path.to_lowercase();
            DEFAULT_RECIPE_MARKERS
                .iter()
                .any(|marker| lower.contains(marker))
        }
    }
}
