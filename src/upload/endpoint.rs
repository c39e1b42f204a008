//! Import endpoint resolution

/// Path appended to a base that already points into the API
const IMPORT_PATH: &str = "/recipes/import";

/// Path appended to a bare server base
const API_IMPORT_PATH: &str = "/api/recipes/import";

/// Paths tried, in order, when checking API credentials
pub const PROBE_PATHS: &[&str] = &["/api/app/about", "/api/health", "/api/users/self"];

/// Derives the recipe import endpoint from a configured API base
///
/// Trailing slashes are ignored. A base ending in `/api`, or containing
/// `/api/` anywhere, gets `/recipes/import` appended; any other base gets
/// `/api/recipes/import`.
///
/// # Examples
///
/// ```
/// use recipe_harvester::upload::import_endpoint;
///
/// assert_eq!(
///     import_endpoint("https://meals.example.com/"),
///     "https://meals.example.com/api/recipes/import"
/// );
/// assert_eq!(
///     import_endpoint("https://meals.example.com/api"),
///     "https://meals.example.com/api/recipes/import"
/// );
/// ```
pub fn import_endpoint(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.ends_with("/api") || base.contains("/api/") {
        format!("{}{}", base, IMPORT_PATH)
    } else {
        format!("{}{}", base, API_IMPORT_PATH)
    }
}

/// URLs tried when checking API credentials
///
/// A trailing `/api` on the base is dropped first, so the probe paths are
/// not doubled.
pub fn probe_urls(base: &str) -> Vec<String> {
    let base = base.trim().trim_end_matches('/');
    let root = base.strip_suffix("/api").unwrap_or(base);
    PROBE_PATHS
        .iter()
        .map(|path| format!("{}{}", root, path))
        .collect()
}
