use crate::UrlError;
use url::Url;

/// Normalizes a URL for frontier and store comparisons
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https` schemes
/// 3. Require a host
/// 4. Remove the fragment (everything after `#`)
/// 5. Remove the query string (everything after `?`)
///
/// Paths are left untouched: many recipe sites distinguish `/recipe` from
/// `/recipe/`, so no trailing-slash folding is done.
///
/// # Examples
///
/// ```
/// use recipe_harvester::url::normalize_url;
///
/// let url = normalize_url("https://example.com/recipes/soup?print=1#steps").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/recipes/soup");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves `href` against `base` and normalizes the result
///
/// Returns `None` for links that cannot lead to a crawlable page:
/// `javascript:`, `mailto:`, `tel:` and `data:` schemes, fragment-only
/// anchors, and anything that fails to resolve to an HTTP(S) URL.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let joined = base.join(href).ok()?;
    normalize_parsed(joined).ok()
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    url.set_query(None);

    Ok(url)
}
