use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of simultaneous fetches per crawl
pub const DEFAULT_MAX_CONCURRENCY: u32 = 4;

/// Default politeness delay applied before every request (seconds)
pub const DEFAULT_REQUEST_DELAY_SECONDS: f64 = 0.8;

/// Default number of additional attempts for transient fetch failures
pub const DEFAULT_RETRIES: u32 = 2;

/// Default per-request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default pause between two upload requests (seconds)
pub const DEFAULT_UPLOAD_RATE_LIMIT_SECONDS: f64 = 2.0;

/// Longest accepted politeness delay or upload interval (seconds)
pub const MAX_INTERVAL_SECONDS: f64 = 3600.0;

/// Browser-like user agent; many recipe sites reject unknown agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/122.0.0.0 Safari/537.36";

/// Main configuration structure for Recipe Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name of the site profile used by `crawl` when none is given
    #[serde(rename = "active-site", default)]
    pub active_site: Option<String>,

    pub storage: StorageConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(rename = "site", default)]
    pub sites: Vec<SiteProfile>,
}

impl Config {
    /// Returns the active site profile
    ///
    /// Uses `active-site` when it is set and names a known profile, otherwise
    /// falls back to the first profile. Returns `None` when no profiles exist.
    pub fn active_profile(&self) -> Option<&SiteProfile> {
        self.active_site
            .as_deref()
            .and_then(|name| self.site_by_name(name))
            .or_else(|| self.sites.first())
    }

    /// Looks up a site profile by name
    pub fn site_by_name(&self, name: &str) -> Option<&SiteProfile> {
        self.sites.iter().find(|site| site.name == name)
    }
}

/// Recipe store location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Import API settings for the upload pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Base URL of the import API (e.g. `https://mealie.example.com`)
    #[serde(rename = "api-base", default)]
    pub api_base: Option<String>,

    /// Bearer token sent with every upload
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    /// Pause between two uploads (seconds)
    #[serde(
        rename = "rate-limit-seconds",
        default = "default_upload_rate_limit"
    )]
    pub rate_limit_seconds: f64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            rate_limit_seconds: DEFAULT_UPLOAD_RATE_LIMIT_SECONDS,
            timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl UploadConfig {
    /// Interval slept between two uploads
    pub fn rate_limit(&self) -> Result<Duration, ConfigError> {
        interval("rate-limit-seconds", self.rate_limit_seconds)
    }

    /// Trimmed API base, `None` when unset or blank
    pub fn base(&self) -> Option<&str> {
        non_blank(self.api_base.as_deref())
    }

    /// Trimmed API key, `None` when unset or blank
    pub fn key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }
}

/// Named configuration bundle describing one crawl target
///
/// A profile is cloned into a crawl run when it starts; edits made afterwards
/// do not affect the running crawl.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteProfile {
    /// Identifier recorded on every recipe discovered through this profile
    pub id: i64,

    /// Human-readable name
    pub name: String,

    /// Where traversal begins; only links on this host are followed
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Path substring marking recipe candidates (`/recipe` heuristics when unset)
    #[serde(rename = "recipe-pattern", default)]
    pub recipe_pattern: Option<String>,

    /// CSS selector for the ingredient list
    #[serde(rename = "ingredients-selector", default)]
    pub ingredients_selector: Option<String>,

    /// CSS selector for the method/instructions list
    #[serde(rename = "method-selector", default)]
    pub method_selector: Option<String>,

    /// Maximum number of simultaneous fetches
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Politeness delay before each request (seconds)
    #[serde(
        rename = "request-delay-seconds",
        default = "default_request_delay"
    )]
    pub request_delay_seconds: f64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Page budget; `0` or unset means unbounded
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u64>,

    /// Recipe budget; `0` or unset means unbounded
    #[serde(rename = "max-recipes", default)]
    pub max_recipes: Option<u64>,

    /// Additional attempts for transient fetch failures
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-request timeout (seconds)
    #[serde(
        rename = "request-timeout-seconds",
        default = "default_request_timeout"
    )]
    pub request_timeout_seconds: u64,
}

impl SiteProfile {
    /// Creates a profile with default tunables for the given start URL
    pub fn new(id: i64, name: impl Into<String>, start_url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            start_url: start_url.into(),
            recipe_pattern: None,
            ingredients_selector: None,
            method_selector: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_delay_seconds: DEFAULT_REQUEST_DELAY_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_pages: None,
            max_recipes: None,
            retries: DEFAULT_RETRIES,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    /// Page budget, `None` when unbounded
    pub fn page_budget(&self) -> Option<u64> {
        self.max_pages.filter(|&n| n > 0)
    }

    /// Recipe budget, `None` when unbounded
    pub fn recipe_budget(&self) -> Option<u64> {
        self.max_recipes.filter(|&n| n > 0)
    }

    /// Politeness delay as a `Duration`
    pub fn request_delay(&self) -> Result<Duration, ConfigError> {
        interval("request-delay-seconds", self.request_delay_seconds)
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Configured recipe pattern, ignoring blank values
    pub fn pattern(&self) -> Option<&str> {
        non_blank(self.recipe_pattern.as_deref())
    }

    /// Configured selector pair, present only when both are non-blank
    pub fn selectors(&self) -> Option<(&str, &str)> {
        match (
            non_blank(self.ingredients_selector.as_deref()),
            non_blank(self.method_selector.as_deref()),
        ) {
            (Some(ingredients), Some(method)) => Some((ingredients, method)),
            _ => None,
        }
    }
}

/// Converts a configured number of seconds, rejecting values no run can honour
fn interval(key: &str, seconds: f64) -> Result<Duration, ConfigError> {
    if seconds > MAX_INTERVAL_SECONDS {
        return Err(ConfigError::Validation(format!(
            "{} must be at most {}, got {}",
            key, MAX_INTERVAL_SECONDS, seconds
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| ConfigError::Validation(format!("{} is not a valid interval: {}", key, e)))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn default_max_concurrency() -> u32 {
    DEFAULT_MAX_CONCURRENCY
}

fn default_request_delay() -> f64 {
    DEFAULT_REQUEST_DELAY_SECONDS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_upload_rate_limit() -> f64 {
    DEFAULT_UPLOAD_RATE_LIMIT_SECONDS
}
