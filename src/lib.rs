//! Recipe Harvester: a polite recipe discovery crawler
//!
//! This crate crawls a single website breadth-first, classifies which pages are
//! genuine recipes, stores their URLs, and pushes stored recipes to an external
//! import API at a controlled rate.

pub mod config;
pub mod control;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod upload;
pub mod url;

use thiserror::Error;

/// Main error type for Recipe Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No active site profile configured")]
    NoActiveSite,

    #[error("{kind} already running")]
    AlreadyRunning { kind: state::ProgressKind },

    #[error("Prescan failed: {0}")]
    Prescan(String),

    #[error("Upload is not configured: {0}")]
    UploadNotConfigured(String),

    #[error("API check failed: {0}")]
    ApiCheck(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown site profile: {0}")]
    UnknownSite(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Recipe Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, SiteProfile, UploadConfig};
pub use control::Harvester;
pub use state::{CrawlSnapshot, ProgressBoard, ProgressKind, RunStatus, UploadSnapshot};
pub use url::{is_recipe_candidate, normalize_url, same_host};
