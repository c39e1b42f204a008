//! Configuration module for Recipe Harvester
//!
//! Site profiles, storage location and upload credentials are read from a
//! TOML file. Profiles are treated as immutable snapshots once a run starts.
//!
//! # Example
//!
//! ```no_run
//! use recipe_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! if let Some(site) = config.active_profile() {
//!     println!("Crawling {} from {}", site.name, site.start_url);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, SiteProfile, StorageConfig, UploadConfig, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_REQUEST_DELAY_SECONDS, DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_RETRIES,
    DEFAULT_UPLOAD_RATE_LIMIT_SECONDS, DEFAULT_USER_AGENT, MAX_INTERVAL_SECONDS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate_site;
