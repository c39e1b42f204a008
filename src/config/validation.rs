use crate::config::types::{Config, SiteProfile, StorageConfig, UploadConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_upload_config(&config.upload)?;
    validate_sites(&config.sites)?;

    if let Some(active) = &config.active_site {
        if config.site_by_name(active).is_none() {
            return Err(ConfigError::UnknownSite(active.clone()));
        }
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates upload configuration
///
/// Missing credentials are allowed here; the upload pipeline reports them
/// when it is started.
fn validate_upload_config(config: &UploadConfig) -> Result<(), ConfigError> {
    if !config.rate_limit_seconds.is_finite() || config.rate_limit_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "rate_limit_seconds must be a non-negative number, got {}",
            config.rate_limit_seconds
        )));
    }
    config.rate_limit()?;

    if let Some(base) = config.base() {
        Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_base '{}': {}", base, e)))?;
    }

    Ok(())
}

/// Validates all site profiles and their identifiers
fn validate_sites(sites: &[SiteProfile]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();

    for site in sites {
        validate_site(site)?;

        if !ids.insert(site.id) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site id {}",
                site.id
            )));
        }
        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site name '{}'",
                site.name
            )));
        }
    }

    Ok(())
}

/// Validates a single site profile
pub fn validate_site(site: &SiteProfile) -> Result<(), ConfigError> {
    if site.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(site.start_url.trim()).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", site.start_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Start URL '{}' must use HTTP or HTTPS",
            site.start_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Start URL '{}' has no host",
            site.start_url
        )));
    }

    if site.max_concurrency < 1 || site.max_concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 64, got {}",
            site.max_concurrency
        )));
    }

    if !site.request_delay_seconds.is_finite() || site.request_delay_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "request_delay_seconds must be a non-negative number, got {}",
            site.request_delay_seconds
        )));
    }
    site.request_delay()?;

    if site.request_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_seconds must be >= 1".to_string(),
        ));
    }

    if site.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}
