use crate::config::types::{FetchConfig, RunConfig};
use crate::ConfigError;
use std::collections::BTreeSet;
use std::path::Path;
use url::Url;

/// Upper bound on the worker pool size
pub const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &RunConfig) -> Result<(), ConfigError> {
    validate_seed_url(&config.seed_url)?;
    validate_workers(config.workers)?;
    validate_destination(&config.destination)?;
    validate_file_types(&config.accepted_types)?;
    validate_fetch_config(&config.fetch)?;
    Ok(())
}

/// Validates the seed URL: absolute, HTTP(S), with a host
fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    if seed.trim().is_empty() {
        return Err(ConfigError::Validation("seed URL is required".to_string()));
    }

    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use HTTP or HTTPS",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(())
}

fn validate_workers(workers: usize) -> Result<(), ConfigError> {
    if !(1..=MAX_WORKERS).contains(&workers) {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, workers
        )));
    }
    Ok(())
}

/// Validates the destination path
///
/// A missing directory is fine (it is created at run start); an existing
/// non-directory is not.
fn validate_destination(destination: &Path) -> Result<(), ConfigError> {
    if destination.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "destination cannot be empty".to_string(),
        ));
    }

    if destination.exists() && !destination.is_dir() {
        return Err(ConfigError::Validation(format!(
            "destination '{}' exists and is not a directory",
            destination.display()
        )));
    }

    Ok(())
}

/// Validates accepted file types: lowercase-insensitive alphanumeric extensions
fn validate_file_types(types: &BTreeSet<String>) -> Result<(), ConfigError> {
    for ty in types {
        if ty.is_empty() {
            return Err(ConfigError::InvalidFileType(
                "file type cannot be empty".to_string(),
            ));
        }

        if !ty.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidFileType(format!(
                "'{}' must contain only ASCII letters and digits",
                ty
            )));
        }
    }
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}
