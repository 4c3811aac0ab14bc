use crate::config::types::RunConfig;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The file does not have to be complete: a seed URL given on the command line
/// can be filled in afterwards, so validation is left to the caller via
/// [`validate`](crate::config::validate).
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use miles::config::load_config;
///
/// let config = load_config(Path::new("miles.toml")).unwrap();
/// println!("Workers: {}", config.workers);
/// ```
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses a TOML document into a [`RunConfig`]
pub fn parse_config(content: &str) -> Result<RunConfig, ConfigError> {
    let mut config: RunConfig = toml::from_str(content)?;

    // Re-insert through accept_types so ".PNG" and "png" collapse
    let types = std::mem::take(&mut config.accepted_types);
    config.accept_types(types);

    Ok(config)
}

/// Loads a configuration file and validates it in one step
pub fn load_validated_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let config = load_config(path)?;
    validate(&config)?;
    Ok(config)
}
