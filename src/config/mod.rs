//! Configuration module for Miles
//!
//! This module handles loading, parsing, and validating the run configuration.
//! Values come from an optional TOML file and are then overridden by
//! command-line flags.
//!
//! # Example
//!
//! ```no_run
//! use miles::config::load_validated_config;
//! use std::path::Path;
//!
//! let config = load_validated_config(Path::new("miles.toml")).unwrap();
//! println!("Crawling {} with {} workers", config.seed_url, config.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{FetchConfig, RunConfig};

// Re-export parser and validation functions
pub use parser::{load_config, load_validated_config, parse_config};
pub use validation::{validate, MAX_WORKERS};
