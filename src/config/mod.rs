//! Configuration module for GPU Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use gpu_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gpu-scout.toml")).unwrap();
//! println!("Will visit at most {} pages", config.scraper.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ForumConfig, LoginConfig, OutputConfig, ScraperConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, MAX_PAGES_LIMIT};
