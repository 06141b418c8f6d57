//! GPU Scout: a forum marketplace watcher
//!
//! This crate walks the "for sale" section of a classifieds forum, pulls GPU
//! models and prices out of free-text posts, stores them without duplicates and
//! matches new listings against standing price alerts.

pub mod config;
pub mod driver;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod scrape;
pub mod storage;

use thiserror::Error;

/// Main error type for GPU Scout operations
#[derive(Debug, Error)]
pub enum GpuScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Page driver error: {0}")]
    Driver(#[from] driver::DriverError),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: scrape::ScrapeState,
        to: scrape::ScrapeState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
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
}

/// Result type alias for GPU Scout operations
pub type Result<T> = std::result::Result<T, GpuScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Brand, Currency, Listing, ListingRecord, PriceAlert, ThreadDescriptor};
pub use scrape::{ScrapeOptions, ScrapeResult};
