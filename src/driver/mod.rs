//! Page driver abstraction
//!
//! The scraper never talks to a browser or HTTP client directly. It drives a
//! [`PageDriver`]: one exclusively owned page that can navigate, wait for
//! selectors, evaluate [`PageQuery`] descriptors, click and type.
//!
//! [`HttpPageDriver`] is the bundled implementation for server-rendered forums.

mod http;
mod query;

pub use http::{build_http_client, HttpPageDriver};
pub use query::{PageQuery, QueryOutput, RawThreadRow, ThreadRowQuery};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a page driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Login failed: {0}")]
    Login(String),

    #[error("No page loaded")]
    NoPage,

    #[error("Driver is closed")]
    Closed,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// A single page/tab under exclusive control of one scrape run
///
/// Every navigation and wait takes an explicit timeout. Implementations keep
/// one "current page"; callers are responsible for navigating back to where
/// they need to be.
#[async_trait]
pub trait PageDriver: Send {
    /// Establishes an authenticated session, if the site needs one
    async fn login(&mut self) -> DriverResult<()> {
        Ok(())
    }

    /// Loads a URL as the current page
    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<()>;

    /// Waits until an element matching the selector is present
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Evaluates a query against the current page
    async fn evaluate(&mut self, query: &PageQuery) -> DriverResult<QueryOutput>;

    /// Clicks the first element matching the selector
    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Types text into the first element matching the selector
    async fn type_text(&mut self, selector: &str, text: &str) -> DriverResult<()>;

    /// URL of the current page
    fn current_url(&self) -> Option<String>;

    /// Releases the underlying session
    async fn close(&mut self) -> DriverResult<()>;
}

/// Runs a driver operation under a timeout
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> DriverResult<T>
where
    F: std::future::Future<Output = DriverResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            operation: operation.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}
