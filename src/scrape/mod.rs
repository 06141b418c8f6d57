//! Scrape run orchestration
//!
//! This module contains the pagination state machine and the per-thread
//! processor, together with the values they exchange with callers:
//! - [`ScrapeOptions`] and [`SiteProfile`] describe what to visit
//! - [`ScrapeResult`] is what a run returns
//! - [`BatchSink`] receives each page's drafts for persistence
//! - [`StopSignal`] lets the caller end a run early

mod pagination;
mod progress;
mod session;
mod state;
mod thread;

pub use pagination::PaginationController;
pub use progress::{ProgressReporter, ProgressStream};
pub use session::ScrapeSession;
pub use state::ScrapeState;
pub use thread::{ThreadError, ThreadProcessor};

use crate::config::{Config, ScraperConfig, MAX_PAGES_LIMIT};
use crate::driver::ThreadRowQuery;
use crate::model::Listing;
use crate::{ConfigError, ConfigResult, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Listing pages to visit, 1..=50
    pub max_pages: u32,
    /// New threads processed per listing page
    pub max_threads_per_page: u32,
    pub headless: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            max_pages: 5,
            max_threads_per_page: 25,
            headless: true,
        }
    }
}

impl ScrapeOptions {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            max_threads_per_page: config.max_threads_per_page,
            headless: config.headless,
        }
    }

    /// Checks the option ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_PAGES_LIMIT).contains(&self.max_pages) {
            return Err(ConfigError::Validation(format!(
                "max_pages must be between 1 and {}, got {}",
                MAX_PAGES_LIMIT, self.max_pages
            )));
        }
        if self.max_threads_per_page < 1 {
            return Err(ConfigError::Validation(format!(
                "max_threads_per_page must be >= 1, got {}",
                self.max_threads_per_page
            )));
        }
        Ok(())
    }
}

/// Outcome of a scrape run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub success: bool,
    pub data: Vec<Listing>,
    pub total_listings: usize,
    pub processed_threads: u32,
    pub processed_pages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_results: Option<bool>,
}

/// Where and how a forum is read
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// First listing page
    pub listing_url: Url,
    /// Query parameter carrying the row offset
    pub offset_param: String,
    /// Offset stride between listing pages
    pub page_size: u32,
    pub thread_query: ThreadRowQuery,
    /// Post body selectors, in priority order
    pub post_selectors: Vec<String>,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
}

impl SiteProfile {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            listing_url: Url::parse(&config.forum.listing_url)?,
            offset_param: config.forum.offset_param.clone(),
            page_size: config.scraper.page_size,
            thread_query: ThreadRowQuery::from_forum_config(&config.forum),
            post_selectors: config.forum.post_selectors.clone(),
            navigation_timeout: Duration::from_secs(config.scraper.navigation_timeout_secs),
            selector_timeout: Duration::from_secs(config.scraper.selector_timeout_secs),
        })
    }

    /// URL of a 1-based listing page
    ///
    /// The offset parameter is set to `(page - 1) * page_size`, replacing any
    /// value already present in the configured url.
    pub fn listing_page_url(&self, page: u32) -> String {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(self.page_size);
        let mut url = self.listing_url.clone();

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != self.offset_param.as_str())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(&self.offset_param, &offset.to_string());

        url.to_string()
    }
}

/// Cooperative cancellation flag shared between a run and its caller
///
/// The run checks it between threads and between pages only.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop at the next checkpoint
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Counters reported back by a [`BatchSink`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub saved: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub triggered: usize,
}

/// Receives the drafts of each listing page as soon as the page is done
pub trait BatchSink: Send {
    fn accept(&mut self, page: u32, listings: &[Listing]) -> BatchOutcome;
}

/// Sink that keeps nothing, for dry runs
#[derive(Debug, Default)]
pub struct DiscardSink;

impl BatchSink for DiscardSink {
    fn accept(&mut self, _page: u32, _listings: &[Listing]) -> BatchOutcome {
        BatchOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ForumConfig, OutputConfig, UserAgentConfig};

    fn config(listing_url: &str) -> Config {
        Config {
            scraper: ScraperConfig::default(),
            forum: ForumConfig::with_defaults(listing_url, "Müük"),
            user_agent: UserAgentConfig {
                name: "GpuScout".to_string(),
                version: "0.1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
            },
            output: OutputConfig {
                database_path: "./test.db".to_string(),
                summary_path: "./report.md".to_string(),
            },
            login: None,
        }
    }

    #[test]
    fn test_listing_page_url_offsets() {
        let profile =
            SiteProfile::from_config(&config("https://forum.example.com/viewforum.php?f=3"))
                .unwrap();
        assert_eq!(
            profile.listing_page_url(1),
            "https://forum.example.com/viewforum.php?f=3&start=0"
        );
        assert_eq!(
            profile.listing_page_url(3),
            "https://forum.example.com/viewforum.php?f=3&start=50"
        );
    }

    #[test]
    fn test_listing_page_url_replaces_existing_offset() {
        let profile =
            SiteProfile::from_config(&config("https://forum.example.com/viewforum.php?start=75&f=3"))
                .unwrap();
        assert_eq!(
            profile.listing_page_url(2),
            "https://forum.example.com/viewforum.php?f=3&start=25"
        );
    }

    #[test]
    fn test_listing_page_url_large_offset() {
        let mut config = config("https://forum.example.com/viewforum.php?f=3");
        config.scraper.page_size = u32::MAX;
        let profile = SiteProfile::from_config(&config).unwrap();
        assert_eq!(
            profile.listing_page_url(u32::MAX),
            "https://forum.example.com/viewforum.php?f=3&start=18446744060824649730"
        );
    }

    #[test]
    fn test_options_validate() {
        assert!(ScrapeOptions::default().validate().is_ok());

        let options = ScrapeOptions {
            max_pages: 0,
            ..ScrapeOptions::default()
        };
        assert!(options.validate().is_err());

        let options = ScrapeOptions {
            max_pages: 51,
            ..ScrapeOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_stop_signal_shared() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_stopped());
        clone.stop();
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ScrapeResult {
            success: true,
            data: Vec::new(),
            total_listings: 0,
            processed_threads: 2,
            processed_pages: 1,
            error: None,
            partial_results: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalListings"], 0);
        assert_eq!(json["processedThreads"], 2);
        assert!(json.get("error").is_none());
        assert!(json.get("partialResults").is_none());
    }
}
