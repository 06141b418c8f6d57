//! Output module for reporting on collected listings
//!
//! This module handles:
//! - Printing per-model price statistics to the terminal
//! - Generating markdown market reports

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{format_listing_table, load_statistics, print_statistics, MarketStatistics};

use crate::model::ListingRecord;
use crate::storage::{ListingFilter, ListingSort, ListingStore, ModelStats, RunRecord, StorageError};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Number of most recent listings included in a report
pub const RECENT_LISTINGS: usize = 20;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything a market report shows
#[derive(Debug, Clone)]
pub struct MarketSummary {
    pub generated_at: DateTime<Utc>,
    pub latest_run: Option<RunRecord>,
    pub total_listings: u64,
    pub model_stats: Vec<ModelStats>,
    /// Newest listings first
    pub recent_listings: Vec<ListingRecord>,
}

/// Builds a market summary from storage
///
/// # Arguments
///
/// * `store` - The listing store to read from
///
/// # Returns
///
/// * `Ok(MarketSummary)` - Successfully generated summary
/// * `Err(OutputError)` - Failed to query storage
pub fn generate_summary(store: &dyn ListingStore) -> OutputResult<MarketSummary> {
    Ok(MarketSummary {
        generated_at: Utc::now(),
        latest_run: store.get_latest_run()?,
        total_listings: store.count_listings()?,
        model_stats: store.aggregate_stats_by_model()?,
        recent_listings: store.query_listings(
            &ListingFilter::default(),
            ListingSort::Newest,
            Some(RECENT_LISTINGS),
        )?,
    })
}
