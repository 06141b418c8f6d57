//! Storage traits and error types
//!
//! This module defines the persistence gateway used by the dedup pipeline and
//! the read-only alert source used by the matcher.

use crate::model::{Listing, ListingRecord, PriceAlert};
use crate::storage::{
    DuplicateGroup, ListingFilter, ListingSort, ModelStats, RunRecord, RunStatus, RunSummary,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence gateway for listings
///
/// Listings are written once and never updated. The url column carries a
/// unique index so that a second insert of the same thread is ignored.
pub trait ListingStore {
    // ===== Run Management =====

    /// Creates a new scrape run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the end of a run with its counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Listings =====

    /// Checks whether a listing with this thread url is stored
    fn exists_by_url(&self, url: &str) -> StorageResult<bool>;

    /// Inserts a listing
    ///
    /// # Returns
    ///
    /// The stored record, or `None` if a listing with the same url already exists
    fn insert_listing(&mut self, listing: &Listing) -> StorageResult<Option<ListingRecord>>;

    /// Deletes listings by row id, returning how many were removed
    fn delete_listings_by_ids(&mut self, ids: &[i64]) -> StorageResult<usize>;

    /// Queries listings matching a filter
    fn query_listings(
        &self,
        filter: &ListingFilter,
        sort: ListingSort,
        limit: Option<usize>,
    ) -> StorageResult<Vec<ListingRecord>>;

    /// Per-model price statistics
    fn aggregate_stats_by_model(&self) -> StorageResult<Vec<ModelStats>>;

    /// Every stored listing, oldest first
    fn all_listings(&self) -> StorageResult<Vec<ListingRecord>>;

    /// Number of stored listings
    fn count_listings(&self) -> StorageResult<u64>;

    /// Deletes every listing, returning how many were removed
    fn clear_listings(&mut self) -> StorageResult<usize>;

    // ===== Maintenance =====

    /// Groups of listings sharing a url, for databases created without the unique index
    fn find_duplicate_url_groups(&self) -> StorageResult<Vec<DuplicateGroup>>;

    /// Writes today's per-model price snapshot
    fn refresh_price_history(&mut self) -> StorageResult<usize>;

    /// Creates the unique url index if the data allows it
    ///
    /// Returns false while duplicate urls are still present.
    fn ensure_unique_url_index(&mut self) -> StorageResult<bool>;
}

/// Read-only source of standing price alerts
pub trait AlertSource {
    fn list_standing_alerts(&self) -> StorageResult<Vec<PriceAlert>>;
}
