//! Per-run scrape state

use crate::model::Listing;
use crate::scrape::{ScrapeResult, ScrapeState};
use crate::{GpuScoutError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Hex characters of the url hash kept in a draft id
const DRAFT_HASH_LEN: usize = 12;

/// Mutable state of one scrape run
///
/// Owned by the pagination controller and passed explicitly to each step.
/// Dropped when the run ends.
#[derive(Debug)]
pub struct ScrapeSession {
    state: ScrapeState,
    processed_thread_urls: HashSet<String>,
    listings: Vec<Listing>,
    current_listing_url: Option<String>,
    /// 1-based number of the page being visited
    page: u32,
    processed_pages: u32,
    processed_threads: u32,
    draft_counter: u64,
    /// Index of the first draft not yet handed to the batch sink
    batch_start: usize,
}

impl ScrapeSession {
    pub fn new() -> Self {
        Self {
            state: ScrapeState::Idle,
            processed_thread_urls: HashSet::new(),
            listings: Vec::new(),
            current_listing_url: None,
            page: 1,
            processed_pages: 0,
            processed_threads: 0,
            draft_counter: 0,
            batch_start: 0,
        }
    }

    pub fn state(&self) -> ScrapeState {
        self.state
    }

    /// Moves to the next state
    ///
    /// # Errors
    ///
    /// Returns [`GpuScoutError::InvalidTransition`] if the step is not allowed
    pub fn transition(&mut self, to: ScrapeState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(GpuScoutError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::trace!("Scrape state {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Forces the terminal failure state, whatever the current state
    pub(crate) fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = ScrapeState::Failed;
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Advances to the next listing page
    pub fn next_page(&mut self) {
        self.page += 1;
    }

    pub fn current_listing_url(&self) -> Option<&str> {
        self.current_listing_url.as_deref()
    }

    /// Records the listing page that threads return to
    pub fn set_listing_url(&mut self, url: String) {
        self.current_listing_url = Some(url);
    }

    /// Counts a listing page as visited
    pub fn page_loaded(&mut self) {
        self.processed_pages += 1;
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.processed_thread_urls.contains(url)
    }

    /// Marks a thread as handled, whatever the outcome of its extraction
    ///
    /// Returns false if the url had already been marked.
    pub fn mark_processed(&mut self, url: &str) -> bool {
        let inserted = self.processed_thread_urls.insert(url.to_string());
        if inserted {
            self.processed_threads += 1;
        }
        inserted
    }

    /// Issues the next draft id for a thread url
    ///
    /// The id is the first 12 hex characters of the url's SHA-256 followed by
    /// a run-wide counter, so ids never repeat within a run.
    pub fn next_draft_id(&mut self, url: &str) -> String {
        self.draft_counter += 1;
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        format!("{}_{}", &digest[..DRAFT_HASH_LEN], self.draft_counter)
    }

    /// Appends drafts in thread order
    pub fn push_listings(&mut self, drafts: Vec<Listing>) {
        self.listings.extend(drafts);
    }

    /// Drafts accumulated so far
    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    /// Drafts added since the last [`close_page_batch`](Self::close_page_batch)
    pub fn page_batch(&self) -> &[Listing] {
        &self.listings[self.batch_start..]
    }

    /// Marks the current page batch as handed off
    pub fn close_page_batch(&mut self) {
        self.batch_start = self.listings.len();
    }

    pub fn processed_pages(&self) -> u32 {
        self.processed_pages
    }

    pub fn processed_threads(&self) -> u32 {
        self.processed_threads
    }

    /// Consumes the session into a run result
    pub fn into_result(self, error: Option<String>, partial_results: bool) -> ScrapeResult {
        ScrapeResult {
            success: error.is_none(),
            total_listings: self.listings.len(),
            data: self.listings,
            processed_threads: self.processed_threads,
            processed_pages: self.processed_pages,
            error,
            partial_results: partial_results.then_some(true),
        }
    }
}

impl Default for ScrapeSession {
    fn default() -> Self {
        Self::new()
    }
}
