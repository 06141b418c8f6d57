//! Persistence pipeline
//!
//! Each listing page's drafts go through the [`DedupStore`] and the newly
//! saved records are matched against standing price alerts.

mod alerts;
mod dedup;

pub use alerts::{alert_matches, match_alerts, EXACT_TOLERANCE};
pub use dedup::{DedupStore, RemovalReport, SaveFailure, SaveOutcome, SaveSummary};

use crate::model::{Listing, TriggeredAlert};
use crate::scrape::{BatchOutcome, BatchSink};
use crate::storage::{AlertSource, ListingStore};

/// Totals across every batch a pipeline has handled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub saved: usize,
    pub duplicates: usize,
    pub errors: Vec<SaveFailure>,
    pub triggered: Vec<TriggeredAlert>,
}

/// Batch sink that saves drafts and fires price alerts
pub struct Pipeline<S> {
    store: S,
    report: PipelineReport,
}

impl<S> Pipeline<S>
where
    S: ListingStore + AlertSource,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            report: PipelineReport::default(),
        }
    }

    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Returns the store and the accumulated report
    pub fn into_parts(self) -> (S, PipelineReport) {
        (self.store, self.report)
    }

    /// Saves a batch and matches alerts against what was newly saved
    pub fn process(&mut self, listings: &[Listing]) -> BatchOutcome {
        let summary = DedupStore::new(&mut self.store).process_and_save(listings);

        let triggered = if summary.saved_listings.is_empty() {
            Vec::new()
        } else {
            match self.store.list_standing_alerts() {
                Ok(alerts) => match_alerts(&summary.saved_listings, &alerts),
                Err(e) => {
                    tracing::warn!("Failed to load price alerts: {}", e);
                    Vec::new()
                }
            }
        };

        for hit in &triggered {
            tracing::info!(
                "Price alert {} for {}: {} at {}{} ({})",
                hit.alert.id,
                hit.alert.user_id,
                hit.listing.model,
                hit.listing.price,
                hit.listing.currency,
                hit.listing.url
            );
        }

        let outcome = BatchOutcome {
            saved: summary.saved,
            duplicates: summary.duplicates,
            errors: summary.errors.len(),
            triggered: triggered.len(),
        };

        self.report.saved += summary.saved;
        self.report.duplicates += summary.duplicates;
        self.report.errors.extend(summary.errors);
        self.report.triggered.extend(triggered);

        outcome
    }
}

impl<S> BatchSink for Pipeline<S>
where
    S: ListingStore + AlertSource + Send,
{
    fn accept(&mut self, page: u32, listings: &[Listing]) -> BatchOutcome {
        tracing::debug!("Persisting {} drafts from page {}", listings.len(), page);
        self.process(listings)
    }
}
