//! Idempotent listing persistence
//!
//! The thread url is the dedup unit. A url that is already stored, or that
//! was saved earlier in the same batch, makes every later draft for it a
//! duplicate.

use crate::model::{Listing, ListingRecord};
use crate::storage::{DuplicateGroup, ListingStore, StorageResult};

/// Result of saving one draft
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(ListingRecord),
    Duplicate,
}

/// A draft that could not be saved
#[derive(Debug, Clone, PartialEq)]
pub struct SaveFailure {
    pub url: String,
    pub message: String,
}

/// Counters for a saved batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveSummary {
    pub saved: usize,
    pub duplicates: usize,
    pub errors: Vec<SaveFailure>,
    /// Records created by this batch, in draft order
    pub saved_listings: Vec<ListingRecord>,
}

/// Outcome of duplicate removal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub groups: usize,
    pub removed: usize,
    /// Whether the unique url index is in place afterwards
    pub unique_index: bool,
}

/// Dedup layer over a listing store
pub struct DedupStore<'a, S: ListingStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: ListingStore + ?Sized> DedupStore<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn exists(&self, url: &str) -> StorageResult<bool> {
        self.store.exists_by_url(url)
    }

    /// Saves a draft unless its url is already stored
    ///
    /// The existence check avoids a write in the common case; the unique url
    /// index decides when two writers race.
    pub fn save(&mut self, listing: &Listing) -> StorageResult<SaveOutcome> {
        if self.store.exists_by_url(&listing.url)? {
            return Ok(SaveOutcome::Duplicate);
        }

        match self.store.insert_listing(listing)? {
            Some(record) => Ok(SaveOutcome::Saved(record)),
            None => Ok(SaveOutcome::Duplicate),
        }
    }

    /// Saves a batch of drafts in order
    ///
    /// A failed save is recorded and the batch continues. The price history
    /// snapshot is refreshed when at least one draft was saved.
    pub fn process_and_save(&mut self, listings: &[Listing]) -> SaveSummary {
        let mut summary = SaveSummary::default();

        for listing in listings {
            match self.save(listing) {
                Ok(SaveOutcome::Saved(record)) => {
                    summary.saved += 1;
                    summary.saved_listings.push(record);
                }
                Ok(SaveOutcome::Duplicate) => {
                    tracing::debug!("Duplicate listing {}", listing.url);
                    summary.duplicates += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to save listing {}: {}", listing.url, e);
                    summary.errors.push(SaveFailure {
                        url: listing.url.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if summary.saved > 0 {
            if let Err(e) = self.store.refresh_price_history() {
                tracing::warn!("Failed to refresh price history: {}", e);
            }
        }

        tracing::info!(
            "Saved {} listings, {} duplicates, {} errors",
            summary.saved,
            summary.duplicates,
            summary.errors.len()
        );
        summary
    }

    /// Deletes every stored listing
    pub fn clear_all(&mut self) -> StorageResult<usize> {
        let removed = self.store.clear_listings()?;
        tracing::info!("Cleared {} listings", removed);
        Ok(removed)
    }

    pub fn find_duplicate_groups(&self) -> StorageResult<Vec<DuplicateGroup>> {
        self.store.find_duplicate_url_groups()
    }

    /// Keeps the earliest listing of every duplicate group and deletes the rest
    ///
    /// Earliest means lowest `scraped_at`, then lowest id. Afterwards the
    /// unique url index is created again if it was missing.
    pub fn remove_duplicates(&mut self) -> StorageResult<RemovalReport> {
        let groups = self.store.find_duplicate_url_groups()?;

        let doomed: Vec<i64> = groups
            .iter()
            .flat_map(|group| {
                let mut records: Vec<&ListingRecord> = group.records.iter().collect();
                records.sort_by(|a, b| a.scraped_at.cmp(&b.scraped_at).then(a.id.cmp(&b.id)));
                records.into_iter().skip(1).map(|record| record.id)
            })
            .collect();

        let removed = if doomed.is_empty() {
            0
        } else {
            self.store.delete_listings_by_ids(&doomed)?
        };

        let unique_index = self.store.ensure_unique_url_index()?;
        if !unique_index {
            tracing::warn!("Unique url index still cannot be created");
        }

        tracing::info!(
            "Removed {} duplicate listings from {} groups",
            removed,
            groups.len()
        );

        Ok(RemovalReport {
            groups: groups.len(),
            removed,
            unique_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Brand, Currency};
    use crate::storage::{
        ListingFilter, ListingSort, ModelStats, RunRecord, RunStatus, RunSummary, SqliteStorage,
        StorageError,
    };
    use chrono::{Duration, Utc};

    fn draft(url: &str, model: &str, price: f64) -> Listing {
        Listing {
            id: format!("{}_1", url.len()),
            model: model.to_string(),
            brand: Brand::Nvidia,
            price,
            currency: Currency::Euro,
            ah_price: None,
            ok_price: None,
            title: model.to_string(),
            url: url.to_string(),
            author: "seller".to_string(),
            location: None,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_same_batch_twice_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let batch = vec![
            draft("https://f/t/1", "RTX 3070", 350.0),
            draft("https://f/t/2", "RTX 3060", 250.0),
        ];

        let first = DedupStore::new(&mut storage).process_and_save(&batch);
        assert_eq!(first.saved, 2);
        assert_eq!(first.duplicates, 0);
        assert_eq!(first.saved_listings.len(), 2);

        let second = DedupStore::new(&mut storage).process_and_save(&batch);
        assert_eq!(second.saved, 0);
        assert_eq!(second.duplicates, 2);
        assert!(second.saved_listings.is_empty());
    }

    #[test]
    fn test_later_draft_of_same_thread_is_duplicate() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let batch = vec![
            draft("https://f/t/1", "RTX 3070", 350.0),
            draft("https://f/t/1", "RTX 3080", 500.0),
        ];

        let summary = DedupStore::new(&mut storage).process_and_save(&batch);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.saved_listings[0].model, "RTX 3070");
    }

    /// Store whose inserts fail for one url
    struct FlakyStore {
        inner: SqliteStorage,
        failing_url: String,
        history_refreshes: usize,
    }

    impl FlakyStore {
        fn new(failing_url: &str) -> Self {
            Self {
                inner: SqliteStorage::new_in_memory().unwrap(),
                failing_url: failing_url.to_string(),
                history_refreshes: 0,
            }
        }
    }

    impl ListingStore for FlakyStore {
        fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
            self.inner.create_run(config_hash)
        }
        fn finish_run(&mut self, id: i64, status: RunStatus, summary: &RunSummary) -> StorageResult<()> {
            self.inner.finish_run(id, status, summary)
        }
        fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
            self.inner.get_latest_run()
        }
        fn exists_by_url(&self, url: &str) -> StorageResult<bool> {
            self.inner.exists_by_url(url)
        }
        fn insert_listing(&mut self, listing: &Listing) -> StorageResult<Option<ListingRecord>> {
            if listing.url == self.failing_url {
                return Err(StorageError::Database("disk I/O error".to_string()));
            }
            self.inner.insert_listing(listing)
        }
        fn delete_listings_by_ids(&mut self, ids: &[i64]) -> StorageResult<usize> {
            self.inner.delete_listings_by_ids(ids)
        }
        fn query_listings(
            &self,
            filter: &ListingFilter,
            sort: ListingSort,
            limit: Option<usize>,
        ) -> StorageResult<Vec<ListingRecord>> {
            self.inner.query_listings(filter, sort, limit)
        }
        fn aggregate_stats_by_model(&self) -> StorageResult<Vec<ModelStats>> {
            self.inner.aggregate_stats_by_model()
        }
        fn all_listings(&self) -> StorageResult<Vec<ListingRecord>> {
            self.inner.all_listings()
        }
        fn count_listings(&self) -> StorageResult<u64> {
            self.inner.count_listings()
        }
        fn clear_listings(&mut self) -> StorageResult<usize> {
            self.inner.clear_listings()
        }
        fn find_duplicate_url_groups(&self) -> StorageResult<Vec<DuplicateGroup>> {
            self.inner.find_duplicate_url_groups()
        }
        fn refresh_price_history(&mut self) -> StorageResult<usize> {
            self.history_refreshes += 1;
            self.inner.refresh_price_history()
        }
        fn ensure_unique_url_index(&mut self) -> StorageResult<bool> {
            self.inner.ensure_unique_url_index()
        }
    }

    #[test]
    fn test_failed_save_does_not_stop_batch() {
        let mut store = FlakyStore::new("https://f/t/2");
        let batch = vec![
            draft("https://f/t/1", "RTX 3070", 350.0),
            draft("https://f/t/2", "RTX 3060", 250.0),
            draft("https://f/t/3", "RX 6800", 380.0),
        ];

        let summary = DedupStore::new(&mut store).process_and_save(&batch);
        assert_eq!(summary.saved, 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].url, "https://f/t/2");
        assert_eq!(store.count_listings().unwrap(), 2);
        assert_eq!(store.history_refreshes, 1);
    }

    #[test]
    fn test_price_history_refreshed_only_after_saves() {
        let mut store = FlakyStore::new("https://f/t/9");
        let batch = vec![
            draft("https://f/t/1", "RTX 3070", 350.0),
            draft("https://f/t/2", "RTX 3070", 370.0),
        ];

        let summary = DedupStore::new(&mut store).process_and_save(&batch);
        assert_eq!(summary.saved, 2);
        assert_eq!(store.history_refreshes, 1);

        // Only duplicates: no refresh
        let summary = DedupStore::new(&mut store).process_and_save(&batch);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(store.history_refreshes, 1);

        // Only failures: no refresh either
        let summary =
            DedupStore::new(&mut store).process_and_save(&[draft("https://f/t/9", "RX 6800", 380.0)]);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(store.history_refreshes, 1);

        // Nothing at all
        DedupStore::new(&mut store).process_and_save(&[]);
        assert_eq!(store.history_refreshes, 1);
    }

    #[test]
    fn test_remove_duplicates_keeps_earliest() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.drop_unique_url_index().unwrap();

        let now = Utc::now();
        for (hours_ago, model) in [(1, "later"), (3, "earliest"), (2, "middle")] {
            let mut d = draft("https://f/t/1", model, 350.0);
            d.scraped_at = now - Duration::hours(hours_ago);
            storage.insert_listing(&d).unwrap();
        }
        storage
            .insert_listing(&draft("https://f/t/2", "RTX 3060", 250.0))
            .unwrap();

        let mut store = DedupStore::new(&mut storage);
        assert_eq!(store.find_duplicate_groups().unwrap().len(), 1);

        let report = store.remove_duplicates().unwrap();
        assert_eq!(report.groups, 1);
        assert_eq!(report.removed, 2);
        assert!(report.unique_index);

        let remaining = storage.all_listings().unwrap();
        let models: Vec<&str> = remaining.iter().map(|l| l.model.as_str()).collect();
        assert!(models.contains(&"earliest"));
        assert_eq!(remaining.len(), 2);

        // With the index back, a repeated url is refused by storage itself
        assert!(storage
            .insert_listing(&draft("https://f/t/1", "again", 300.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_remove_duplicates_noop_on_clean_store() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut store = DedupStore::new(&mut storage);
        store.save(&draft("https://f/t/1", "RTX 3070", 350.0)).unwrap();

        let report = store.remove_duplicates().unwrap();
        assert_eq!(report, RemovalReport { groups: 0, removed: 0, unique_index: true });
        assert!(store.exists("https://f/t/1").unwrap());
    }

    #[test]
    fn test_clear_all() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut store = DedupStore::new(&mut storage);
        store.save(&draft("https://f/t/1", "RTX 3070", 350.0)).unwrap();
        assert_eq!(store.clear_all().unwrap(), 1);
        assert!(!store.exists("https://f/t/1").unwrap());
    }
}
