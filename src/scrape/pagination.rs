//! Pagination controller
//!
//! Owns a scrape run from login to driver shutdown. Listing pages are visited
//! in offset order; every new thread on a page is handed to the
//! [`ThreadProcessor`] and the listing page is reloaded afterwards so the
//! next thread starts from a known place.

use crate::driver::{PageDriver, PageQuery};
use crate::scrape::{
    BatchSink, ProgressReporter, ScrapeOptions, ScrapeResult, ScrapeSession, ScrapeState,
    SiteProfile, StopSignal, ThreadError, ThreadProcessor,
};
use crate::{GpuScoutError, Result};

/// How a run that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Completed,
    Stopped,
}

/// Drives a scrape run over the listing pages of a forum
pub struct PaginationController<'a> {
    profile: &'a SiteProfile,
    options: ScrapeOptions,
    reporter: ProgressReporter,
    stop: StopSignal,
}

impl<'a> PaginationController<'a> {
    pub fn new(profile: &'a SiteProfile, options: ScrapeOptions) -> Self {
        Self {
            profile,
            options,
            reporter: ProgressReporter::log_only(),
            stop: StopSignal::new(),
        }
    }

    /// Sends progress messages to the given reporter
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Ends the run early once the signal is raised
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Runs the scrape to completion
    ///
    /// Never returns an error: fatal failures are reported in the result,
    /// together with the drafts accumulated up to that point. The driver is
    /// closed before returning.
    ///
    /// # Arguments
    ///
    /// * `driver` - The page driver, borrowed for the whole run
    /// * `sink` - Receives each page's drafts once the page is done
    pub async fn run<D>(&self, driver: &mut D, sink: &mut dyn BatchSink) -> ScrapeResult
    where
        D: PageDriver + ?Sized,
    {
        let mut session = ScrapeSession::new();
        let outcome = self.run_inner(&mut *driver, sink, &mut session).await;

        if let Err(e) = driver.close().await {
            tracing::warn!("Failed to close page driver: {}", e);
        }

        match outcome {
            Ok(RunEnd::Completed) => {
                self.reporter.report(format!(
                    "Scrape finished: {} listings from {} threads on {} pages",
                    session.listings().len(),
                    session.processed_threads(),
                    session.processed_pages()
                ));
                session.into_result(None, false)
            }
            Ok(RunEnd::Stopped) => {
                self.reporter.report(format!(
                    "Scrape stopped: {} listings from {} threads so far",
                    session.listings().len(),
                    session.processed_threads()
                ));
                session.into_result(None, true)
            }
            Err(e) => {
                tracing::error!("Scrape failed in state {}: {}", session.state(), e);
                // Drafts from the interrupted page are still worth keeping
                self.flush_page_batch(&mut session, sink);
                session.fail();
                self.reporter.report(format!("Scrape failed: {}", e));
                session.into_result(Some(e.to_string()), true)
            }
        }
    }

    async fn run_inner<D>(
        &self,
        driver: &mut D,
        sink: &mut dyn BatchSink,
        session: &mut ScrapeSession,
    ) -> Result<RunEnd>
    where
        D: PageDriver + ?Sized,
    {
        self.reporter.report("Logging in");
        driver
            .login()
            .await
            .map_err(|e| GpuScoutError::LoginFailed(e.to_string()))?;

        let processor = ThreadProcessor::new(self.profile);
        let max_threads = self.options.max_threads_per_page as usize;
        let mut end = RunEnd::Completed;

        while session.page() <= self.options.max_pages {
            if self.stop.is_stopped() {
                end = RunEnd::Stopped;
                break;
            }

            session.transition(ScrapeState::LoadingPage)?;
            let page = session.page();
            let page_url = self.profile.listing_page_url(page);
            self.reporter.report(format!(
                "Loading listing page {} of {}",
                page, self.options.max_pages
            ));

            driver
                .navigate(&page_url, self.profile.navigation_timeout)
                .await?;
            session.set_listing_url(page_url.clone());
            session.page_loaded();

            session.transition(ScrapeState::EnumeratingThreads)?;
            if let Err(e) = driver
                .wait_for_selector(
                    &self.profile.thread_query.row_selector,
                    self.profile.selector_timeout,
                )
                .await
            {
                tracing::debug!("Thread rows not found on {}: {}", page_url, e);
            }

            let threads = driver
                .evaluate(&PageQuery::ThreadRows(self.profile.thread_query.clone()))
                .await?
                .into_threads()?;

            if threads.is_empty() {
                self.reporter
                    .report(format!("No threads on page {}, listing exhausted", page));
                break;
            }

            let found = threads.len();
            let pending: Vec<_> = threads
                .into_iter()
                .filter(|thread| !session.is_processed(&thread.url))
                .take(max_threads)
                .collect();
            self.reporter.report(format!(
                "Page {}: {} threads found, {} to process",
                page,
                found,
                pending.len()
            ));

            for (i, thread) in pending.iter().enumerate() {
                if self.stop.is_stopped() {
                    end = RunEnd::Stopped;
                    break;
                }

                session.transition(ScrapeState::ProcessingThread)?;
                self.reporter.report(format!(
                    "Processing thread {}/{}: {}",
                    i + 1,
                    pending.len(),
                    thread.title
                ));

                match processor.process(&mut *driver, session, thread).await {
                    Ok(drafts) => {
                        self.reporter.report(format!(
                            "Found {} listing(s) in \"{}\"",
                            drafts.len(),
                            thread.title
                        ));
                        session.push_listings(drafts);
                    }
                    Err(ThreadError::NoData) => {
                        self.reporter
                            .report(format!("No GPU listing in \"{}\"", thread.title));
                    }
                    Err(e) => {
                        tracing::warn!("Thread {} failed: {}", thread.url, e);
                        self.reporter
                            .report(format!("Skipping \"{}\": {}", thread.title, e));
                    }
                }
                session.mark_processed(&thread.url);

                session.transition(ScrapeState::ReturningToListing)?;
                let listing_url = session
                    .current_listing_url()
                    .unwrap_or(page_url.as_str())
                    .to_string();
                driver
                    .navigate(&listing_url, self.profile.navigation_timeout)
                    .await
                    .map_err(|e| {
                        tracing::error!("Could not return to listing page {}: {}", listing_url, e);
                        e
                    })?;
            }

            self.flush_page_batch(session, sink);

            if end == RunEnd::Stopped {
                break;
            }
            session.next_page();
        }

        session.transition(ScrapeState::Done)?;
        session.transition(ScrapeState::Succeeded)?;
        Ok(end)
    }

    /// Hands the drafts gathered since the last flush to the sink
    fn flush_page_batch(&self, session: &mut ScrapeSession, sink: &mut dyn BatchSink) {
        let batch = session.page_batch();
        if !batch.is_empty() {
            let outcome = sink.accept(session.page(), batch);
            self.reporter.report(format!(
                "Page {}: {} saved, {} duplicates, {} errors, {} alerts triggered",
                session.page(),
                outcome.saved,
                outcome.duplicates,
                outcome.errors,
                outcome.triggered
            ));
        }
        session.close_page_batch();
    }
}
