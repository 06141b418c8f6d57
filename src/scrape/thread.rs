//! Single-thread processing
//!
//! Visits one forum thread, reads the first post and turns it into listing
//! drafts. Navigating back to the listing page is the controller's job.

use crate::driver::{DriverError, PageDriver, PageQuery};
use crate::extract::{
    detect_brand, extract_all_prices, extract_gpu_from_title, extract_location, extract_pairs,
    ModelPrice,
};
use crate::model::{Listing, ThreadDescriptor};
use crate::scrape::{ScrapeSession, SiteProfile};
use chrono::Utc;
use thiserror::Error;

/// A post text longer than this is taken as the body on its own
const MIN_BODY_CHARS: usize = 50;

/// Errors from processing one thread; none of them end the run
#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("No GPU model or price found")]
    NoData,
}

/// Turns a thread into listing drafts
pub struct ThreadProcessor<'a> {
    profile: &'a SiteProfile,
}

impl<'a> ThreadProcessor<'a> {
    pub fn new(profile: &'a SiteProfile) -> Self {
        Self { profile }
    }

    /// Processes one thread
    ///
    /// # Arguments
    ///
    /// * `driver` - The page driver; left on the thread page afterwards
    /// * `session` - Run state issuing draft ids
    /// * `thread` - The thread to visit
    ///
    /// # Returns
    ///
    /// One draft per model/price pair found in the title and first post.
    /// [`ThreadError::NoData`] when nothing usable was found.
    pub async fn process<D>(
        &self,
        driver: &mut D,
        session: &mut ScrapeSession,
        thread: &ThreadDescriptor,
    ) -> Result<Vec<Listing>, ThreadError>
    where
        D: PageDriver + ?Sized,
    {
        driver
            .navigate(&thread.url, self.profile.navigation_timeout)
            .await?;

        let container = self.profile.post_selectors.join(", ");
        if let Err(e) = driver
            .wait_for_selector(&container, self.profile.selector_timeout)
            .await
        {
            tracing::debug!("Post container not found on {}: {}", thread.url, e);
        }

        let texts = driver
            .evaluate(&PageQuery::SelectorTexts(self.profile.post_selectors.clone()))
            .await?
            .into_texts()?;
        let body = select_body(&texts);

        let pairs = extract_from_thread(&thread.title, &body);
        if pairs.is_empty() {
            return Err(ThreadError::NoData);
        }

        let location = thread
            .location
            .clone()
            .or_else(|| extract_location(&format!("{}\n{}", thread.title, body)));
        let scraped_at = Utc::now();

        let drafts = pairs
            .into_iter()
            .map(|pair| Listing {
                id: session.next_draft_id(&thread.url),
                brand: detect_brand(&pair.model),
                model: pair.model,
                price: pair.price.price,
                currency: pair.price.currency,
                ah_price: pair.price.ah_price,
                ok_price: pair.price.ok_price,
                title: thread.title.clone(),
                url: thread.url.clone(),
                author: thread.author.clone(),
                location: location.clone(),
                scraped_at,
            })
            .collect();

        Ok(drafts)
    }
}

/// Picks the post body from the per-selector texts
///
/// The first text longer than 50 characters wins; otherwise every non-empty
/// text is joined.
fn select_body(texts: &[String]) -> String {
    if let Some(body) = texts
        .iter()
        .find(|text| text.trim().chars().count() > MIN_BODY_CHARS)
    {
        return body.trim().to_string();
    }

    texts
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts model/price pairs from a thread's title and body
///
/// Falls back to a single title model with the first price found anywhere.
fn extract_from_thread(title: &str, body: &str) -> Vec<ModelPrice> {
    let text = format!("{}\n{}", title, body);

    let pairs = extract_pairs(&text);
    if !pairs.is_empty() {
        return pairs;
    }

    let model = extract_gpu_from_title(title);
    let price = extract_all_prices(&text).into_iter().next();
    match (model, price) {
        (Some(model), Some(price)) => vec![ModelPrice { model, price }],
        _ => Vec::new(),
    }
}
