//! Statistics over stored listings
//!
//! This module provides functionality for extracting and displaying
//! market statistics from the storage layer.

use crate::model::{Brand, ListingRecord};
use crate::output::OutputResult;
use crate::storage::{ListingStore, ModelStats};
use std::collections::BTreeMap;

/// Market statistics summary
#[derive(Debug, Clone)]
pub struct MarketStatistics {
    pub total_listings: u64,

    /// Listing count per vendor
    pub by_brand: BTreeMap<String, u64>,

    /// Per model and currency, most listed first
    pub models: Vec<ModelStats>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The storage backend to query
///
/// # Returns
///
/// * `Ok(MarketStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(store: &dyn ListingStore) -> OutputResult<MarketStatistics> {
    let total_listings = store.count_listings()?;
    let models = store.aggregate_stats_by_model()?;

    let mut by_brand = BTreeMap::new();
    for stats in &models {
        *by_brand.entry(stats.brand.as_str().to_string()).or_insert(0) += stats.count;
    }

    Ok(MarketStatistics {
        total_listings,
        by_brand,
        models,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &MarketStatistics) {
    println!("=== GPU Market Statistics ===\n");

    println!("Overview:");
    println!("  Total listings: {}", stats.total_listings);
    println!("  Distinct models: {}", stats.models.len());
    println!();

    if !stats.by_brand.is_empty() {
        println!("Listings by Brand:");
        for (brand, count) in &stats.by_brand {
            let percentage = if stats.total_listings > 0 {
                (*count as f64 / stats.total_listings as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", brand, count, percentage);
        }
        println!();
    }

    if stats.models.is_empty() {
        println!("No listings stored yet.");
        return;
    }

    println!("Prices by Model:");
    println!(
        "  {:<16} {:>4} {:>5} {:>9} {:>9} {:>9}",
        "Model", "Cur", "Count", "Min", "Avg", "Max"
    );
    for model in &stats.models {
        println!(
            "  {:<16} {:>4} {:>5} {:>9.2} {:>9.2} {:>9.2}",
            model.model, model.currency, model.count, model.min_price, model.avg_price, model.max_price
        );
    }
}

/// Formats listings as an aligned text table
pub fn format_listing_table(listings: &[ListingRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>6}  {:<16} {:>9} {:>3}  {:<12} {:<14} {}\n",
        "ID", "Model", "Price", "Cur", "Seller", "Location", "URL"
    ));

    for listing in listings {
        out.push_str(&format!(
            "{:>6}  {:<16} {:>9.2} {:>3}  {:<12} {:<14} {}\n",
            listing.id,
            listing.model,
            listing.price,
            listing.currency,
            truncate(&listing.author, 12),
            listing.location.as_deref().unwrap_or("-"),
            listing.url
        ));
    }

    out
}

/// Shortens text to at most `max` characters
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}

impl MarketStatistics {
    /// Listing count for one vendor
    pub fn brand_count(&self, brand: Brand) -> u64 {
        self.by_brand.get(brand.as_str()).copied().unwrap_or(0)
    }
}
