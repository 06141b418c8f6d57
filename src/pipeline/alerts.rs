//! Price alert matching

use crate::extract::normalize_model;
use crate::model::{AlertType, ListingRecord, PriceAlert, TriggeredAlert};

/// Relative distance from the target accepted by an `exact` alert
pub const EXACT_TOLERANCE: f64 = 0.05;

/// Matches newly saved listings against standing alerts
///
/// Every (listing, alert) pair is checked on its own, so one listing can
/// trigger several alerts and one alert can fire for several listings.
pub fn match_alerts(new_listings: &[ListingRecord], alerts: &[PriceAlert]) -> Vec<TriggeredAlert> {
    new_listings
        .iter()
        .flat_map(|listing| {
            alerts
                .iter()
                .filter(|alert| alert_matches(alert, listing))
                .map(|alert| TriggeredAlert {
                    alert: alert.clone(),
                    listing: listing.clone(),
                })
        })
        .collect()
}

/// Checks one alert against one listing
pub fn alert_matches(alert: &PriceAlert, listing: &ListingRecord) -> bool {
    let wanted = normalize_model(&alert.gpu_model);
    if wanted.is_empty() || !listing.model.to_uppercase().contains(&wanted) {
        return false;
    }

    if alert.currency != listing.currency {
        return false;
    }

    match alert.alert_type {
        AlertType::Below => listing.price <= alert.target_price,
        AlertType::Above => listing.price >= alert.target_price,
        AlertType::Exact => {
            (listing.price - alert.target_price).abs() <= alert.target_price * EXACT_TOLERANCE
        }
    }
}
