//! Domain types
//!
//! - `ThreadDescriptor`: a thread row found on a listing page
//! - `Listing` / `ListingRecord`: a scraped GPU offer, as a draft and as a stored row
//! - `PriceAlert` / `TriggeredAlert`: standing watch criteria and their matches

mod alert;
mod listing;

pub use alert::{AlertType, PriceAlert, TriggeredAlert};
pub use listing::{Brand, Currency, Listing, ListingRecord, ThreadDescriptor};
