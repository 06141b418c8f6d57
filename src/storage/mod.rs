//! Storage module for persisting scraped listings
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent listing inserts keyed by thread url
//! - Listing queries and per-model statistics
//! - Duplicate maintenance for older databases
//! - Price alerts and run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{AlertSource, ListingStore, StorageError, StorageResult};

use crate::model::{Brand, Currency, ListingRecord};
use crate::GpuScoutError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(GpuScoutError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, GpuScoutError> {
    SqliteStorage::new(path)
}

/// Listing query filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    /// Model fragment, matched case-insensitively after normalization
    pub model: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub currency: Option<Currency>,
}

/// Sort order for listing queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingSort {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    Model,
}

impl ListingSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Some(Self::Newest),
            "oldest" => Some(Self::Oldest),
            "price-asc" | "price" => Some(Self::PriceAsc),
            "price-desc" => Some(Self::PriceDesc),
            "model" => Some(Self::Model),
            _ => None,
        }
    }

    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => "scraped_at DESC, id DESC",
            Self::Oldest => "scraped_at ASC, id ASC",
            Self::PriceAsc => "price ASC, id ASC",
            Self::PriceDesc => "price DESC, id ASC",
            Self::Model => "model ASC, price ASC",
        }
    }
}

/// Aggregate prices of one model in one currency
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub model: String,
    pub brand: Brand,
    pub currency: Currency,
    pub count: u64,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub latest_at: DateTime<Utc>,
}

/// Listings sharing one url, earliest first
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub url: String,
    pub records: Vec<ListingRecord>,
}

/// Represents a scrape run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages: u32,
    pub threads: u32,
    pub listings: u32,
    pub saved: u32,
    pub error: Option<String>,
}

/// Counters written when a run finishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub pages: u32,
    pub threads: u32,
    pub listings: u32,
    pub saved: u32,
    pub error: Option<String>,
}

/// Status of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
