//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::extract::normalize_model;
use crate::model::{AlertType, Brand, Currency, Listing, ListingRecord, PriceAlert};
use crate::storage::schema::{create_unique_url_index, initialize_schema};
use crate::storage::traits::{AlertSource, ListingStore, StorageError, StorageResult};
use crate::storage::{
    DuplicateGroup, ListingFilter, ListingSort, ModelStats, RunRecord, RunStatus, RunSummary,
};
use crate::GpuScoutError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const LISTING_COLUMNS: &str = "id, draft_id, model, brand, price, currency, ah_price, ok_price, \
                               title, url, author, location, scraped_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(GpuScoutError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, GpuScoutError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::from_connection(conn)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, GpuScoutError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Drops the unique url index, leaving the database as older versions created it
    #[cfg(test)]
    pub(crate) fn drop_unique_url_index(&mut self) -> Result<(), GpuScoutError> {
        self.conn
            .execute_batch("DROP INDEX IF EXISTS idx_listings_url_unique")?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> Result<Self, GpuScoutError> {
        initialize_schema(&conn)?;

        if !create_unique_url_index(&conn)? {
            tracing::warn!(
                "Database holds duplicate listing urls; run remove-duplicates to restore the unique index"
            );
        }

        Ok(Self { conn })
    }

    // ===== Price Alerts =====

    /// Adds a standing price alert
    pub fn insert_alert(
        &mut self,
        user_id: &str,
        gpu_model: &str,
        currency: Currency,
        alert_type: AlertType,
        target_price: f64,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO price_alerts (user_id, gpu_model, currency, alert_type, target_price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                normalize_model(gpu_model),
                currency.as_str(),
                alert_type.to_db_string(),
                target_price,
                format_timestamp(&Utc::now()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Removes a price alert, returning false if it did not exist
    pub fn delete_alert(&mut self, alert_id: i64) -> StorageResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM price_alerts WHERE id = ?1", params![alert_id])?;
        Ok(deleted > 0)
    }

    fn listings_where(&self, clause: &str, values: Vec<Value>) -> StorageResult<Vec<ListingRecord>> {
        let sql = format!("SELECT {} FROM listings {}", LISTING_COLUMNS, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), listing_from_row)?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        Ok(listings)
    }
}

impl ListingStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages = ?3, threads = ?4,
             listings = ?5, saved = ?6, error = ?7 WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                summary.pages,
                summary.threads,
                summary.listings,
                summary.saved,
                summary.error,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status, pages, threads, listings, saved, error
             FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                    pages: row.get(5)?,
                    threads: row.get(6)?,
                    listings: row.get(7)?,
                    saved: row.get(8)?,
                    error: row.get(9)?,
                })
            })
            .optional()?;

        Ok(run)
    }

    // ===== Listings =====

    fn exists_by_url(&self, url: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM listings WHERE url = ?1 LIMIT 1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_listing(&mut self, listing: &Listing) -> StorageResult<Option<ListingRecord>> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO listings
             (draft_id, model, brand, price, currency, ah_price, ok_price, title, url, author, location, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                listing.id,
                listing.model,
                listing.brand.as_str(),
                listing.price,
                listing.currency.as_str(),
                listing.ah_price,
                listing.ok_price,
                listing.title,
                listing.url,
                listing.author,
                listing.location,
                format_timestamp(&listing.scraped_at),
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }

        Ok(Some(ListingRecord {
            id: self.conn.last_insert_rowid(),
            draft_id: listing.id.clone(),
            model: listing.model.clone(),
            brand: listing.brand,
            price: listing.price,
            currency: listing.currency,
            ah_price: listing.ah_price,
            ok_price: listing.ok_price,
            title: listing.title.clone(),
            url: listing.url.clone(),
            author: listing.author.clone(),
            location: listing.location.clone(),
            scraped_at: listing.scraped_at,
        }))
    }

    fn delete_listings_by_ids(&mut self, ids: &[i64]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM listings WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn query_listings(
        &self,
        filter: &ListingFilter,
        sort: ListingSort,
        limit: Option<usize>,
    ) -> StorageResult<Vec<ListingRecord>> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(model) = filter.model.as_deref().filter(|m| !m.trim().is_empty()) {
            conditions.push("UPPER(model) LIKE ?");
            values.push(Value::Text(format!("%{}%", normalize_model(model))));
        }
        if let Some(min) = filter.min_price {
            conditions.push("price >= ?");
            values.push(Value::Real(min));
        }
        if let Some(max) = filter.max_price {
            conditions.push("price <= ?");
            values.push(Value::Real(max));
        }
        if let Some(currency) = filter.currency {
            conditions.push("currency = ?");
            values.push(Value::Text(currency.as_str().to_string()));
        }

        let mut clause = String::new();
        if !conditions.is_empty() {
            clause.push_str("WHERE ");
            clause.push_str(&conditions.join(" AND "));
        }
        clause.push_str(" ORDER BY ");
        clause.push_str(sort.order_by());
        if let Some(limit) = limit {
            clause.push_str(&format!(" LIMIT {}", limit));
        }

        self.listings_where(&clause, values)
    }

    fn aggregate_stats_by_model(&self) -> StorageResult<Vec<ModelStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT model, brand, currency, COUNT(*), MIN(price), MAX(price), AVG(price), MAX(scraped_at)
             FROM listings
             GROUP BY model, brand, currency
             ORDER BY COUNT(*) DESC, model ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ModelStats {
                model: row.get(0)?,
                brand: Brand::from_db_string(&row.get::<_, String>(1)?),
                currency: currency_from_row(row, 2)?,
                count: row.get::<_, i64>(3)? as u64,
                min_price: row.get(4)?,
                max_price: row.get(5)?,
                avg_price: row.get(6)?,
                latest_at: timestamp_from_row(row, 7)?,
            })
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }

    fn all_listings(&self) -> StorageResult<Vec<ListingRecord>> {
        self.listings_where("ORDER BY scraped_at ASC, id ASC", Vec::new())
    }

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn clear_listings(&mut self) -> StorageResult<usize> {
        let deleted = self.conn.execute("DELETE FROM listings", [])?;
        Ok(deleted)
    }

    // ===== Maintenance =====

    fn find_duplicate_url_groups(&self) -> StorageResult<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM listings GROUP BY url HAVING COUNT(*) > 1 ORDER BY url",
        )?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut groups = Vec::with_capacity(urls.len());
        for url in urls {
            let records = self.listings_where(
                "WHERE url = ? ORDER BY scraped_at ASC, id ASC",
                vec![Value::Text(url.clone())],
            )?;
            groups.push(DuplicateGroup { url, records });
        }
        Ok(groups)
    }

    fn refresh_price_history(&mut self) -> StorageResult<usize> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let written = self.conn.execute(
            "INSERT INTO price_history (model, currency, day, listing_count, min_price, max_price, avg_price)
             SELECT model, currency, ?1, COUNT(*), MIN(price), MAX(price), AVG(price)
             FROM listings WHERE true GROUP BY model, currency
             ON CONFLICT(model, currency, day) DO UPDATE SET
                listing_count = excluded.listing_count,
                min_price = excluded.min_price,
                max_price = excluded.max_price,
                avg_price = excluded.avg_price",
            params![day],
        )?;
        Ok(written)
    }

    fn ensure_unique_url_index(&mut self) -> StorageResult<bool> {
        Ok(create_unique_url_index(&self.conn)?)
    }
}

impl AlertSource for SqliteStorage {
    fn list_standing_alerts(&self) -> StorageResult<Vec<PriceAlert>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, gpu_model, currency, alert_type, target_price
             FROM price_alerts ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            let alert_type: String = row.get(4)?;
            Ok(PriceAlert {
                id: row.get(0)?,
                user_id: row.get(1)?,
                gpu_model: row.get(2)?,
                currency: currency_from_row(row, 3)?,
                alert_type: AlertType::from_db_string(&alert_type)
                    .ok_or_else(|| conversion_error(4, format!("unknown alert type '{}'", alert_type)))?,
                target_price: row.get(5)?,
            })
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }
}

/// Fixed-width UTC timestamp that sorts correctly as text
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StorageError::Serialization(message)),
    )
}

fn timestamp_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

fn currency_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Currency> {
    let raw: String = row.get(idx)?;
    Currency::parse(&raw).ok_or_else(|| conversion_error(idx, format!("unknown currency '{}'", raw)))
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    Ok(ListingRecord {
        id: row.get(0)?,
        draft_id: row.get(1)?,
        model: row.get(2)?,
        brand: Brand::from_db_string(&row.get::<_, String>(3)?),
        price: row.get(4)?,
        currency: currency_from_row(row, 5)?,
        ah_price: row.get(6)?,
        ok_price: row.get(7)?,
        title: row.get(8)?,
        url: row.get(9)?,
        author: row.get(10)?,
        location: row.get(11)?,
        scraped_at: timestamp_from_row(row, 12)?,
    })
}
