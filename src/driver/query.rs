//! In-page query descriptors
//!
//! Queries are plain data handed to [`PageDriver::evaluate`]. The driver only
//! collects raw rows or texts from the DOM; row filtering lives here so it can
//! be tested without a browser.
//!
//! [`PageDriver::evaluate`]: crate::driver::PageDriver::evaluate

use crate::config::ForumConfig;
use crate::driver::{DriverError, DriverResult};
use crate::model::ThreadDescriptor;
use std::collections::HashSet;

/// A query evaluated against the page currently loaded in the driver
#[derive(Debug, Clone, PartialEq)]
pub enum PageQuery {
    /// Thread rows of a listing page
    ThreadRows(ThreadRowQuery),
    /// Text content of each selector, in the given order
    SelectorTexts(Vec<String>),
}

/// Structured result of a [`PageQuery`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Threads(Vec<ThreadDescriptor>),
    /// One entry per requested selector; empty when nothing matched
    Texts(Vec<String>),
}

impl QueryOutput {
    pub fn into_threads(self) -> DriverResult<Vec<ThreadDescriptor>> {
        match self {
            Self::Threads(threads) => Ok(threads),
            Self::Texts(_) => Err(DriverError::Evaluation(
                "expected thread rows, got selector texts".to_string(),
            )),
        }
    }

    pub fn into_texts(self) -> DriverResult<Vec<String>> {
        match self {
            Self::Texts(texts) => Ok(texts),
            Self::Threads(_) => Err(DriverError::Evaluation(
                "expected selector texts, got thread rows".to_string(),
            )),
        }
    }
}

/// Row query for a listing page
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRowQuery {
    pub row_selector: String,
    pub title_selector: String,
    pub author_selector: String,
    pub category_selector: Option<String>,
    pub location_selector: Option<String>,
    /// Leading rows that are column headers
    pub header_rows: usize,
    /// Case-insensitive title fragments marking announcement rows
    pub announcement_markers: Vec<String>,
    /// Category a row must carry, matched case-insensitively
    pub category: String,
}

/// A row as read from the DOM, before filtering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawThreadRow {
    pub title: String,
    /// Absolute thread URL
    pub url: String,
    pub author: String,
    pub category: Option<String>,
    pub location: Option<String>,
}

impl ThreadRowQuery {
    pub fn from_forum_config(config: &ForumConfig) -> Self {
        Self {
            row_selector: config.row_selector.clone(),
            title_selector: config.title_selector.clone(),
            author_selector: config.author_selector.clone(),
            category_selector: config.category_selector.clone(),
            location_selector: config.location_selector.clone(),
            header_rows: config.header_rows,
            announcement_markers: config.announcement_markers.clone(),
            category: config.category.clone(),
        }
    }

    /// Turns raw rows into thread descriptors
    ///
    /// `rows` holds one entry per element matched by `row_selector`, `None`
    /// for rows without a title link. Header rows are skipped by position,
    /// then announcement rows and rows outside the target category are
    /// dropped. Repeated urls keep their first row.
    pub fn select<I>(&self, rows: I) -> Vec<ThreadDescriptor>
    where
        I: IntoIterator<Item = Option<RawThreadRow>>,
    {
        let target = self.category.to_lowercase();
        let markers: Vec<String> = self
            .announcement_markers
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        let mut seen = HashSet::new();

        rows.into_iter()
            .skip(self.header_rows)
            .flatten()
            .filter(|row| !row.url.is_empty() && !row.title.trim().is_empty())
            .filter(|row| {
                let title = row.title.to_lowercase();
                !markers.iter().any(|m| title.contains(m.as_str()))
            })
            .filter_map(|row| {
                let category = row
                    .category
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .or_else(|| title_tag(&row.title))?;
                if !category.to_lowercase().contains(&target) {
                    return None;
                }
                Some(ThreadDescriptor {
                    title: row.title.trim().to_string(),
                    url: row.url,
                    author: row.author.trim().to_string(),
                    location: row
                        .location
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty()),
                    category: category.trim().to_string(),
                })
            })
            .filter(|thread| seen.insert(thread.url.clone()))
            .collect()
    }
}

/// Reads a leading `[tag]` from a thread title
fn title_tag(title: &str) -> Option<String> {
    let rest = title.trim_start().strip_prefix('[')?;
    let end = rest.find(']')?;
    Some(rest[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> ThreadRowQuery {
        let mut forum = ForumConfig::with_defaults("https://forum.example.com/viewforum.php?f=3", "müük");
        forum.announcement_markers = vec!["Teadaanne".to_string()];
        ThreadRowQuery::from_forum_config(&forum)
    }

    fn row(title: &str, url: &str) -> Option<RawThreadRow> {
        Some(RawThreadRow {
            title: title.to_string(),
            url: url.to_string(),
            author: " seller ".to_string(),
            category: None,
            location: None,
        })
    }

    #[test]
    fn test_header_rows_skipped() {
        let rows = vec![
            row("[Müük] header lookalike", "https://f/h"),
            row("[Müük] RTX 3070", "https://f/1"),
        ];
        let threads = query().select(rows);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].url, "https://f/1");
        assert_eq!(threads[0].author, "seller");
        assert_eq!(threads[0].category, "Müük");
    }

    #[test]
    fn test_announcements_and_other_categories_dropped() {
        let rows = vec![
            None,
            row("[Müük] TEADAANNE: reeglid", "https://f/rules"),
            row("[Ost] Otsin RTX 3080", "https://f/2"),
            row("Pealkiri ilma sildita", "https://f/3"),
            row("[Müük] RX 6800", "https://f/4"),
        ];
        let threads = query().select(rows);
        let urls: Vec<&str> = threads.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["https://f/4"]);
    }

    #[test]
    fn test_category_from_column_preferred() {
        let rows = vec![
            None,
            Some(RawThreadRow {
                title: "RTX 4080".to_string(),
                url: "https://f/5".to_string(),
                author: "a".to_string(),
                category: Some("Müük / Videokaardid".to_string()),
                location: Some(" Tartu ".to_string()),
            }),
        ];
        let threads = query().select(rows);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].location.as_deref(), Some("Tartu"));
    }

    #[test]
    fn test_rows_without_link_and_repeats() {
        let rows = vec![
            None,
            None,
            row("[Müük] RTX 3060", "https://f/6"),
            row("[Müük] RTX 3060 (last page link)", "https://f/6"),
        ];
        let threads = query().select(rows);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].title, "[Müük] RTX 3060");
    }

    #[test]
    fn test_output_conversion() {
        let output = QueryOutput::Texts(vec!["a".to_string()]);
        assert!(output.clone().into_threads().is_err());
        assert_eq!(output.into_texts().unwrap(), vec!["a".to_string()]);
    }
}
