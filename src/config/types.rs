use serde::Deserialize;

/// Main configuration structure for GPU Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub forum: ForumConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub login: Option<LoginConfig>,
}

/// Scrape run behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Maximum number of listing pages visited per run
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum number of new threads processed per listing page
    #[serde(
        rename = "max-threads-per-page",
        default = "default_max_threads_per_page"
    )]
    pub max_threads_per_page: u32,

    /// Run the page driver without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Offset stride between listing pages
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Timeout for each navigation (seconds)
    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout"
    )]
    pub navigation_timeout_secs: u64,

    /// Timeout for each selector wait (seconds)
    #[serde(rename = "selector-timeout-secs", default = "default_selector_timeout")]
    pub selector_timeout_secs: u64,
}

/// Layout of the forum section being watched
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    /// First listing page of the sale section
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Query parameter carrying the row offset
    #[serde(rename = "offset-param", default = "default_offset_param")]
    pub offset_param: String,

    /// Category tag a thread must carry to be processed
    pub category: String,

    /// Leading rows of the thread table that are column headers
    #[serde(rename = "header-rows", default = "default_header_rows")]
    pub header_rows: usize,

    /// Title fragments marking announcement/sticky rows
    #[serde(rename = "announcement-markers", default)]
    pub announcement_markers: Vec<String>,

    #[serde(rename = "row-selector", default = "default_row_selector")]
    pub row_selector: String,

    #[serde(rename = "title-selector", default = "default_title_selector")]
    pub title_selector: String,

    #[serde(rename = "author-selector", default = "default_author_selector")]
    pub author_selector: String,

    /// Element holding the category tag; the leading `[tag]` of the title is used when unset
    #[serde(rename = "category-selector", default)]
    pub category_selector: Option<String>,

    #[serde(rename = "location-selector", default)]
    pub location_selector: Option<String>,

    /// Post body selectors, in priority order
    #[serde(rename = "post-selectors", default = "default_post_selectors")]
    pub post_selectors: Vec<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    pub name: String,
    pub version: String,

    /// URL with information about the scraper
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown report file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// Forum login form
///
/// The password is never stored in the config file; it is read from the
/// environment variable named by `password-env`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    pub url: String,

    #[serde(rename = "username-field")]
    pub username_field: String,

    #[serde(rename = "password-field")]
    pub password_field: String,

    /// Submit button selector
    pub submit: String,

    pub username: String,

    #[serde(rename = "password-env")]
    pub password_env: String,

    /// Element present only when logged in
    #[serde(rename = "success-selector")]
    pub success_selector: String,
}

fn default_max_pages() -> u32 {
    5
}

fn default_max_threads_per_page() -> u32 {
    25
}

fn default_headless() -> bool {
    true
}

fn default_page_size() -> u32 {
    25
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_selector_timeout() -> u64 {
    10
}

fn default_offset_param() -> String {
    "start".to_string()
}

fn default_header_rows() -> usize {
    1
}

fn default_row_selector() -> String {
    "table.forumline tr".to_string()
}

fn default_title_selector() -> String {
    "a.topictitle".to_string()
}

fn default_author_selector() -> String {
    "span.name".to_string()
}

fn default_post_selectors() -> Vec<String> {
    ["td.postbody", "span.postbody", "div.postbody", "div.content"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_threads_per_page: default_max_threads_per_page(),
            headless: default_headless(),
            page_size: default_page_size(),
            navigation_timeout_secs: default_navigation_timeout(),
            selector_timeout_secs: default_selector_timeout(),
        }
    }
}

impl ForumConfig {
    /// Forum layout with default selectors for the given listing url and category
    pub fn with_defaults(listing_url: &str, category: &str) -> Self {
        Self {
            listing_url: listing_url.to_string(),
            offset_param: default_offset_param(),
            category: category.to_string(),
            header_rows: default_header_rows(),
            announcement_markers: Vec::new(),
            row_selector: default_row_selector(),
            title_selector: default_title_selector(),
            author_selector: default_author_selector(),
            category_selector: None,
            location_selector: None,
            post_selectors: default_post_selectors(),
        }
    }
}
