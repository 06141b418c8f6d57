//! End-to-end scrape tests

use gpu_scout::config::{
    Config, ForumConfig, LoginConfig, OutputConfig, ScraperConfig, UserAgentConfig,
};
use gpu_scout::driver::HttpPageDriver;
use gpu_scout::model::{AlertType, Currency};
use gpu_scout::output::{format_markdown_summary, generate_summary};
use gpu_scout::pipeline::{Pipeline, PipelineReport};
use gpu_scout::scrape::{
    PaginationController, ProgressReporter, ScrapeOptions, ScrapeResult, SiteProfile,
};
use gpu_scout::storage::{ListingFilter, ListingSort, ListingStore, SqliteStorage};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PAGE: &str = r#"<html><body>
<table class="forumline">
  <tr><th>Teemad</th><th>Autor</th></tr>
  <tr><td><a class="topictitle" href="viewtopic.php?t=1">[Müük] RTX 3070 8GB</a></td>
      <td><span class="name">mari</span></td></tr>
  <tr><td><a class="topictitle" href="viewtopic.php?t=2">[Müük] Kõlarid</a></td>
      <td><span class="name">jaan</span></td></tr>
  <tr><td><a class="topictitle" href="viewtopic.php?t=3">[Ost] Otsin RX 6800</a></td>
      <td><span class="name">peeter</span></td></tr>
</table>
</body></html>"#;

const EMPTY_LISTING_PAGE: &str = r#"<html><body>
<table class="forumline">
  <tr><th>Teemad</th><th>Autor</th></tr>
</table>
</body></html>"#;

const GPU_POST: &str = r#"<html><body>
<table><tr><td class="postbody">Müüa RTX 3070, vähe kasutatud, karp ja arve alles. Hind 350€, Tallinn</td></tr></table>
</body></html>"#;

const SPEAKER_POST: &str = r#"<html><body>
<table><tr><td class="postbody">Müüa korralikud kõlarid koos kaablitega, kõik töötab nagu peab. Hind 40€</td></tr></table>
</body></html>"#;

/// Creates a test configuration pointing at the mock forum
fn create_test_config(base_url: &str, db_path: &Path, max_pages: u32) -> Config {
    Config {
        scraper: ScraperConfig {
            max_pages,
            navigation_timeout_secs: 5,
            selector_timeout_secs: 1,
            ..ScraperConfig::default()
        },
        forum: ForumConfig::with_defaults(&format!("{}/viewforum.php?f=3", base_url), "Müük"),
        user_agent: UserAgentConfig {
            name: "TestScout".to_string(),
            version: "1.0.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.display().to_string(),
            summary_path: "./test_report.md".to_string(),
        },
        login: None,
    }
}

async fn serve_html(server: &MockServer, at: &str, key: &str, value: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .and(query_param(key, value))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Mounts a forum with one listing page of three threads and an empty second page
async fn mount_forum(server: &MockServer) {
    serve_html(server, "/viewforum.php", "start", "0", LISTING_PAGE).await;
    serve_html(server, "/viewforum.php", "start", "25", EMPTY_LISTING_PAGE).await;
    serve_html(server, "/viewtopic.php", "t", "1", GPU_POST).await;
    serve_html(server, "/viewtopic.php", "t", "2", SPEAKER_POST).await;
}

/// Runs one scrape with the HTTP driver into the given storage
async fn run_scrape(
    config: &Config,
    storage: SqliteStorage,
) -> (ScrapeResult, SqliteStorage, PipelineReport) {
    let profile = SiteProfile::from_config(config).unwrap();
    let options = ScrapeOptions::from_config(&config.scraper);
    let mut driver = HttpPageDriver::from_config(config).unwrap();
    let mut pipeline = Pipeline::new(storage);

    let result = PaginationController::new(&profile, options)
        .run(&mut driver, &mut pipeline)
        .await;

    let (storage, report) = pipeline.into_parts();
    (result, storage, report)
}

#[tokio::test]
async fn test_full_scrape_persists_listings() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config = create_test_config(&server.uri(), &db_path, 3);
    let storage = SqliteStorage::new(&db_path).unwrap();

    let (result, storage, report) = run_scrape(&config, storage).await;

    assert!(result.success, "scrape failed: {:?}", result.error);
    assert_eq!(result.error, None);
    assert_eq!(result.total_listings, 1);
    assert_eq!(result.processed_threads, 2);
    // Page 2 loads but holds no threads, which ends the run
    assert_eq!(result.processed_pages, 2);

    let listing = &result.data[0];
    assert_eq!(listing.model, "RTX 3070");
    assert_eq!(listing.price, 350.0);
    assert_eq!(listing.currency, Currency::Euro);
    assert_eq!(listing.author, "mari");
    assert_eq!(listing.url, format!("{}/viewtopic.php?t=1", server.uri()));

    assert_eq!(report.saved, 1);
    assert_eq!(report.duplicates, 0);
    assert!(report.errors.is_empty());

    let stored = storage.all_listings().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, listing.url);
    assert_eq!(stored[0].draft_id, listing.id);

    // The thread in another category is never opened
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.iter().any(|r| r.url.query() == Some("t=3")));
}

#[tokio::test]
async fn test_second_run_only_finds_duplicates() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config = create_test_config(&server.uri(), &db_path, 1);

    let (first, storage, first_report) =
        run_scrape(&config, SqliteStorage::new(&db_path).unwrap()).await;
    assert!(first.success);
    assert_eq!(first_report.saved, 1);
    drop(storage);

    // Reopen the same file, as a second invocation would
    let (second, storage, second_report) =
        run_scrape(&config, SqliteStorage::new(&db_path).unwrap()).await;
    assert!(second.success);
    assert_eq!(second.total_listings, 1);
    assert_eq!(second_report.saved, 0);
    assert_eq!(second_report.duplicates, 1);
    assert_eq!(storage.count_listings().unwrap(), 1);
}

#[tokio::test]
async fn test_new_listing_triggers_alert() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config = create_test_config(&server.uri(), &db_path, 1);

    let mut storage = SqliteStorage::new(&db_path).unwrap();
    storage
        .insert_alert("user-1", "rtx 3070", Currency::Euro, AlertType::Below, 400.0)
        .unwrap();
    storage
        .insert_alert("user-2", "RTX 3070", Currency::Euro, AlertType::Above, 500.0)
        .unwrap();

    let (result, _storage, report) = run_scrape(&config, storage).await;

    assert!(result.success);
    assert_eq!(report.triggered.len(), 1);
    assert_eq!(report.triggered[0].alert.user_id, "user-1");
    assert_eq!(report.triggered[0].listing.price, 350.0);
}

#[tokio::test]
async fn test_failed_login_returns_structured_failure() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    Mock::given(method("GET"))
        .and(path("/login.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form action="/login.php" method="post">
                <input type="text" name="username">
                <input type="password" name="password">
                <input type="submit" name="login" value="Login">
            </form>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Vale parool</p>"))
        .mount(&server)
        .await;

    std::env::set_var("GPU_SCOUT_IT_WRONG_PASSWORD", "wrong");
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let mut config = create_test_config(&server.uri(), &db_path, 1);
    config.login = Some(LoginConfig {
        url: format!("{}/login.php", server.uri()),
        username_field: "input[name=username]".to_string(),
        password_field: "input[name=password]".to_string(),
        submit: "input[name=login]".to_string(),
        username: "scout".to_string(),
        password_env: "GPU_SCOUT_IT_WRONG_PASSWORD".to_string(),
        success_selector: "a.logout".to_string(),
    });

    let (result, storage, _) = run_scrape(&config, SqliteStorage::new(&db_path).unwrap()).await;

    assert!(!result.success);
    assert_eq!(result.partial_results, Some(true));
    assert!(result.error.unwrap().contains("Login failed"));
    assert!(result.data.is_empty());
    assert_eq!(storage.count_listings().unwrap(), 0);

    // No listing page is requested after a failed login
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.iter().any(|r| r.url.path() == "/viewforum.php"));
}

#[tokio::test]
async fn test_progress_stream_and_report() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config = create_test_config(&server.uri(), &db_path, 1);

    let profile = SiteProfile::from_config(&config).unwrap();
    let mut driver = HttpPageDriver::from_config(&config).unwrap();
    let mut pipeline = Pipeline::new(SqliteStorage::new(&db_path).unwrap());
    let (reporter, mut stream) = ProgressReporter::channel();

    let result = {
        let options = ScrapeOptions::from_config(&config.scraper);
        let controller = PaginationController::new(&profile, options).with_progress(reporter);
        controller.run(&mut driver, &mut pipeline).await
    };
    assert!(result.success);

    let mut messages = Vec::new();
    while let Some(message) = stream.next().await {
        messages.push(message);
    }
    assert_eq!(messages.first().map(String::as_str), Some("Logging in"));
    assert!(messages.iter().any(|m| m.starts_with("Scrape finished")));

    let (storage, _) = pipeline.into_parts();
    let newest = storage
        .query_listings(&ListingFilter::default(), ListingSort::Newest, Some(5))
        .unwrap();
    assert_eq!(newest.len(), 1);

    let markdown = format_markdown_summary(&generate_summary(&storage).unwrap());
    assert!(markdown.contains("| RTX 3070 | NVIDIA | € | 1 |"));
    assert!(markdown.contains("[\\[Müük\\] RTX 3070 8GB]"));
}
