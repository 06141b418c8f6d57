//! Integration tests for GPU Scout
//!
//! These tests run complete scrapes with the HTTP page driver against a
//! wiremock forum and persist into a SQLite file in a temp directory.

mod scrape_tests;
