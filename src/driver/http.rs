//! HTTP page driver
//!
//! Drives a server-rendered forum with a cookie-keeping HTTP client:
//! - navigation is a GET whose body becomes the current page
//! - queries are evaluated against the parsed HTML of the current page
//! - typing fills form fields, clicking follows links or submits the enclosing form
//!
//! Parsed documents are never held across an await point; each operation
//! reparses the stored HTML.

use crate::config::{Config, LoginConfig, UserAgentConfig};
use crate::driver::query::{PageQuery, QueryOutput, RawThreadRow, ThreadRowQuery};
use crate::driver::{with_timeout, DriverError, DriverResult, PageDriver};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with the configured user agent and a cookie store
///
/// The cookie store carries the forum session from login through the run.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL)
    let user_agent = format!("{}/{} (+{})", config.name, config.version, config.contact_url);

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// The page currently loaded in the driver
#[derive(Debug)]
struct LoadedPage {
    /// Final URL after redirects
    url: Url,
    html: String,
}

/// What a click resolves to
#[derive(Debug, PartialEq)]
enum ClickAction {
    Follow(Url),
    Submit {
        method: Method,
        action: Url,
        fields: Vec<(String, String)>,
    },
}

/// [`PageDriver`] over plain HTTP and static HTML
pub struct HttpPageDriver {
    client: Client,
    login: Option<LoginConfig>,
    login_timeout: Duration,
    page: Option<LoadedPage>,
    /// Values typed into form fields, keyed by field name
    typed: HashMap<String, String>,
    closed: bool,
}

impl HttpPageDriver {
    pub fn new(client: Client, login: Option<LoginConfig>, login_timeout: Duration) -> Self {
        Self {
            client,
            login,
            login_timeout,
            page: None,
            typed: HashMap::new(),
            closed: false,
        }
    }

    /// Builds a driver from the application configuration
    pub fn from_config(config: &Config) -> DriverResult<Self> {
        if !config.scraper.headless {
            tracing::warn!("HTTP page driver has no window; headless = false has no effect");
        }

        let client = build_http_client(&config.user_agent)?;
        Ok(Self::new(
            client,
            config.login.clone(),
            Duration::from_secs(config.scraper.navigation_timeout_secs),
        ))
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn current_page(&self) -> DriverResult<&LoadedPage> {
        self.ensure_open()?;
        self.page.as_ref().ok_or(DriverError::NoPage)
    }

    /// Sends a request and stores the response body as the current page
    async fn load(&mut self, request: RequestBuilder, target: String) -> DriverResult<()> {
        let response = request.send().await.map_err(|e| DriverError::Navigation {
            url: target.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::HttpStatus {
                url: target,
                status: status.as_u16(),
            });
        }

        let url = response.url().clone();
        let html = response.text().await?;
        tracing::debug!("Loaded {} ({} bytes)", url, html.len());

        self.page = Some(LoadedPage { url, html });
        self.typed.clear();
        Ok(())
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    async fn login(&mut self) -> DriverResult<()> {
        let Some(login) = self.login.clone() else {
            return Ok(());
        };

        let password = std::env::var(&login.password_env).map_err(|_| {
            DriverError::Login(format!(
                "environment variable {} is not set",
                login.password_env
            ))
        })?;

        let timeout = self.login_timeout;
        self.navigate(&login.url, timeout).await?;
        self.type_text(&login.username_field, &login.username).await?;
        self.type_text(&login.password_field, &password).await?;
        self.click(&login.submit, timeout).await?;

        if !has_selector(self.current_page()?, &login.success_selector)? {
            return Err(DriverError::Login(format!(
                "{} not present after submitting the login form",
                login.success_selector
            )));
        }

        tracing::info!("Logged in as {}", login.username);
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<()> {
        self.ensure_open()?;
        let parsed = Url::parse(url)?;
        let request = self.client.get(parsed);
        with_timeout(
            &format!("navigate to {}", url),
            timeout,
            self.load(request, url.to_string()),
        )
        .await
    }

    /// Checks for the selector on the loaded document
    ///
    /// Pages are static HTML, so the element is either present once the
    /// navigation completed or it never appears.
    async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> DriverResult<()> {
        if has_selector(self.current_page()?, selector)? {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }

    async fn evaluate(&mut self, query: &PageQuery) -> DriverResult<QueryOutput> {
        let page = self.current_page()?;
        match query {
            PageQuery::ThreadRows(row_query) => {
                let rows = read_thread_rows(page, row_query)?;
                Ok(QueryOutput::Threads(row_query.select(rows)))
            }
            PageQuery::SelectorTexts(selectors) => {
                Ok(QueryOutput::Texts(selector_texts(page, selectors)?))
            }
        }
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let action = plan_click(self.current_page()?, selector, &self.typed)?;

        let (request, target) = match action {
            ClickAction::Follow(url) => (self.client.get(url.clone()), url.to_string()),
            ClickAction::Submit {
                method,
                action,
                fields,
            } => {
                let target = action.to_string();
                if method == Method::POST {
                    (self.client.post(action).form(&fields), target)
                } else {
                    let mut url = action;
                    url.query_pairs_mut().extend_pairs(fields.iter());
                    (self.client.get(url), target)
                }
            }
        };

        with_timeout(
            &format!("click {}", selector),
            timeout,
            self.load(request, target),
        )
        .await
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> DriverResult<()> {
        let name = field_name(self.current_page()?, selector)?;
        self.typed.insert(name, text.to_string());
        Ok(())
    }

    fn current_url(&self) -> Option<String> {
        self.page.as_ref().map(|page| page.url.to_string())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.page = None;
        self.typed.clear();
        self.closed = true;
        tracing::debug!("HTTP page driver closed");
        Ok(())
    }
}

fn parse_selector(selector: &str) -> DriverResult<Selector> {
    Selector::parse(selector).map_err(|_| DriverError::Selector(selector.to_string()))
}

/// Text content of an element with whitespace collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_selector(page: &LoadedPage, selector: &str) -> DriverResult<bool> {
    let document = Html::parse_document(&page.html);
    let selector = parse_selector(selector)?;
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

/// Reads one entry per row element, `None` for rows without a usable title link
fn read_thread_rows(
    page: &LoadedPage,
    query: &ThreadRowQuery,
) -> DriverResult<Vec<Option<RawThreadRow>>> {
    let document = Html::parse_document(&page.html);
    let row_sel = parse_selector(&query.row_selector)?;
    let title_sel = parse_selector(&query.title_selector)?;
    let author_sel = parse_selector(&query.author_selector)?;
    let category_sel = query
        .category_selector
        .as_deref()
        .map(parse_selector)
        .transpose()?;
    let location_sel = query
        .location_selector
        .as_deref()
        .map(parse_selector)
        .transpose()?;

    let rows = document
        .select(&row_sel)
        .map(|row| {
            let link = row.select(&title_sel).next()?;
            let href = link.value().attr("href")?;
            let url = page.url.join(href).ok()?;

            Some(RawThreadRow {
                title: element_text(link),
                url: url.to_string(),
                author: row
                    .select(&author_sel)
                    .next()
                    .map(element_text)
                    .unwrap_or_default(),
                category: category_sel
                    .as_ref()
                    .and_then(|sel| row.select(sel).next())
                    .map(element_text),
                location: location_sel
                    .as_ref()
                    .and_then(|sel| row.select(sel).next())
                    .map(element_text),
            })
        })
        .collect();

    Ok(rows)
}

/// Text of every element matching each selector, joined by newlines
fn selector_texts(page: &LoadedPage, selectors: &[String]) -> DriverResult<Vec<String>> {
    let document = Html::parse_document(&page.html);

    selectors
        .iter()
        .map(|selector| {
            let selector = parse_selector(selector)?;
            let text = document
                .select(&selector)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            Ok(text)
        })
        .collect()
}

/// Name attribute of the form field matching the selector
fn field_name(page: &LoadedPage, selector: &str) -> DriverResult<String> {
    let document = Html::parse_document(&page.html);
    let sel = parse_selector(selector)?;
    let field = document
        .select(&sel)
        .next()
        .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;

    field
        .value()
        .attr("name")
        .map(str::to_string)
        .ok_or_else(|| DriverError::Evaluation(format!("{} has no name attribute", selector)))
}

/// Resolves a click into a link to follow or a form to submit
fn plan_click(
    page: &LoadedPage,
    selector: &str,
    typed: &HashMap<String, String>,
) -> DriverResult<ClickAction> {
    let document = Html::parse_document(&page.html);
    let sel = parse_selector(selector)?;
    let target = document
        .select(&sel)
        .next()
        .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;

    if target.value().name() == "a" {
        if let Some(href) = target.value().attr("href") {
            return Ok(ClickAction::Follow(page.url.join(href)?));
        }
    }

    let form_sel = parse_selector("form")?;
    let form = document
        .select(&form_sel)
        .find(|form| form.select(&sel).next().is_some())
        .ok_or_else(|| {
            DriverError::Evaluation(format!("{} is neither a link nor inside a form", selector))
        })?;

    let action = match form.value().attr("action").filter(|a| !a.trim().is_empty()) {
        Some(action) => page.url.join(action)?,
        None => page.url.clone(),
    };

    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => Method::POST,
        _ => Method::GET,
    };

    let field_sel = parse_selector("input[name], textarea[name], select[name]")?;
    let mut fields = Vec::new();

    for field in form.select(&field_sel) {
        let element = field.value();
        let name = element.attr("name").unwrap_or_default();
        let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();

        // Only the clicked button is submitted
        if matches!(kind.as_str(), "submit" | "button" | "image" | "reset") {
            continue;
        }
        if matches!(kind.as_str(), "checkbox" | "radio") && element.attr("checked").is_none() {
            continue;
        }

        let value = match typed.get(name) {
            Some(value) => value.clone(),
            None if element.name() == "textarea" => element_text(field),
            None => element.attr("value").unwrap_or_default().to_string(),
        };
        fields.push((name.to_string(), value));
    }

    if let Some(name) = target.value().attr("name") {
        let value = target.value().attr("value").unwrap_or_default();
        fields.push((name.to_string(), value.to_string()));
    }

    Ok(ClickAction::Submit {
        method,
        action,
        fields,
    })
}
