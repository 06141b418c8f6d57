use crate::config::types::{
    Config, ForumConfig, LoginConfig, OutputConfig, ScraperConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Upper bound on `max-pages`
pub const MAX_PAGES_LIMIT: u32 = 50;

/// Upper bound on `page-size`
pub const MAX_PAGE_SIZE: u32 = 500;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_forum_config(&config.forum)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    if let Some(login) = &config.login {
        validate_login_config(login)?;
    }
    Ok(())
}

/// Validates scrape run settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 || config.max_pages > MAX_PAGES_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_pages must be between 1 and {}, got {}",
            MAX_PAGES_LIMIT, config.max_pages
        )));
    }

    if config.max_threads_per_page < 1 {
        return Err(ConfigError::Validation(format!(
            "max_threads_per_page must be >= 1, got {}",
            config.max_threads_per_page
        )));
    }

    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    if config.navigation_timeout_secs < 1 || config.selector_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got navigation={}s selector={}s",
            config.navigation_timeout_secs, config.selector_timeout_secs
        )));
    }

    Ok(())
}

/// Validates the forum layout
fn validate_forum_config(config: &ForumConfig) -> Result<(), ConfigError> {
    validate_http_url("listing_url", &config.listing_url)?;

    if config.offset_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "offset_param cannot be empty".to_string(),
        ));
    }

    if config.category.trim().is_empty() {
        return Err(ConfigError::Validation(
            "category cannot be empty".to_string(),
        ));
    }

    for (name, selector) in [
        ("row_selector", &config.row_selector),
        ("title_selector", &config.title_selector),
        ("author_selector", &config.author_selector),
    ] {
        validate_selector(name, selector)?;
    }

    if let Some(selector) = &config.category_selector {
        validate_selector("category_selector", selector)?;
    }
    if let Some(selector) = &config.location_selector {
        validate_selector("location_selector", selector)?;
    }

    if config.post_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "post_selectors must list at least one selector".to_string(),
        ));
    }
    for selector in &config.post_selectors {
        validate_selector("post_selectors", selector)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation("name cannot be empty".to_string()));
    }

    if !config.name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the login form description
fn validate_login_config(config: &LoginConfig) -> Result<(), ConfigError> {
    validate_http_url("login.url", &config.url)?;

    for (name, selector) in [
        ("login.username_field", &config.username_field),
        ("login.password_field", &config.password_field),
        ("login.submit", &config.submit),
        ("login.success_selector", &config.success_selector),
    ] {
        validate_selector(name, selector)?;
    }

    if config.username.is_empty() {
        return Err(ConfigError::Validation(
            "login.username cannot be empty".to_string(),
        ));
    }

    if config.password_env.is_empty() {
        return Err(ConfigError::Validation(
            "login.password_env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Requires an absolute http(s) URL
fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}

/// Requires a CSS selector that parses
fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }

    scraper::Selector::parse(selector).map_err(|_| {
        ConfigError::Validation(format!("{} is not a valid CSS selector: '{}'", name, selector))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            scraper: ScraperConfig::default(),
            forum: ForumConfig::with_defaults("https://forum.example.com/viewforum.php?f=3", "Müük"),
            user_agent: UserAgentConfig {
                name: "GpuScout".to_string(),
                version: "0.1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
            },
            output: OutputConfig {
                database_path: "./test.db".to_string(),
                summary_path: "./report.md".to_string(),
            },
            login: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_max_pages_bounds() {
        let mut config = valid_config();
        config.scraper.max_pages = 0;
        assert!(validate(&config).is_err());

        config.scraper.max_pages = MAX_PAGES_LIMIT + 1;
        assert!(validate(&config).is_err());

        config.scraper.max_pages = MAX_PAGES_LIMIT;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = valid_config();
        config.scraper.page_size = 0;
        assert!(validate(&config).is_err());

        config.scraper.page_size = MAX_PAGE_SIZE + 1;
        assert!(validate(&config).is_err());

        config.scraper.page_size = MAX_PAGE_SIZE;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_listing_url_scheme() {
        let mut config = valid_config();
        config.forum.listing_url = "ftp://forum.example.com/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.forum.listing_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_bad_selector_rejected() {
        let mut config = valid_config();
        config.forum.title_selector = "a[[".to_string();
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.forum.post_selectors.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_category_rejected() {
        let mut config = valid_config();
        config.forum.category = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_user_agent_name() {
        let mut config = valid_config();
        config.user_agent.name = "Gpu Scout".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_login_requires_password_env() {
        let mut config = valid_config();
        config.login = Some(LoginConfig {
            url: "https://forum.example.com/login.php".to_string(),
            username_field: "input[name=username]".to_string(),
            password_field: "input[name=password]".to_string(),
            submit: "input[name=login]".to_string(),
            username: "scout".to_string(),
            password_env: String::new(),
            success_selector: "a.logout".to_string(),
        });
        assert!(validate(&config).is_err());

        if let Some(login) = config.login.as_mut() {
            login.password_env = "GPU_SCOUT_PASSWORD".to_string();
        }
        assert!(validate(&config).is_ok());
    }
}
