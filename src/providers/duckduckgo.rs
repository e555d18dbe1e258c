//! DuckDuckGo HTML adapter. Needs no credentials, so it is the last resort.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::http::{self, BROWSER_USER_AGENT};
use crate::{Adapter, AdapterConfig, AdapterError, Payload, Request, SearchHit};

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo search adapter.
pub struct DuckDuckGo {
    config: AdapterConfig,
    client: Client,
    base_url: String,
}

impl DuckDuckGo {
    /// Creates a new DuckDuckGo adapter.
    pub fn new() -> Self {
        let config = AdapterConfig::new("duckduckgo", 40);
        Self {
            client: http::client(BROWSER_USER_AGENT, Duration::from_secs(config.timeout)),
            config,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Creates with custom configuration. The HTTP client is rebuilt so its
    /// request timeout follows `config.timeout`.
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.client = http::client(BROWSER_USER_AGENT, Duration::from_secs(config.timeout));
        self.config = config;
        self
    }

    /// Sets a custom endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for DuckDuckGo {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn invoke(&self, request: &Request) -> Result<Payload, AdapterError> {
        let request = request
            .as_search()
            .ok_or_else(|| AdapterError::UnsupportedRequest("duckduckgo only serves search".into()))?;

        let url = format!("{}?q={}", self.base_url, urlencoding::encode(&request.query));
        let response = http::check_status(self.client.get(&url).send().await?).await?;
        let html = response.text().await?;

        let hits = parse_results(&html, request.num_results as usize)?;
        Ok(Payload::Search(hits))
    }
}

fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Parse(format!("Failed to parse selector: {:?}", e)))
}

fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchHit>, AdapterError> {
    let document = Html::parse_document(html);
    let result_selector = selector(".result")?;
    let title_selector = selector(".result__title a, a.result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let mut hits = Vec::new();

    for element in document.select(&result_selector) {
        if hits.len() >= limit {
            break;
        }

        let Some(title_elem) = element.select(&title_selector).next() else {
            continue;
        };

        let title = title_elem.text().collect::<String>().trim().to_string();
        let href = title_elem.value().attr("href").unwrap_or_default();
        let url = if href.starts_with("//duckduckgo.com/l/") {
            extract_redirect_url(href).unwrap_or_else(|| href.to_string())
        } else {
            href.to_string()
        };

        let snippet = element
            .select(&snippet_selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        if !url.is_empty() && !title.is_empty() {
            let position = hits.len() as u32 + 1;
            hits.push(SearchHit::new(title, url, snippet, position, "duckduckgo"));
        }
    }

    Ok(hits)
}

fn extract_redirect_url(url: &str) -> Option<String> {
    let url = url.trim_start_matches("//duckduckgo.com/l/?uddg=");
    let end = url.find('&').unwrap_or(url.len());
    let decoded = urlencoding::decode(&url[..end]).ok()?;
    Some(decoded.into_owned())
}
