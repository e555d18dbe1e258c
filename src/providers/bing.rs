//! Bing Web Search API adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::http::{self, USER_AGENT};
use crate::quota::Quota;
use crate::{Adapter, AdapterConfig, AdapterError, Payload, Request, SearchHit};

const DEFAULT_BASE_URL: &str = "https://api.bing.microsoft.com/v7.0/search";
const MAX_COUNT: u32 = 50;
const MARKET: &str = "en-US";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    web_pages: Option<WebPages>,
}

#[derive(Debug, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
    display_url: Option<String>,
    date_last_crawled: Option<String>,
}

/// Bing search adapter.
pub struct BingSearch {
    config: AdapterConfig,
    client: Client,
    api_key: Option<String>,
    base_url: String,
    quota: Option<Quota>,
}

impl BingSearch {
    /// Creates a new Bing adapter.
    pub fn new(api_key: Option<String>) -> Self {
        let config = AdapterConfig::new("bing", 30);
        Self {
            client: http::client(USER_AGENT, Duration::from_secs(config.timeout)),
            config,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            quota: None,
        }
    }

    /// Creates with custom configuration. The HTTP client is rebuilt so its
    /// request timeout follows `config.timeout`.
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.client = http::client(USER_AGENT, Duration::from_secs(config.timeout));
        self.config = config;
        self
    }

    /// Sets a custom endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Attaches a daily quota.
    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.quota = Some(quota);
        self
    }
}

#[async_trait]
impl Adapter for BingSearch {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.config.enabled
            && self.api_key.is_some()
            && self.quota.as_ref().map_or(true, Quota::has_remaining)
    }

    async fn invoke(&self, request: &Request) -> Result<Payload, AdapterError> {
        let request = request
            .as_search()
            .ok_or_else(|| AdapterError::UnsupportedRequest("bing only serves search".into()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingCredential("BING_API_KEY"))?;
        if let Some(quota) = &self.quota {
            quota.acquire()?;
        }

        let count = request.num_results.min(MAX_COUNT).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .header("Ocp-Apim-Subscription-Key", api_key)
            .query(&[
                ("q", request.query.as_str()),
                ("count", count.as_str()),
                ("mkt", MARKET),
            ])
            .send()
            .await?;
        let data: BingResponse = http::read_json(response).await?;

        let pages = data.web_pages.map(|w| w.value).unwrap_or_default();
        Ok(Payload::Search(normalize(pages)))
    }
}

fn normalize(pages: Vec<WebPage>) -> Vec<SearchHit> {
    pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| {
            SearchHit::new(page.name, page.url, page.snippet, i as u32 + 1, "bing")
                .with_extra("displayUrl", page.display_url.map_or(Value::Null, Value::String))
                .with_extra(
                    "dateLastCrawled",
                    page.date_last_crawled.map_or(Value::Null, Value::String),
                )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capability, ProviderDispatcher, SearchRequest};
    use serde_json::json;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_bing_new() {
        let adapter = BingSearch::new(Some("k".into()));
        assert_eq!(adapter.name(), "bing");
        assert_eq!(adapter.priority(), 30);
        assert!(adapter.is_available());
        assert!(!BingSearch::new(None).is_available());
    }

    #[tokio::test]
    async fn test_bing_invoke_normalizes_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Ocp-Apim-Subscription-Key", "secret"))
            .and(query_param("count", "50"))
            .and(query_param("mkt", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "webPages": {
                    "value": [
                        {"name": "Rust", "url": "https://www.rust-lang.org", "snippet": "Fast",
                         "displayUrl": "https://www.rust-lang.org", "dateLastCrawled": "2024-01-01T00:00:00Z"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let adapter = BingSearch::new(Some("secret".into())).with_base_url(server.uri());
        let request: Request = SearchRequest::new("rust").with_num_results(100).into();
        let hits = adapter.invoke(&request).await.unwrap().into_search().unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Rust");
        assert_eq!(hits[0].source, "bing");
        assert_eq!(hits[0].extra["dateLastCrawled"], "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_bing_missing_web_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_type": "SearchResponse"})))
            .mount(&server)
            .await;

        let adapter = BingSearch::new(Some("k".into())).with_base_url(server.uri());
        let hits = adapter
            .invoke(&SearchRequest::new("q").into())
            .await
            .unwrap()
            .into_search()
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_bing_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Access denied due to invalid subscription key"))
            .mount(&server)
            .await;

        let adapter = BingSearch::new(Some("bad".into())).with_base_url(server.uri());
        let err = adapter.invoke(&SearchRequest::new("q").into()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unauthorized));
    }

    #[tokio::test]
    async fn test_bing_configured_timeout_outlasts_default_client() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"webPages": {"value": [
                        {"name": "Slow", "url": "https://slow.example.com", "snippet": ""}
                    ]}}))
                    .set_delay(Duration::from_secs(11)),
            )
            .mount(&server)
            .await;

        let adapter = BingSearch::new(Some("k".into()))
            .with_config(AdapterConfig::new("bing", 30).with_timeout(30))
            .with_base_url(server.uri());
        let mut dispatcher = ProviderDispatcher::new();
        dispatcher.register(Capability::Search, adapter).unwrap();

        let outcome = dispatcher
            .dispatch(Capability::Search, &SearchRequest::new("q").into(), None)
            .await
            .unwrap();
        assert_eq!(outcome.provider(), Some("bing"));
    }
}
