//! Google Custom Search JSON API adapter (free tier: 100 queries/day).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::http::{self, USER_AGENT};
use crate::quota::Quota;
use crate::{Adapter, AdapterConfig, AdapterError, Payload, Request, SearchHit};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// The API returns at most 10 items per request.
const MAX_NUM: u32 = 10;

/// Free-tier daily query allowance.
pub const FREE_DAILY_QUOTA: u64 = 100;

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    display_link: Option<String>,
    mime: Option<String>,
    file_format: Option<String>,
}

/// Google Custom Search adapter. Needs both an API key and an engine id (cx).
pub struct GoogleCustomSearch {
    config: AdapterConfig,
    client: Client,
    api_key: Option<String>,
    cx: Option<String>,
    base_url: String,
    quota: Option<Quota>,
}

impl GoogleCustomSearch {
    /// Creates a new Google Custom Search adapter.
    pub fn new(api_key: Option<String>, cx: Option<String>) -> Self {
        let config = AdapterConfig::new("google_cs", 20).with_daily_quota(FREE_DAILY_QUOTA);
        Self {
            client: http::client(USER_AGENT, Duration::from_secs(config.timeout)),
            config,
            api_key,
            cx,
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
impl Adapter for GoogleCustomSearch {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.config.enabled
            && self.api_key.is_some()
            && self.cx.is_some()
            && self.quota.as_ref().map_or(true, Quota::has_remaining)
    }

    async fn invoke(&self, request: &Request) -> Result<Payload, AdapterError> {
        let request = request
            .as_search()
            .ok_or_else(|| AdapterError::UnsupportedRequest("google_cs only serves search".into()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingCredential("GOOGLE_CS_API_KEY"))?;
        let cx = self
            .cx
            .as_deref()
            .ok_or(AdapterError::MissingCredential("GOOGLE_CS_CX"))?;
        if let Some(quota) = &self.quota {
            quota.acquire()?;
        }

        let num = request.num_results.min(MAX_NUM).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", api_key),
                ("cx", cx),
                ("q", request.query.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?;
        let data: CseResponse = http::read_json(response).await?;

        Ok(Payload::Search(normalize(data.items)))
    }
}

fn normalize(items: Vec<CseItem>) -> Vec<SearchHit> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            SearchHit::new(item.title, item.link, item.snippet, i as u32 + 1, "google_cs")
                .with_extra("displayLink", item.display_link.map_or(Value::Null, Value::String))
                .with_extra("mime", item.mime.map_or(Value::Null, Value::String))
                .with_extra("fileFormat", item.file_format.map_or(Value::Null, Value::String))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchRequest;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_google_cs_new() {
        let adapter = GoogleCustomSearch::new(Some("k".into()), Some("cx".into()));
        assert_eq!(adapter.name(), "google_cs");
        assert_eq!(adapter.priority(), 20);
        assert_eq!(adapter.config().daily_quota, Some(FREE_DAILY_QUOTA));
        assert!(adapter.is_available());
    }

    #[test]
    fn test_google_cs_needs_key_and_cx() {
        assert!(!GoogleCustomSearch::new(Some("k".into()), None).is_available());
        assert!(!GoogleCustomSearch::new(None, Some("cx".into())).is_available());
    }

    #[test]
    fn test_google_cs_disabled() {
        let adapter = GoogleCustomSearch::new(Some("k".into()), Some("cx".into()))
            .with_config(AdapterConfig::new("google_cs", 20).with_enabled(false));
        assert!(!adapter.is_available());
    }

    #[tokio::test]
    async fn test_google_cs_caps_num_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("num", "10"))
            .and(query_param("cx", "engine"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"title": "Rust", "link": "https://www.rust-lang.org", "snippet": "Fast", "displayLink": "www.rust-lang.org"},
                    {"title": "Manual", "link": "https://example.com/manual.pdf", "mime": "application/pdf", "fileFormat": "PDF/Adobe Acrobat"}
                ]
            })))
            .mount(&server)
            .await;

        let adapter = GoogleCustomSearch::new(Some("k".into()), Some("engine".into()))
            .with_base_url(server.uri());
        let request: Request = SearchRequest::new("rust").with_num_results(50).into();
        let hits = adapter.invoke(&request).await.unwrap().into_search().unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].extra["displayLink"], "www.rust-lang.org");
        assert!(hits[0].extra.get("mime").is_none());
        assert_eq!(hits[1].extra["fileFormat"], "PDF/Adobe Acrobat");
        assert_eq!(hits[1].position, 2);
        assert_eq!(hits[1].source, "google_cs");
    }

    #[tokio::test]
    async fn test_google_cs_empty_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "customsearch#search"})))
            .mount(&server)
            .await;

        let adapter =
            GoogleCustomSearch::new(Some("k".into()), Some("cx".into())).with_base_url(server.uri());
        let hits = adapter
            .invoke(&SearchRequest::new("nothing").into())
            .await
            .unwrap()
            .into_search()
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_google_cs_daily_limit_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                r#"{"error":{"code":403,"message":"Quota exceeded for quota metric 'Queries'"}}"#,
            ))
            .mount(&server)
            .await;

        let adapter =
            GoogleCustomSearch::new(Some("k".into()), Some("cx".into())).with_base_url(server.uri());
        let err = adapter
            .invoke(&SearchRequest::new("rust").into())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::RateLimited));
    }

    #[tokio::test]
    async fn test_google_cs_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let adapter =
            GoogleCustomSearch::new(Some("k".into()), Some("cx".into())).with_base_url(server.uri());
        let err = adapter
            .invoke(&SearchRequest::new("rust").into())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[tokio::test]
    async fn test_google_cs_with_config_applies_client_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}").set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let adapter = GoogleCustomSearch::new(Some("k".into()), Some("cx".into()))
            .with_config(AdapterConfig::new("google_cs", 1).with_timeout(1))
            .with_base_url(server.uri());
        let err = adapter
            .invoke(&SearchRequest::new("q").into())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Http(ref e) if e.is_timeout()));
    }
}
