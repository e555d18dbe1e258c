//! SerpAPI adapter (paid Google results, no blocking).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::http::{self, USER_AGENT};
use crate::quota::Quota;
use crate::{Adapter, AdapterConfig, AdapterError, Payload, Request, SearchHit};

const DEFAULT_BASE_URL: &str = "https://serpapi.com/search";

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    position: Option<Value>,
    rating: Option<Value>,
    #[serde(default)]
    extensions: Vec<Value>,
}

/// SerpAPI search adapter.
pub struct SerpApi {
    config: AdapterConfig,
    client: Client,
    api_key: Option<String>,
    base_url: String,
    quota: Option<Quota>,
}

impl SerpApi {
    /// Creates a new SerpAPI adapter.
    pub fn new(api_key: Option<String>) -> Self {
        let config = AdapterConfig::new("serpapi", 10);
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
impl Adapter for SerpApi {
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
            .ok_or_else(|| AdapterError::UnsupportedRequest("serpapi only serves search".into()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingCredential("SERPAPI_KEY"))?;
        if let Some(quota) = &self.quota {
            quota.acquire()?;
        }

        let num = request.num_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("api_key", api_key),
                ("q", request.query.as_str()),
                ("num", num.as_str()),
                ("engine", "google"),
            ])
            .send()
            .await?;
        let data: SerpApiResponse = http::read_json(response).await?;

        if let Some(error) = data.error {
            if data.organic_results.is_empty() && !error.contains("hasn't returned any results") {
                return Err(AdapterError::Vendor(error));
            }
        }

        Ok(Payload::Search(normalize(data.organic_results)))
    }
}

fn normalize(items: Vec<OrganicResult>) -> Vec<SearchHit> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            SearchHit::new(item.title, item.link, item.snippet, i as u32 + 1, "serpapi")
                .with_extra("position", item.position.unwrap_or(Value::Null))
                .with_extra("rating", item.rating.unwrap_or(Value::Null))
                .with_extra("extensions", Value::Array(item.extensions))
        })
        .collect()
}
