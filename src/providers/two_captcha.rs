//! 2Captcha adapter: submit to `in.php`, poll `res.php` until solved.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::image_base64;
use crate::http::{self, USER_AGENT};
use crate::quota::Quota;
use crate::{
    Adapter, AdapterConfig, AdapterError, CaptchaRequest, CaptchaSolution, Payload, Request,
};

const DEFAULT_BASE_URL: &str = "https://2captcha.com";
const NOT_READY: &str = "CAPCHA_NOT_READY";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    request: Value,
}

impl ApiResponse {
    fn text(&self) -> String {
        match &self.request {
            Value::String(s) => s.clone(),
            Value::Null => "Unknown error".to_string(),
            other => other.to_string(),
        }
    }
}

/// 2Captcha solving adapter.
pub struct TwoCaptcha {
    config: AdapterConfig,
    client: Client,
    api_key: Option<String>,
    base_url: String,
    poll_interval: Duration,
    solve_timeout: Duration,
    quota: Option<Quota>,
}

impl TwoCaptcha {
    /// Creates a new 2Captcha adapter.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            config: AdapterConfig::new("2captcha", 10).with_timeout(150),
            client: http::client(USER_AGENT, HTTP_TIMEOUT),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: super::DEFAULT_POLL_INTERVAL,
            solve_timeout: super::DEFAULT_SOLVE_TIMEOUT,
            quota: None,
        }
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a custom API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the delay between result polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets how long to wait for a solution.
    pub fn with_solve_timeout(mut self, timeout: Duration) -> Self {
        self.solve_timeout = timeout;
        self
    }

    /// Attaches a daily quota.
    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.quota = Some(quota);
        self
    }

    async fn params_for(
        &self,
        request: &CaptchaRequest,
    ) -> Result<Vec<(&'static str, String)>, AdapterError> {
        let params = match request {
            CaptchaRequest::Image { bytes } => vec![
                ("method", "base64".to_string()),
                ("body", BASE64.encode(bytes)),
            ],
            CaptchaRequest::ImageUrl { url } => vec![
                ("method", "base64".to_string()),
                ("body", image_base64(&self.client, url).await?),
            ],
            CaptchaRequest::RecaptchaV2 { sitekey, page_url } => vec![
                ("method", "userrecaptcha".to_string()),
                ("googlekey", sitekey.clone()),
                ("pageurl", page_url.clone()),
            ],
            CaptchaRequest::RecaptchaV3 {
                sitekey,
                page_url,
                action,
                min_score,
            } => vec![
                ("method", "userrecaptcha".to_string()),
                ("googlekey", sitekey.clone()),
                ("pageurl", page_url.clone()),
                ("version", "v3".to_string()),
                ("action", action.clone()),
                ("min_score", min_score.to_string()),
            ],
            CaptchaRequest::HCaptcha { sitekey, page_url } => vec![
                ("method", "hcaptcha".to_string()),
                ("sitekey", sitekey.clone()),
                ("pageurl", page_url.clone()),
            ],
        };
        Ok(params)
    }

    async fn submit(
        &self,
        api_key: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<String, AdapterError> {
        params.push(("key", api_key.to_string()));
        params.push(("json", "1".to_string()));

        let response = self
            .client
            .post(format!("{}/in.php", self.base_url))
            .form(&params)
            .send()
            .await?;
        let result: ApiResponse = http::read_json(response).await?;

        if result.status == 1 {
            Ok(result.text())
        } else {
            Err(AdapterError::Vendor(format!(
                "Captcha submission failed: {}",
                result.text()
            )))
        }
    }

    async fn wait_for_result(&self, api_key: &str, task_id: &str) -> Result<String, AdapterError> {
        let deadline = Instant::now() + self.solve_timeout;

        loop {
            let response = self
                .client
                .get(format!("{}/res.php", self.base_url))
                .query(&[("key", api_key), ("action", "get"), ("id", task_id), ("json", "1")])
                .send()
                .await?;
            let result: ApiResponse = http::read_json(response).await?;

            if result.status == 1 {
                return Ok(result.text());
            }

            let text = result.text();
            if text != NOT_READY && text.contains("ERROR") {
                return Err(AdapterError::Vendor(format!("Captcha solve error: {}", text)));
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(AdapterError::Timeout(self.solve_timeout));
            }
            debug!("2captcha task {} not ready", task_id);
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl Adapter for TwoCaptcha {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.config.enabled
            && self.api_key.is_some()
            && self.quota.as_ref().map_or(true, Quota::has_remaining)
    }

    async fn invoke(&self, request: &Request) -> Result<Payload, AdapterError> {
        let request = request.as_captcha().ok_or_else(|| {
            AdapterError::UnsupportedRequest("2captcha only solves captchas".into())
        })?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingCredential("TWOCAPTCHA_KEY"))?;

        let params = self.params_for(request).await?;
        if let Some(quota) = &self.quota {
            quota.acquire()?;
        }

        let task_id = self.submit(api_key, params).await?;
        debug!("2captcha accepted {} task {}", request.kind(), task_id);
        let code = self.wait_for_result(api_key, &task_id).await?;

        Ok(Payload::Captcha(CaptchaSolution::new(code, Some(task_id))))
    }
}
