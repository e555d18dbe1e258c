//! Anti-Captcha adapter: JSON `createTask` then `getTaskResult` polling.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::image_base64;
use crate::http::{self, USER_AGENT};
use crate::quota::Quota;
use crate::{
    Adapter, AdapterConfig, AdapterError, CaptchaRequest, CaptchaSolution, Payload, Request,
};

const DEFAULT_BASE_URL: &str = "https://api.anti-captcha.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    #[serde(default)]
    error_id: i64,
    error_description: Option<String>,
    task_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    #[serde(default)]
    error_id: i64,
    error_description: Option<String>,
    status: Option<String>,
    solution: Option<TaskSolution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskSolution {
    text: Option<String>,
    g_recaptcha_response: Option<String>,
}

/// Anti-Captcha solving adapter.
pub struct AntiCaptcha {
    config: AdapterConfig,
    client: Client,
    api_key: Option<String>,
    base_url: String,
    poll_interval: Duration,
    solve_timeout: Duration,
    quota: Option<Quota>,
}

impl AntiCaptcha {
    /// Creates a new Anti-Captcha adapter.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            config: AdapterConfig::new("anticaptcha", 20).with_timeout(150),
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

    async fn task_for(&self, request: &CaptchaRequest) -> Result<Value, AdapterError> {
        let task = match request {
            CaptchaRequest::Image { bytes } => json!({
                "type": "ImageToTextTask",
                "body": BASE64.encode(bytes),
            }),
            CaptchaRequest::ImageUrl { url } => {
                let body = image_base64(&self.client, url).await?;
                json!({ "type": "ImageToTextTask", "body": body })
            }
            CaptchaRequest::RecaptchaV2 { sitekey, page_url } => json!({
                "type": "RecaptchaV2TaskProxyless",
                "websiteURL": page_url,
                "websiteKey": sitekey,
            }),
            CaptchaRequest::RecaptchaV3 {
                sitekey,
                page_url,
                action,
                min_score,
            } => json!({
                "type": "RecaptchaV3TaskProxyless",
                "websiteURL": page_url,
                "websiteKey": sitekey,
                "minScore": min_score,
                "pageAction": action,
            }),
            CaptchaRequest::HCaptcha { sitekey, page_url } => json!({
                "type": "HCaptchaTaskProxyless",
                "websiteURL": page_url,
                "websiteKey": sitekey,
            }),
        };
        Ok(task)
    }

    async fn create_task(&self, api_key: &str, task: Value) -> Result<Value, AdapterError> {
        let response = self
            .client
            .post(format!("{}/createTask", self.base_url))
            .json(&json!({ "clientKey": api_key, "task": task }))
            .send()
            .await?;
        let result: CreateTaskResponse = http::read_json(response).await?;

        match (result.error_id, result.task_id) {
            (0, Some(task_id)) => Ok(task_id),
            _ => Err(AdapterError::Vendor(format!(
                "Submission failed: {}",
                result.error_description.as_deref().unwrap_or("Unknown")
            ))),
        }
    }

    async fn wait_for_result(
        &self,
        api_key: &str,
        task_id: &Value,
        request: &CaptchaRequest,
    ) -> Result<String, AdapterError> {
        let deadline = Instant::now() + self.solve_timeout;

        loop {
            let response = self
                .client
                .post(format!("{}/getTaskResult", self.base_url))
                .json(&json!({ "clientKey": api_key, "taskId": task_id }))
                .send()
                .await?;
            let result: TaskResultResponse = http::read_json(response).await?;

            if result.error_id != 0 {
                return Err(AdapterError::Vendor(format!(
                    "Solve error: {}",
                    result.error_description.as_deref().unwrap_or("Unknown")
                )));
            }

            match result.status.as_deref() {
                Some("ready") => return extract_code(result.solution, request),
                Some("processing") => {}
                other => {
                    return Err(AdapterError::Vendor(format!(
                        "Unexpected task status: {}",
                        other.unwrap_or("missing")
                    )))
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(AdapterError::Timeout(self.solve_timeout));
            }
            debug!("anticaptcha task {} processing", task_id);
            sleep(self.poll_interval).await;
        }
    }
}

fn extract_code(
    solution: Option<TaskSolution>,
    request: &CaptchaRequest,
) -> Result<String, AdapterError> {
    let solution =
        solution.ok_or_else(|| AdapterError::Parse("ready task without solution".into()))?;
    let code = match request {
        CaptchaRequest::Image { .. } | CaptchaRequest::ImageUrl { .. } => solution.text,
        _ => solution.g_recaptcha_response,
    };
    code.ok_or_else(|| AdapterError::Parse(format!("solution lacks a {} answer", request.kind())))
}

fn task_id_string(task_id: &Value) -> String {
    match task_id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Adapter for AntiCaptcha {
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
            AdapterError::UnsupportedRequest("anticaptcha only solves captchas".into())
        })?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingCredential("ANTICAPTCHA_KEY"))?;

        let task = self.task_for(request).await?;
        if let Some(quota) = &self.quota {
            quota.acquire()?;
        }

        let task_id = self.create_task(api_key, task).await?;
        debug!("anticaptcha accepted {} task {}", request.kind(), task_id);
        let code = self.wait_for_result(api_key, &task_id, request).await?;

        Ok(Payload::Captcha(CaptchaSolution::new(
            code,
            Some(task_id_string(&task_id)),
        )))
    }
}
