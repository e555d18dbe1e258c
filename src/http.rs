//! Shared HTTP plumbing for provider adapters.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::AdapterError;

/// User agent sent to API providers.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; webagent/0.1)";

/// Browser-like user agent for HTML endpoints.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Builds a client with the given user agent and request timeout.
///
/// If the user agent is rejected the client is rebuilt without it; the
/// timeout is always kept.
pub fn client(user_agent: &str, timeout: Duration) -> Client {
    match Client::builder().user_agent(user_agent).timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build HTTP client with user agent {:?}: {}", user_agent, e);
            Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new())
        }
    }
}

/// Maps non-success statuses to adapter errors.
///
/// 429, and 401/403 whose body mentions rate, quota or limit, count as rate
/// limiting; other 401/403 are credential failures.
pub async fn check_status(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    debug!(status = %status, url = %response.url(), "Provider responded");
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, body))
}

fn classify_status(status: StatusCode, body: String) -> AdapterError {
    match status.as_u16() {
        429 => AdapterError::RateLimited,
        401 | 403 => {
            let lower = body.to_lowercase();
            if lower.contains("rate") || lower.contains("quota") || lower.contains("limit") {
                AdapterError::RateLimited
            } else {
                AdapterError::Unauthorized
            }
        }
        code => AdapterError::Status {
            status: code,
            message: body,
        },
    }
}

/// Checks the status and decodes a JSON body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AdapterError> {
    let response = check_status(response).await?;
    let body = response.text().await?;
    trace!(body = %body, "Response body");
    serde_json::from_str(&body).map_err(|e| AdapterError::Parse(format!("JSON parse error: {e}")))
}
