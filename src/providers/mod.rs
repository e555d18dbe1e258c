//! Provider adapter implementations.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;

use crate::http;
use crate::AdapterError;

// Search providers
mod bing;
mod duckduckgo;
mod google_cs;
mod serpapi;

// Captcha solvers
mod anti_captcha;
mod two_captcha;

pub use bing::BingSearch;
pub use duckduckgo::DuckDuckGo;
pub use google_cs::{GoogleCustomSearch, FREE_DAILY_QUOTA};
pub use serpapi::SerpApi;

pub use anti_captcha::AntiCaptcha;
pub use two_captcha::TwoCaptcha;

/// Delay between captcha result polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long a captcha vendor gets to produce a solution.
pub const DEFAULT_SOLVE_TIMEOUT: Duration = Duration::from_secs(120);

/// Resolves an image reference to a base64 body.
///
/// `data:` URLs are stripped to their payload; anything else is downloaded.
pub(crate) async fn image_base64(client: &Client, url: &str) -> Result<String, AdapterError> {
    if let Some(rest) = url.strip_prefix("data:") {
        return rest
            .split_once(',')
            .map(|(_, body)| body.to_string())
            .ok_or_else(|| AdapterError::UnsupportedRequest("malformed data URL".into()));
    }

    let response = http::check_status(client.get(url).send().await?).await?;
    let bytes = response.bytes().await?;
    Ok(BASE64.encode(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_image_base64_data_url() {
        let body = image_base64(&Client::new(), "data:image/png;base64,aGVsbG8=")
            .await
            .unwrap();
        assert_eq!(body, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_image_base64_malformed_data_url() {
        let err = image_base64(&Client::new(), "data:image/png;base64")
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedRequest(_)));
    }

    #[tokio::test]
    async fn test_image_base64_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/captcha.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let url = format!("{}/captcha.png", server.uri());
        let body = image_base64(&Client::new(), &url).await.unwrap();
        assert_eq!(body, "aGVsbG8=");
    }
}
