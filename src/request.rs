//! Capability-specific request values.

use serde::{Deserialize, Serialize};

use crate::Capability;

/// Default number of search results requested.
pub const DEFAULT_NUM_RESULTS: u32 = 10;

/// A web search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The search terms.
    pub query: String,
    /// Number of results wanted. Providers cap this to their own maximum.
    pub num_results: u32,
}

impl SearchRequest {
    /// Creates a new search request with the default result count.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_results: DEFAULT_NUM_RESULTS,
        }
    }

    /// Sets the number of results.
    pub fn with_num_results(mut self, num_results: u32) -> Self {
        self.num_results = num_results;
        self
    }
}

/// A captcha to be solved by a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptchaRequest {
    /// Raw image bytes of a text captcha.
    Image { bytes: Vec<u8> },
    /// Image captcha referenced by URL (`http(s)://` or `data:`).
    ImageUrl { url: String },
    /// reCAPTCHA v2 checkbox/invisible.
    RecaptchaV2 { sitekey: String, page_url: String },
    /// reCAPTCHA v3 score-based.
    RecaptchaV3 {
        sitekey: String,
        page_url: String,
        action: String,
        min_score: f32,
    },
    /// hCaptcha.
    HCaptcha { sitekey: String, page_url: String },
}

impl CaptchaRequest {
    /// reCAPTCHA v3 with the vendor-default action and minimum score.
    pub fn recaptcha_v3(sitekey: impl Into<String>, page_url: impl Into<String>) -> Self {
        CaptchaRequest::RecaptchaV3 {
            sitekey: sitekey.into(),
            page_url: page_url.into(),
            action: "verify".to_string(),
            min_score: 0.3,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptchaRequest::Image { .. } => "image",
            CaptchaRequest::ImageUrl { .. } => "image_url",
            CaptchaRequest::RecaptchaV2 { .. } => "recaptcha_v2",
            CaptchaRequest::RecaptchaV3 { .. } => "recaptcha_v3",
            CaptchaRequest::HCaptcha { .. } => "hcaptcha",
        }
    }
}

/// A request routed through the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Request {
    Search(SearchRequest),
    Captcha(CaptchaRequest),
}

impl Request {
    /// The capability this request belongs to.
    pub fn capability(&self) -> Capability {
        match self {
            Request::Search(_) => Capability::Search,
            Request::Captcha(_) => Capability::CaptchaSolve,
        }
    }

    pub fn as_search(&self) -> Option<&SearchRequest> {
        match self {
            Request::Search(req) => Some(req),
            _ => None,
        }
    }

    pub fn as_captcha(&self) -> Option<&CaptchaRequest> {
        match self {
            Request::Captcha(req) => Some(req),
            _ => None,
        }
    }
}

impl From<SearchRequest> for Request {
    fn from(req: SearchRequest) -> Self {
        Request::Search(req)
    }
}

impl From<CaptchaRequest> for Request {
    fn from(req: CaptchaRequest) -> Self {
        Request::Captcha(req)
    }
}
