//! Captcha facade over the dispatcher.

use std::sync::Arc;

use crate::{
    CaptchaRequest, CaptchaSolution, Capability, DispatchError, NormalizedResult,
    ProviderDispatcher, Request, Result,
};

/// Captcha solving that falls back across registered vendors.
#[derive(Clone)]
pub struct CaptchaSolver {
    dispatcher: Arc<ProviderDispatcher>,
}

impl CaptchaSolver {
    /// Creates a solver backed by the given dispatcher.
    pub fn new(dispatcher: Arc<ProviderDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Solves a captcha with the first vendor that succeeds, or only
    /// `provider` if set.
    pub async fn solve(
        &self,
        request: CaptchaRequest,
        provider: Option<&str>,
    ) -> Result<NormalizedResult<CaptchaSolution>> {
        validate(&request)?;

        let request = Request::Captcha(request);
        self.dispatcher
            .dispatch(Capability::CaptchaSolve, &request, provider)
            .await?
            .into_result()?
            .try_map(|payload| {
                payload.into_captcha().ok_or(DispatchError::RequestMismatch {
                    capability: Capability::CaptchaSolve,
                    request: Capability::Search,
                })
            })
    }

    /// Solves an image captcha and returns the recognized text.
    pub async fn solve_image(&self, bytes: Vec<u8>) -> Result<String> {
        Ok(self
            .solve(CaptchaRequest::Image { bytes }, None)
            .await?
            .payload
            .code)
    }

    /// Solves reCAPTCHA v2 and returns the `g-recaptcha-response` token.
    pub async fn solve_recaptcha(&self, sitekey: &str, page_url: &str) -> Result<String> {
        let request = CaptchaRequest::RecaptchaV2 {
            sitekey: sitekey.to_string(),
            page_url: page_url.to_string(),
        };
        Ok(self.solve(request, None).await?.payload.code)
    }

    /// Solves reCAPTCHA v3 with the default action and minimum score.
    pub async fn solve_recaptcha_v3(&self, sitekey: &str, page_url: &str) -> Result<String> {
        let request = CaptchaRequest::recaptcha_v3(sitekey, page_url);
        Ok(self.solve(request, None).await?.payload.code)
    }

    /// Solves hCaptcha and returns the response token.
    pub async fn solve_hcaptcha(&self, sitekey: &str, page_url: &str) -> Result<String> {
        let request = CaptchaRequest::HCaptcha {
            sitekey: sitekey.to_string(),
            page_url: page_url.to_string(),
        };
        Ok(self.solve(request, None).await?.payload.code)
    }
}

fn validate(request: &CaptchaRequest) -> Result<()> {
    let problem = match request {
        CaptchaRequest::Image { bytes } if bytes.is_empty() => Some("image is empty"),
        CaptchaRequest::ImageUrl { url } if url.trim().is_empty() => Some("image URL is empty"),
        CaptchaRequest::RecaptchaV2 { sitekey, page_url }
        | CaptchaRequest::RecaptchaV3 {
            sitekey, page_url, ..
        }
        | CaptchaRequest::HCaptcha { sitekey, page_url } => {
            if sitekey.trim().is_empty() {
                Some("sitekey is empty")
            } else if url::Url::parse(page_url).is_err() {
                Some("page URL is not a valid URL")
            } else {
                None
            }
        }
        _ => None,
    };

    match problem {
        Some(problem) => Err(DispatchError::InvalidRequest(problem.to_string())),
        None => Ok(()),
    }
}
