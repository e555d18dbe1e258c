//! Normalized provider results and dispatch outcomes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Capability;

/// A single search hit, identical in shape across search providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Result description/snippet.
    pub snippet: String,
    /// 1-based position in the provider's response.
    pub position: u32,
    /// Name of the provider that returned this hit.
    pub source: String,
    /// Provider-specific fields (display link, rating, crawl date...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl SearchHit {
    /// Creates a new search hit.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        position: u32,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            position,
            source: source.into(),
            extra: Map::new(),
        }
    }

    /// Adds a provider-specific field. Null values are dropped.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        if !value.is_null() {
            self.extra.insert(key.into(), value);
        }
        self
    }
}

/// A solved captcha.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaSolution {
    /// Recognized text or response token.
    pub code: String,
    /// Vendor task identifier, if the vendor issued one.
    pub task_id: Option<String>,
}

impl CaptchaSolution {
    pub fn new(code: impl Into<String>, task_id: Option<String>) -> Self {
        Self {
            code: code.into(),
            task_id,
        }
    }
}

/// Payload produced by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Search(Vec<SearchHit>),
    Captcha(CaptchaSolution),
}

impl Payload {
    /// The capability whose shape this payload has.
    pub fn capability(&self) -> Capability {
        match self {
            Payload::Search(_) => Capability::Search,
            Payload::Captcha(_) => Capability::CaptchaSolve,
        }
    }

    pub fn into_search(self) -> Option<Vec<SearchHit>> {
        match self {
            Payload::Search(hits) => Some(hits),
            _ => None,
        }
    }

    pub fn into_captcha(self) -> Option<CaptchaSolution> {
        match self {
            Payload::Captcha(solution) => Some(solution),
            _ => None,
        }
    }
}

/// Why a provider did not serve a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum FailureReason {
    /// Skipped by its availability predicate; never invoked.
    Unavailable,
    /// Invoked and failed.
    Failed(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unavailable => f.write_str("unavailable"),
            FailureReason::Failed(message) => f.write_str(message),
        }
    }
}

/// One provider's entry in a dispatch trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub reason: FailureReason,
}

impl AttemptRecord {
    pub fn new(provider: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            provider: provider.into(),
            reason,
        }
    }

    /// Returns true if the provider was skipped without invocation.
    pub fn is_unavailable(&self) -> bool {
        self.reason == FailureReason::Unavailable
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Successful result with a uniform envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult<P = Payload> {
    /// Provider that produced the payload.
    pub provider: String,
    pub payload: P,
    /// Wall time of the successful invocation.
    #[serde(with = "duration_ms")]
    pub latency: Duration,
    /// Providers tried or skipped before the successful one, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<AttemptRecord>,
}

impl<P> NormalizedResult<P> {
    /// Converts the payload, keeping the envelope.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> NormalizedResult<Q> {
        NormalizedResult {
            provider: self.provider,
            payload: f(self.payload),
            latency: self.latency,
            skipped: self.skipped,
        }
    }

    /// Fallible variant of [`map`](Self::map).
    pub fn try_map<Q, E>(self, f: impl FnOnce(P) -> Result<Q, E>) -> Result<NormalizedResult<Q>, E> {
        Ok(NormalizedResult {
            provider: self.provider,
            payload: f(self.payload)?,
            latency: self.latency,
            skipped: self.skipped,
        })
    }
}

/// Terminal state of a dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "lowercase")]
pub enum DispatchOutcome {
    Success(NormalizedResult),
    /// Every eligible provider was tried or skipped, in attempt order.
    Exhausted(Vec<AttemptRecord>),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }

    /// Name of the provider that served the request, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Success(result) => Some(&result.provider),
            DispatchOutcome::Exhausted(_) => None,
        }
    }

    /// Converts into a `Result`, turning exhaustion into an error.
    pub fn into_result(self) -> crate::Result<NormalizedResult> {
        match self {
            DispatchOutcome::Success(result) => Ok(result),
            DispatchOutcome::Exhausted(attempts) => Err(crate::DispatchError::Exhausted(attempts)),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
