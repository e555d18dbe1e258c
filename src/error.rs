//! Error types for provider dispatch.

use std::time::Duration;

use thiserror::Error;

use crate::result::AttemptRecord;
use crate::Capability;

/// Result type alias for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Structural errors surfaced by the dispatcher.
///
/// Individual provider failures never appear here directly; they are folded
/// into [`DispatchOutcome::Exhausted`](crate::DispatchOutcome::Exhausted).
/// The facades turn an exhausted outcome into [`DispatchError::Exhausted`].
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Registration was rejected (e.g. duplicate adapter name).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Capability is unknown or has no registered adapters.
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// Explicit provider override names no registered adapter.
    #[error("Unknown provider '{provider}' for capability '{capability}'")]
    UnknownProvider {
        capability: Capability,
        provider: String,
    },

    /// Request kind does not belong to the dispatched capability.
    #[error("Cannot dispatch a {request} request to capability '{capability}'")]
    RequestMismatch {
        capability: Capability,
        request: Capability,
    },

    /// Request rejected before dispatch.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every provider was tried or skipped without success.
    #[error("All providers exhausted: {}", format_attempts(.0))]
    Exhausted(Vec<AttemptRecord>),
}

/// Errors raised by a single adapter invocation.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("Provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Provider rejected the call for rate or quota reasons.
    #[error("Rate limited by provider")]
    RateLimited,

    /// Credentials were rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Provider reported an application-level error.
    #[error("Provider error: {0}")]
    Vendor(String),

    /// Invocation or solve deadline exceeded.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Local daily quota is spent.
    #[error("Daily quota of {0} requests exhausted")]
    QuotaExhausted(u64),

    /// Adapter has no credential configured.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// Adapter cannot serve this kind of request.
    #[error("Unsupported request: {0}")]
    UnsupportedRequest(String),

    /// Quota bookkeeping failed.
    #[error(transparent)]
    Quota(#[from] QuotaError),
}

/// Errors from quota state backends.
#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Quota store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Quota store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Quota store lock poisoned")]
    Poisoned,
}

fn format_attempts(attempts: &[AttemptRecord]) -> String {
    if attempts.is_empty() {
        return "no providers attempted".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
