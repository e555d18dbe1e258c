//! Provider adapter trait and configuration.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AdapterError, Payload, Request};

/// Configuration for a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Identifier, unique within a capability (e.g. "serpapi").
    pub name: String,
    /// Dispatch priority (lower = tried first).
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Per-invocation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Whether the adapter is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Daily request quota, if the provider has one.
    #[serde(default)]
    pub daily_quota: Option<u64>,
}

fn default_priority() -> i32 {
    100
}

fn default_timeout() -> u64 {
    10
}

fn default_enabled() -> bool {
    true
}

impl AdapterConfig {
    /// Creates a configuration with the given name and priority.
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the daily quota.
    pub fn with_daily_quota(mut self, quota: u64) -> Self {
        self.daily_quota = Some(quota);
        self
    }

    /// Enables or disables the adapter.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            priority: 100,
            timeout: 10,
            enabled: true,
            daily_quota: None,
        }
    }
}

/// A binding to one external provider for one capability.
///
/// `is_available` must be cheap, local and free of side effects: it may look
/// at credentials and quota counters but never touches the network or
/// consumes quota. Any retry or backoff is the adapter's own business.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the adapter configuration.
    fn config(&self) -> &AdapterConfig;

    /// Performs one provider call.
    async fn invoke(&self, request: &Request) -> Result<Payload, AdapterError>;

    /// Returns whether the adapter should be attempted right now.
    fn is_available(&self) -> bool {
        self.config().enabled
    }

    /// Returns the adapter name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Returns the dispatch priority.
    fn priority(&self) -> i32 {
        self.config().priority
    }

    /// Returns the per-invocation timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config().timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        config: AdapterConfig,
    }

    #[async_trait]
    impl Adapter for Fixed {
        fn config(&self) -> &AdapterConfig {
            &self.config
        }

        async fn invoke(&self, _request: &Request) -> Result<Payload, AdapterError> {
            Ok(Payload::Search(vec![]))
        }
    }

    #[test]
    fn test_adapter_config_default() {
        let config = AdapterConfig::default();
        assert_eq!(config.name, "");
        assert_eq!(config.priority, 100);
        assert_eq!(config.timeout, 10);
        assert!(config.enabled);
        assert!(config.daily_quota.is_none());
    }

    #[test]
    fn test_adapter_config_builder() {
        let config = AdapterConfig::new("google_cs", 20)
            .with_timeout(3)
            .with_daily_quota(100)
            .with_enabled(false);
        assert_eq!(config.name, "google_cs");
        assert_eq!(config.priority, 20);
        assert_eq!(config.timeout, 3);
        assert_eq!(config.daily_quota, Some(100));
        assert!(!config.enabled);
    }

    #[test]
    fn test_adapter_config_deserialization_defaults() {
        let json = r#"{"name":"bing"}"#;
        let config: AdapterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "bing");
        assert_eq!(config.priority, 100); // default
        assert_eq!(config.timeout, 10); // default
        assert!(config.enabled); // default
    }

    #[test]
    fn test_adapter_default_methods() {
        let adapter = Fixed {
            config: AdapterConfig::new("fixed", 7).with_timeout(2),
        };
        assert_eq!(adapter.name(), "fixed");
        assert_eq!(adapter.priority(), 7);
        assert_eq!(adapter.timeout(), Duration::from_secs(2));
        assert!(adapter.is_available());
    }

    #[test]
    fn test_adapter_disabled_is_unavailable() {
        let adapter = Fixed {
            config: AdapterConfig::new("fixed", 1).with_enabled(false),
        };
        assert!(!adapter.is_available());
    }
}
