//! Environment credentials and default dispatcher assembly.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::providers::{
    AntiCaptcha, BingSearch, DuckDuckGo, GoogleCustomSearch, SerpApi, TwoCaptcha,
};
use crate::quota::{MemoryQuotaStore, Quota, QuotaStore};
use crate::{Adapter, AdapterConfig, Capability, ProviderDispatcher, Result};

/// Provider credentials, normally read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub serpapi_key: Option<String>,
    pub google_cs_api_key: Option<String>,
    pub google_cs_cx: Option<String>,
    pub bing_api_key: Option<String>,
    pub twocaptcha_key: Option<String>,
    pub anticaptcha_key: Option<String>,
}

impl Credentials {
    /// Reads `SERPAPI_KEY`, `GOOGLE_CS_API_KEY`, `GOOGLE_CS_CX`,
    /// `BING_API_KEY`, `TWOCAPTCHA_KEY` and `ANTICAPTCHA_KEY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds credentials from an arbitrary variable lookup. Blank values
    /// count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            serpapi_key: get("SERPAPI_KEY"),
            google_cs_api_key: get("GOOGLE_CS_API_KEY"),
            google_cs_cx: get("GOOGLE_CS_CX"),
            bing_api_key: get("BING_API_KEY"),
            twocaptcha_key: get("TWOCAPTCHA_KEY"),
            anticaptcha_key: get("ANTICAPTCHA_KEY"),
        }
    }
}

/// Assembles a dispatcher with every built-in provider.
///
/// Search order: serpapi, google_cs, bing, duckduckgo. Captcha order:
/// 2captcha, anticaptcha. Adapters without credentials are still registered
/// and simply report themselves unavailable.
pub struct DispatcherBuilder {
    credentials: Credentials,
    quota_store: Option<Arc<dyn QuotaStore>>,
    overrides: HashMap<String, Vec<ConfigEdit>>,
}

type ConfigEdit = Box<dyn Fn(&mut AdapterConfig) + Send + Sync>;

impl DispatcherBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            quota_store: None,
            overrides: HashMap::new(),
        }
    }

    /// Uses the given store for daily quotas (in-memory by default).
    pub fn with_quota_store(mut self, store: Arc<dyn QuotaStore>) -> Self {
        self.quota_store = Some(store);
        self
    }

    /// Replaces a built-in adapter's configuration, matched by name.
    ///
    /// The whole default is discarded, including the `google_cs` daily quota
    /// and the 150 s captcha timeout. Use [`configure_adapter`] to change
    /// single fields.
    ///
    /// [`configure_adapter`]: DispatcherBuilder::configure_adapter
    pub fn with_adapter_config(mut self, config: AdapterConfig) -> Self {
        let name = config.name.clone();
        self.overrides
            .entry(name)
            .or_default()
            .push(Box::new(move |current: &mut AdapterConfig| {
                *current = config.clone()
            }));
        self
    }

    /// Edits a built-in adapter's default configuration in place.
    ///
    /// Edits for the same adapter apply in call order, after any earlier
    /// replacement.
    pub fn configure_adapter(
        mut self,
        name: impl Into<String>,
        edit: impl Fn(&mut AdapterConfig) + Send + Sync + 'static,
    ) -> Self {
        self.overrides
            .entry(name.into())
            .or_default()
            .push(Box::new(edit));
        self
    }

    /// Builds the dispatcher.
    pub fn build(self) -> Result<ProviderDispatcher> {
        let store: Arc<dyn QuotaStore> = match &self.quota_store {
            Some(store) => Arc::clone(store),
            None => Arc::new(MemoryQuotaStore::new()),
        };
        let creds = &self.credentials;
        let mut dispatcher = ProviderDispatcher::new();

        let serpapi = SerpApi::new(creds.serpapi_key.clone());
        let config = self.config_for(serpapi.config());
        let serpapi = with_quota(
            serpapi.with_config(config.clone()),
            &config,
            &store,
            SerpApi::with_quota,
        );
        dispatcher.register(Capability::Search, serpapi)?;

        let google = GoogleCustomSearch::new(
            creds.google_cs_api_key.clone(),
            creds.google_cs_cx.clone(),
        );
        let config = self.config_for(google.config());
        let google = with_quota(
            google.with_config(config.clone()),
            &config,
            &store,
            GoogleCustomSearch::with_quota,
        );
        dispatcher.register(Capability::Search, google)?;

        let bing = BingSearch::new(creds.bing_api_key.clone());
        let config = self.config_for(bing.config());
        let bing = with_quota(
            bing.with_config(config.clone()),
            &config,
            &store,
            BingSearch::with_quota,
        );
        dispatcher.register(Capability::Search, bing)?;

        let ddg = DuckDuckGo::new();
        let config = self.config_for(ddg.config());
        dispatcher.register(Capability::Search, ddg.with_config(config))?;

        let two = TwoCaptcha::new(creds.twocaptcha_key.clone());
        let config = self.config_for(two.config());
        let two = with_quota(
            two.with_config(config.clone()),
            &config,
            &store,
            TwoCaptcha::with_quota,
        );
        dispatcher.register(Capability::CaptchaSolve, two)?;

        let anti = AntiCaptcha::new(creds.anticaptcha_key.clone());
        let config = self.config_for(anti.config());
        let anti = with_quota(
            anti.with_config(config.clone()),
            &config,
            &store,
            AntiCaptcha::with_quota,
        );
        dispatcher.register(Capability::CaptchaSolve, anti)?;

        for capability in Capability::ALL {
            let available = dispatcher
                .adapters(capability)
                .iter()
                .filter(|a| a.is_available())
                .count();
            debug!(
                "{} providers: {} registered, {} available",
                capability,
                dispatcher.adapter_count(capability),
                available
            );
        }

        Ok(dispatcher)
    }

    fn config_for(&self, default: &AdapterConfig) -> AdapterConfig {
        let mut config = default.clone();
        for edit in self.overrides.get(&default.name).into_iter().flatten() {
            edit(&mut config);
        }
        config
    }
}

fn with_quota<A>(
    adapter: A,
    config: &AdapterConfig,
    store: &Arc<dyn QuotaStore>,
    attach: fn(A, Quota) -> A,
) -> A {
    match config.daily_quota {
        Some(limit) => attach(adapter, Quota::new(config.name.clone(), limit, Arc::clone(store))),
        None => adapter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dispatcher: &ProviderDispatcher, capability: Capability) -> Vec<String> {
        dispatcher
            .adapters(capability)
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    #[test]
    fn test_credentials_from_lookup() {
        let creds = Credentials::from_lookup(|name| match name {
            "SERPAPI_KEY" => Some("serp".to_string()),
            "BING_API_KEY" => Some("   ".to_string()),
            "GOOGLE_CS_CX" => Some(" cx ".to_string()),
            _ => None,
        });
        assert_eq!(creds.serpapi_key.as_deref(), Some("serp"));
        assert_eq!(creds.bing_api_key, None);
        assert_eq!(creds.google_cs_cx.as_deref(), Some("cx"));
        assert_eq!(creds.twocaptcha_key, None);
    }

    #[test]
    fn test_builder_registers_all_providers_in_order() {
        let dispatcher = DispatcherBuilder::new(Credentials::default()).build().unwrap();
        assert_eq!(
            names(&dispatcher, Capability::Search),
            vec!["serpapi", "google_cs", "bing", "duckduckgo"]
        );
        assert_eq!(
            names(&dispatcher, Capability::CaptchaSolve),
            vec!["2captcha", "anticaptcha"]
        );
    }

    #[test]
    fn test_builder_availability_follows_credentials() {
        let creds = Credentials {
            bing_api_key: Some("k".into()),
            anticaptcha_key: Some("k".into()),
            ..Default::default()
        };
        let dispatcher = DispatcherBuilder::new(creds).build().unwrap();
        let available: Vec<_> = dispatcher
            .adapters(Capability::Search)
            .iter()
            .filter(|a| a.is_available())
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(available, vec!["bing", "duckduckgo"]);

        let captcha: Vec<_> = dispatcher
            .adapters(Capability::CaptchaSolve)
            .iter()
            .filter(|a| a.is_available())
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(captcha, vec!["anticaptcha"]);
    }

    #[test]
    fn test_builder_override_reorders() {
        let dispatcher = DispatcherBuilder::new(Credentials::default())
            .with_adapter_config(AdapterConfig::new("duckduckgo", 1))
            .build()
            .unwrap();
        assert_eq!(names(&dispatcher, Capability::Search)[0], "duckduckgo");
    }

    #[test]
    fn test_configure_adapter_keeps_other_defaults() {
        let creds = Credentials {
            google_cs_api_key: Some("k".into()),
            google_cs_cx: Some("cx".into()),
            twocaptcha_key: Some("k".into()),
            ..Default::default()
        };
        let store = Arc::new(MemoryQuotaStore::new());
        let dispatcher = DispatcherBuilder::new(creds)
            .with_quota_store(store.clone())
            .configure_adapter("google_cs", |c| c.priority = 1)
            .configure_adapter("2captcha", |c| c.priority = 5)
            .build()
            .unwrap();

        let google = &dispatcher.adapters(Capability::Search)[0];
        assert_eq!(google.name(), "google_cs");
        assert_eq!(google.config().daily_quota, Some(crate::providers::FREE_DAILY_QUOTA));

        let solver = &dispatcher.adapters(Capability::CaptchaSolve)[0];
        assert_eq!(solver.priority(), 5);
        assert_eq!(solver.timeout(), std::time::Duration::from_secs(150));

        for _ in 0..crate::providers::FREE_DAILY_QUOTA {
            assert!(store.try_reserve("google_cs", crate::providers::FREE_DAILY_QUOTA).unwrap());
        }
        assert!(!google.is_available());
    }

    #[test]
    fn test_adapter_config_replaces_defaults() {
        let dispatcher = DispatcherBuilder::new(Credentials::default())
            .with_adapter_config(AdapterConfig::new("2captcha", 5))
            .build()
            .unwrap();
        let solver = &dispatcher.adapters(Capability::CaptchaSolve)[0];
        assert_eq!(solver.name(), "2captcha");
        assert_eq!(solver.timeout(), std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_builder_google_quota_uses_shared_store() {
        let store = Arc::new(MemoryQuotaStore::new());
        for _ in 0..crate::providers::FREE_DAILY_QUOTA {
            assert!(store.try_reserve("google_cs", crate::providers::FREE_DAILY_QUOTA).unwrap());
        }
        let creds = Credentials {
            google_cs_api_key: Some("k".into()),
            google_cs_cx: Some("cx".into()),
            ..Default::default()
        };
        let dispatcher = DispatcherBuilder::new(creds)
            .with_quota_store(store)
            .build()
            .unwrap();
        let google = dispatcher
            .adapters(Capability::Search)
            .iter()
            .find(|a| a.name() == "google_cs")
            .unwrap();
        assert!(!google.is_available());
    }
}
