//! Search facade over the dispatcher.

use std::sync::Arc;

use tracing::debug;

use crate::{
    Capability, DispatchError, NormalizedResult, ProviderDispatcher, Request, Result, SearchHit,
    SearchRequest,
};

/// Web search that falls back across every registered search provider.
#[derive(Clone)]
pub struct SearchClient {
    dispatcher: Arc<ProviderDispatcher>,
}

impl SearchClient {
    /// Creates a search client backed by the given dispatcher.
    pub fn new(dispatcher: Arc<ProviderDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Searches with the best available provider, or only `provider` if set.
    ///
    /// Returns [`DispatchError::Exhausted`] with the full attempt trace when
    /// no provider could answer.
    pub async fn search(
        &self,
        query: &str,
        num_results: u32,
        provider: Option<&str>,
    ) -> Result<NormalizedResult<Vec<SearchHit>>> {
        if query.trim().is_empty() {
            return Err(DispatchError::InvalidRequest("Query cannot be empty".into()));
        }

        let request = Request::Search(SearchRequest::new(query).with_num_results(num_results));
        debug!("Searching for {:?} (num={})", query, num_results);

        self.dispatcher
            .dispatch(Capability::Search, &request, provider)
            .await?
            .into_result()?
            .try_map(|payload| {
                payload.into_search().ok_or(DispatchError::RequestMismatch {
                    capability: Capability::Search,
                    request: Capability::CaptchaSolve,
                })
            })
    }

    /// Returns the underlying dispatcher.
    pub fn dispatcher(&self) -> &ProviderDispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Adapter, AdapterConfig, AdapterError, Payload};
    use async_trait::async_trait;

    struct StaticSearch {
        config: AdapterConfig,
        fail: bool,
    }

    impl StaticSearch {
        fn new(name: &str, priority: i32) -> Self {
            Self {
                config: AdapterConfig::new(name, priority),
                fail: false,
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl Adapter for StaticSearch {
        fn config(&self) -> &AdapterConfig {
            &self.config
        }

        async fn invoke(&self, request: &Request) -> std::result::Result<Payload, AdapterError> {
            if self.fail {
                return Err(AdapterError::RateLimited);
            }
            let req = request.as_search().unwrap();
            let hits = (1..=req.num_results)
                .map(|i| {
                    SearchHit::new(
                        format!("{} #{}", req.query, i),
                        format!("https://example.com/{}", i),
                        "",
                        i,
                        self.config.name.clone(),
                    )
                })
                .collect();
            Ok(Payload::Search(hits))
        }
    }

    fn client(adapters: Vec<StaticSearch>) -> SearchClient {
        let mut dispatcher = ProviderDispatcher::new();
        for adapter in adapters {
            dispatcher.register(Capability::Search, adapter).unwrap();
        }
        SearchClient::new(Arc::new(dispatcher))
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let client = client(vec![StaticSearch::new("a", 1)]);
        let result = client.search("   ", 10, None).await;
        assert!(matches!(result, Err(DispatchError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_search_returns_typed_hits() {
        let client = client(vec![StaticSearch::new("a", 1)]);
        let result = client.search("rust", 3, None).await.unwrap();
        assert_eq!(result.provider, "a");
        assert_eq!(result.payload.len(), 3);
        assert_eq!(result.payload[0].title, "rust #1");
    }

    #[tokio::test]
    async fn test_search_falls_back() {
        let client = client(vec![StaticSearch::new("a", 1).failing(), StaticSearch::new("b", 2)]);
        let result = client.search("rust", 1, None).await.unwrap();
        assert_eq!(result.provider, "b");
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].provider, "a");
    }

    #[tokio::test]
    async fn test_search_exhausted_is_error() {
        let client = client(vec![StaticSearch::new("a", 1).failing()]);
        let err = client.search("rust", 1, None).await.unwrap_err();
        match err {
            DispatchError::Exhausted(attempts) => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].to_string(), "a: Rate limited by provider");
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_no_providers() {
        let client = SearchClient::new(Arc::new(ProviderDispatcher::new()));
        let err = client.search("rust", 1, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCapability(_)));
        assert_eq!(client.dispatcher().adapter_count(Capability::Search), 0);
    }
}
