//! Ordered, fault-tolerant provider selection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::result::{AttemptRecord, FailureReason};
use crate::{
    Adapter, AdapterError, Capability, DispatchError, DispatchOutcome, NormalizedResult, Request,
    Result,
};

/// Dispatches capability requests to the first provider that can serve them.
///
/// Adapters are kept per capability in ascending priority, ties in
/// registration order. A dispatch walks that list sequentially: unavailable
/// adapters are skipped without being invoked, failing adapters are recorded
/// and passed over, and the first success is returned immediately. Providers
/// are never raced, since each call may cost money or quota.
///
/// The dispatcher holds no per-call state and can be shared across tasks
/// behind an `Arc`.
pub struct ProviderDispatcher {
    adapters: HashMap<Capability, Vec<Arc<dyn Adapter>>>,
}

impl ProviderDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registers an adapter for a capability.
    pub fn register<A: Adapter + 'static>(
        &mut self,
        capability: Capability,
        adapter: A,
    ) -> Result<()> {
        self.register_arc(capability, Arc::new(adapter))
    }

    /// Registers a shared adapter for a capability.
    ///
    /// Fails with [`DispatchError::Configuration`] if the name is already
    /// taken within that capability.
    pub fn register_arc(&mut self, capability: Capability, adapter: Arc<dyn Adapter>) -> Result<()> {
        let list = self.adapters.entry(capability).or_default();
        if list.iter().any(|a| a.name() == adapter.name()) {
            return Err(DispatchError::Configuration(format!(
                "adapter '{}' is already registered for capability '{}'",
                adapter.name(),
                capability
            )));
        }

        debug!(
            "Registered {} adapter '{}' at priority {}",
            capability,
            adapter.name(),
            adapter.priority()
        );
        list.push(adapter);
        // Stable: equal priorities keep registration order.
        list.sort_by_key(|a| a.priority());
        Ok(())
    }

    /// Returns the adapters for a capability in dispatch order.
    pub fn adapters(&self, capability: Capability) -> &[Arc<dyn Adapter>] {
        self.adapters
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the number of adapters registered for a capability.
    pub fn adapter_count(&self, capability: Capability) -> usize {
        self.adapters(capability).len()
    }

    /// Dispatches using a capability given by its string identifier.
    pub async fn dispatch_named(
        &self,
        capability: &str,
        request: &Request,
        provider: Option<&str>,
    ) -> Result<DispatchOutcome> {
        let capability: Capability = capability.parse()?;
        self.dispatch(capability, request, provider).await
    }

    /// Dispatches a request for a capability.
    ///
    /// With `provider` set, only that adapter is considered and the outcome
    /// carries at most one attempt record. Structural misuse (no adapters,
    /// unknown override, mismatched request) is returned as `Err`; provider
    /// failures only ever show up inside [`DispatchOutcome::Exhausted`].
    pub async fn dispatch(
        &self,
        capability: Capability,
        request: &Request,
        provider: Option<&str>,
    ) -> Result<DispatchOutcome> {
        let adapters = match self.adapters.get(&capability) {
            Some(list) if !list.is_empty() => list,
            _ => return Err(DispatchError::UnknownCapability(capability.to_string())),
        };

        if request.capability() != capability {
            return Err(DispatchError::RequestMismatch {
                capability,
                request: request.capability(),
            });
        }

        let candidates: Vec<&Arc<dyn Adapter>> = match provider {
            Some(name) => {
                let adapter = adapters.iter().find(|a| a.name() == name).ok_or_else(|| {
                    DispatchError::UnknownProvider {
                        capability,
                        provider: name.to_string(),
                    }
                })?;
                vec![adapter]
            }
            None => adapters.iter().collect(),
        };

        let mut attempts = Vec::with_capacity(candidates.len());

        for adapter in candidates {
            let name = adapter.name();

            if !adapter.is_available() {
                debug!("Skipping {} provider {}: unavailable", capability, name);
                attempts.push(AttemptRecord::new(name, FailureReason::Unavailable));
                continue;
            }

            debug!("Trying {} provider {}", capability, name);
            let start = Instant::now();
            let limit = adapter.timeout();

            let result = match timeout(limit, adapter.invoke(request)).await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Timeout(limit)),
            };

            match result {
                Ok(payload) if payload.capability() == capability => {
                    let latency = start.elapsed();
                    info!(
                        "{} served by {} in {}ms after {} fallbacks",
                        capability,
                        name,
                        latency.as_millis(),
                        attempts.len()
                    );
                    return Ok(DispatchOutcome::Success(NormalizedResult {
                        provider: name.to_string(),
                        payload,
                        latency,
                        skipped: attempts,
                    }));
                }
                Ok(payload) => {
                    let reason = format!(
                        "returned a {} payload for a {} request",
                        payload.capability(),
                        capability
                    );
                    warn!("Provider {} failed: {}", name, reason);
                    attempts.push(AttemptRecord::new(name, FailureReason::Failed(reason)));
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", name, e);
                    attempts.push(AttemptRecord::new(name, FailureReason::Failed(e.to_string())));
                }
            }
        }

        warn!(
            "All {} providers exhausted ({} attempts)",
            capability,
            attempts.len()
        );
        Ok(DispatchOutcome::Exhausted(attempts))
    }
}

impl Default for ProviderDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
